// detector.rs — One detector per scanned language, selected from a table.
//
// Languages with a structural walker (Python) override `sql_sink`; the
// rest use the text heuristics in `sql.rs`. Unrecognized languages get
// `TextDetector`, which consults every profile.

use crate::language::ScannedLanguage;
use crate::profile::{self, SinkProfile};
use crate::python;
use crate::sql;

static PYTHON_PROFILES: [&SinkProfile; 1] = [&profile::PYTHON];
static JAVASCRIPT_PROFILES: [&SinkProfile; 1] = [&profile::JAVASCRIPT];
static JAVA_PROFILES: [&SinkProfile; 1] = [&profile::JAVA];
static GO_PROFILES: [&SinkProfile; 1] = [&profile::GO];
static CSHARP_PROFILES: [&SinkProfile; 1] = [&profile::CSHARP];
static PHP_PROFILES: [&SinkProfile; 1] = [&profile::PHP];
static RUBY_PROFILES: [&SinkProfile; 1] = [&profile::RUBY];

/// Per-language vulnerability heuristics.
pub trait LanguageDetector: Send + Sync {
    /// Which language this detector handles.
    fn language(&self) -> ScannedLanguage;

    /// Sink/taint tables consulted for the non-SQL families.
    fn profiles(&self) -> &'static [&'static SinkProfile];

    /// Does the code build a SQL statement from strings?
    fn sql_sink(&self, code: &str) -> bool {
        sql::text_sql_sink(code)
    }

    /// Does the code already use a recognized parameterized-query shape?
    fn has_parameterization(&self, code: &str) -> bool;
}

pub struct PythonDetector;

impl LanguageDetector for PythonDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::Python
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &PYTHON_PROFILES
    }

    fn sql_sink(&self, code: &str) -> bool {
        match python::sql_sink(code) {
            Ok(found) => found,
            Err(python::Unparsable) => {
                tracing::debug!("python source did not tokenize; using flat keyword search");
                sql::contains_sql_keyword(code)
            }
        }
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::PY_TWO_ARG_EXECUTE.is_match(code) || sql::PY_PLACEHOLDER_CALL.is_match(code)
    }
}

/// Shared by JavaScript and TypeScript.
pub struct JavaScriptDetector {
    language: ScannedLanguage,
}

impl LanguageDetector for JavaScriptDetector {
    fn language(&self) -> ScannedLanguage {
        self.language
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &JAVASCRIPT_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::JS_PARAM_CALL.is_match(code)
    }
}

pub struct JavaDetector;

impl LanguageDetector for JavaDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::Java
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &JAVA_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::JAVA_PREPARED.is_match(code)
    }
}

pub struct GoDetector;

impl LanguageDetector for GoDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::Go
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &GO_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::GO_PARAM_CALL.is_match(code)
    }
}

pub struct CSharpDetector;

impl LanguageDetector for CSharpDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::CSharp
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &CSHARP_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::CSHARP_PARAMS.is_match(code)
    }
}

pub struct PhpDetector;

impl LanguageDetector for PhpDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::Php
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &PHP_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::PHP_PREPARED.is_match(code)
    }
}

pub struct RubyDetector;

impl LanguageDetector for RubyDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::Ruby
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &RUBY_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::RUBY_BOUND.is_match(code)
    }
}

/// Fallback for languages without a dedicated detector.
pub struct TextDetector;

static ALL_PROFILES: [&SinkProfile; 7] = [
    &profile::PYTHON,
    &profile::JAVASCRIPT,
    &profile::JAVA,
    &profile::GO,
    &profile::CSHARP,
    &profile::PHP,
    &profile::RUBY,
];

impl LanguageDetector for TextDetector {
    fn language(&self) -> ScannedLanguage {
        ScannedLanguage::Other
    }

    fn profiles(&self) -> &'static [&'static SinkProfile] {
        &ALL_PROFILES
    }

    fn has_parameterization(&self, code: &str) -> bool {
        sql::PY_TWO_ARG_EXECUTE.is_match(code)
            || sql::PY_PLACEHOLDER_CALL.is_match(code)
            || sql::JS_PARAM_CALL.is_match(code)
            || sql::JAVA_PREPARED.is_match(code)
            || sql::GO_PARAM_CALL.is_match(code)
            || sql::CSHARP_PARAMS.is_match(code)
            || sql::PHP_PREPARED.is_match(code)
            || sql::RUBY_BOUND.is_match(code)
    }
}

static PYTHON_DETECTOR: PythonDetector = PythonDetector;
static JAVASCRIPT_DETECTOR: JavaScriptDetector = JavaScriptDetector {
    language: ScannedLanguage::JavaScript,
};
static TYPESCRIPT_DETECTOR: JavaScriptDetector = JavaScriptDetector {
    language: ScannedLanguage::TypeScript,
};
static JAVA_DETECTOR: JavaDetector = JavaDetector;
static GO_DETECTOR: GoDetector = GoDetector;
static CSHARP_DETECTOR: CSharpDetector = CSharpDetector;
static PHP_DETECTOR: PhpDetector = PhpDetector;
static RUBY_DETECTOR: RubyDetector = RubyDetector;
static TEXT_DETECTOR: TextDetector = TextDetector;

static DETECTORS: [&dyn LanguageDetector; 8] = [
    &PYTHON_DETECTOR,
    &JAVASCRIPT_DETECTOR,
    &TYPESCRIPT_DETECTOR,
    &JAVA_DETECTOR,
    &GO_DETECTOR,
    &CSHARP_DETECTOR,
    &PHP_DETECTOR,
    &RUBY_DETECTOR,
];

/// Look up the detector for a language, falling back to [`TextDetector`].
pub fn detector_for(language: ScannedLanguage) -> &'static dyn LanguageDetector {
    let fallback: &'static dyn LanguageDetector = &TEXT_DETECTOR;
    DETECTORS
        .iter()
        .copied()
        .find(|d| d.language() == language)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dedicated_language_has_its_own_detector() {
        for lang in [
            ScannedLanguage::Python,
            ScannedLanguage::JavaScript,
            ScannedLanguage::TypeScript,
            ScannedLanguage::Java,
            ScannedLanguage::Go,
            ScannedLanguage::CSharp,
            ScannedLanguage::Php,
            ScannedLanguage::Ruby,
        ] {
            assert_eq!(detector_for(lang).language(), lang);
        }
    }

    #[test]
    fn unknown_language_uses_text_fallback() {
        let detector = detector_for(ScannedLanguage::Other);
        assert_eq!(detector.language(), ScannedLanguage::Other);
        assert_eq!(detector.profiles().len(), 7);
    }

    #[test]
    fn unparsable_python_falls_back_to_keyword_search() {
        let detector = detector_for(ScannedLanguage::Python);
        assert!(detector.sql_sink("q = \"SELECT * FROM t"));
        assert!(!detector.sql_sink("q = \"hello"));
    }
}
