// analyzer.rs — Public entry points for vulnerability heuristics.
//
// Every check dispatches on the language of the *scanned* code through the
// detector table. None of these checks trace data flow: they report the
// co-occurrence of a dangerous sink with an untrusted-input accessor.

use serde::{Deserialize, Serialize};

use crate::detector::{detector_for, LanguageDetector};
use crate::language::ScannedLanguage;
use crate::profile::{any_present, SinkProfile};

/// Vulnerability families the analyzer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityKind {
    SqlInjection,
    Xss,
    CommandInjection,
    PathTraversal,
    NosqlInjection,
    LdapInjection,
    XxeInjection,
}

/// Stateless front end over the per-language detectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn detector(language: impl Into<ScannedLanguage>) -> &'static dyn LanguageDetector {
        detector_for(language.into())
    }

    /// Does the code build SQL from strings (concatenation, interpolation,
    /// `.format()`, `%` formatting, accumulator appends)?
    pub fn contains_sql_sink(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        Self::detector(language).sql_sink(code)
    }

    /// Does the code use a recognized parameterized-query shape?
    ///
    /// This is the only signal used to suppress SQL findings in the local
    /// rule evaluator.
    pub fn has_parameterization(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        Self::detector(language).has_parameterization(code)
    }

    pub fn contains_xss_sink(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        tainted_sink(code, language, |p| p.xss_sinks)
    }

    pub fn contains_command_injection(
        &self,
        code: &str,
        language: impl Into<ScannedLanguage>,
    ) -> bool {
        tainted_sink(code, language, |p| p.command_sinks)
    }

    /// Path sink plus taint source, with no normalization or validation
    /// call anywhere in the same code unit.
    pub fn contains_path_traversal(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        Self::detector(language).profiles().iter().any(|p| {
            any_present(code, p.path_sinks)
                && any_present(code, p.taint_sources)
                && !any_present(code, p.path_sanitizers)
        })
    }

    pub fn contains_nosql_injection(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        tainted_sink(code, language, |p| p.nosql_sinks)
    }

    pub fn contains_ldap_injection(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        tainted_sink(code, language, |p| p.ldap_sinks)
    }

    pub fn contains_xxe_injection(&self, code: &str, language: impl Into<ScannedLanguage>) -> bool {
        tainted_sink(code, language, |p| p.xxe_sinks)
    }

    /// Run every check and return the families that fired. A SQL sink that
    /// is already parameterized is not reported.
    pub fn scan(&self, code: &str, language: impl Into<ScannedLanguage>) -> Vec<VulnerabilityKind> {
        let language = language.into();
        let mut found = Vec::new();
        if self.contains_sql_sink(code, language) && !self.has_parameterization(code, language) {
            found.push(VulnerabilityKind::SqlInjection);
        }
        let checks: [(VulnerabilityKind, fn(&Self, &str, ScannedLanguage) -> bool); 6] = [
            (VulnerabilityKind::Xss, |a, c, l| a.contains_xss_sink(c, l)),
            (VulnerabilityKind::CommandInjection, |a, c, l| {
                a.contains_command_injection(c, l)
            }),
            (VulnerabilityKind::PathTraversal, |a, c, l| a.contains_path_traversal(c, l)),
            (VulnerabilityKind::NosqlInjection, |a, c, l| a.contains_nosql_injection(c, l)),
            (VulnerabilityKind::LdapInjection, |a, c, l| a.contains_ldap_injection(c, l)),
            (VulnerabilityKind::XxeInjection, |a, c, l| a.contains_xxe_injection(c, l)),
        ];
        for (kind, check) in checks {
            if check(self, code, language) {
                found.push(kind);
            }
        }
        found
    }
}

fn tainted_sink(
    code: &str,
    language: impl Into<ScannedLanguage>,
    sinks: impl Fn(&SinkProfile) -> &'static [&'static str],
) -> bool {
    detector_for(language.into())
        .profiles()
        .iter()
        .any(|p| any_present(code, sinks(*p)) && any_present(code, p.taint_sources))
}
