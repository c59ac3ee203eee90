// language.rs — The language of the code being scanned.
//
// This is the language of the *submitted* code, not of this crate. Each
// variant selects one detector from the lookup table in `detector.rs`.

use serde::{Deserialize, Serialize};

/// Languages with a dedicated detector. Anything else is `Other` and gets
/// the text-only fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannedLanguage {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    CSharp,
    Php,
    Ruby,
    Other,
}

impl ScannedLanguage {
    /// Map a loose language name or file extension to a variant.
    pub fn from_name(name: &str) -> Self {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" | "pyw" => Self::Python,
            "javascript" | "js" | "jsx" | "mjs" | "cjs" | "node" => Self::JavaScript,
            "typescript" | "ts" | "tsx" => Self::TypeScript,
            "java" => Self::Java,
            "go" | "golang" => Self::Go,
            "csharp" | "c#" | "cs" => Self::CSharp,
            "php" => Self::Php,
            "ruby" | "rb" => Self::Ruby,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::CSharp => "csharp",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ScannedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ScannedLanguage {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}
