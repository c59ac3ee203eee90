//! # cg-semantic
//!
//! Heuristic vulnerability detection for code submitted to the codeguard
//! policy engine.
//!
//! The analyzer separates genuinely dangerous shapes (SQL assembled from
//! strings, tainted input reaching a shell or file API) from look-alikes
//! that are already safe, most importantly parameterized queries.
//!
//! Dispatch is on the language of the scanned code via a lookup table of
//! [`LanguageDetector`]s. Python gets a token-level walker; other languages
//! use text heuristics; unknown languages fall back to a detector that
//! consults every sink table.
//!
//! These are heuristics, not data-flow analysis. Expect both false
//! positives and false negatives.

pub mod analyzer;
pub mod detector;
pub mod language;
pub mod profile;
pub mod python;
pub mod sql;

pub use analyzer::{SemanticAnalyzer, VulnerabilityKind};
pub use detector::{detector_for, LanguageDetector};
pub use language::ScannedLanguage;
pub use sql::{contains_sql_keyword, SQL_KEYWORDS};
