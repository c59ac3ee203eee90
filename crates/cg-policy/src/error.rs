// error.rs — Error types for the policy subsystem.
//
// `PolicyError` covers everything that can stop an engine from being
// constructed. `EvaluationError` covers a single policy check going wrong;
// the engine never surfaces it to callers directly but converts it into a
// denying decision.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that prevent a [`crate::PolicyEngine`] from being constructed.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An explicitly configured policy file does not exist.
    #[error("policy file not found at {path}")]
    PolicyFileNotFound { path: PathBuf },

    /// The policy file exists but could not be read.
    #[error("failed to read policy file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The policy file is not a valid policy document.
    #[error("failed to parse policy file at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// A policy entry failed field validation.
    #[error("invalid policy #{index} ('{name}'): {reason}")]
    InvalidPolicy {
        index: usize,
        name: String,
        reason: String,
    },

    /// Two entries share a name.
    #[error("duplicate policy name '{name}'")]
    DuplicatePolicy { name: String },

    /// The rule text failed the structural check (delimiters, package).
    #[error("rule for policy '{policy}' is malformed: {reason}")]
    MalformedRule { policy: String, reason: String },

    /// The external evaluator rejected the rule's syntax.
    #[error("external evaluator rejected rule for policy '{policy}': {source}")]
    RuleSyntaxRejected {
        policy: String,
        source: EvaluationError,
    },

    /// The external evaluator was required but could not be used.
    #[error("external evaluator '{binary}' is unavailable: {reason}")]
    EvaluatorUnavailable { binary: String, reason: String },

    /// The used-override-code store could not be read or written.
    #[error("used override code store at {path} is unusable: {reason}")]
    UsedCodesUnreadable { path: PathBuf, reason: String },

    /// The engine configuration file could not be read or parsed.
    #[error("invalid engine configuration at {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// A configuration value is outside its accepted range.
    #[error("configuration value '{field}' is out of range: {reason}")]
    ConfigOutOfRange { field: &'static str, reason: String },

    /// The audit log could not be opened.
    #[error("audit log unavailable: {0}")]
    Audit(#[from] cg_audit::AuditError),
}

/// Errors from evaluating one policy. Always resolved to a denial.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The evaluator process could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The evaluator did not finish within its time budget.
    #[error("'{program}' timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    /// The evaluator exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: String,
        stderr: String,
    },

    /// The evaluator's output was not in the expected shape.
    #[error("unexpected evaluator output: {reason}")]
    MalformedOutput { reason: String },

    /// Temporary rule/input artifacts could not be written.
    #[error("failed to prepare evaluation artifacts: {0}")]
    Artifact(#[from] std::io::Error),
}
