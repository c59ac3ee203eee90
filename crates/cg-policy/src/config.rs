//! Engine configuration, loadable from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cg_audit::AuditSigner;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Conventional policy location. Absence of this file (and only this one)
/// puts the engine in report-only mode.
pub const DEFAULT_POLICY_PATH: &str = ".codeguard/policy.yaml";

/// Longest accepted override validity window (one year).
pub const MAX_OVERRIDE_VALIDITY_MINUTES: i64 = 365 * 24 * 60;

/// Longest accepted decision age for an override request (one year).
pub const MAX_OVERRIDE_REQUEST_TIMEOUT_SECS: i64 = 365 * 24 * 60 * 60;

/// Which rule-evaluation backend to use. Fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorSelection {
    /// Detect the external CLI; fall back to the local approximation.
    #[default]
    Auto,
    /// Require the external CLI; construction fails without it.
    External,
    /// Always use the local approximation.
    Local,
}

/// Policy engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Policy file. `None` means `DEFAULT_POLICY_PATH`.
    #[serde(default)]
    pub policy_path: Option<PathBuf>,

    #[serde(default)]
    pub evaluator: EvaluatorSelection,

    /// External CLI binary name or path.
    #[serde(default = "default_evaluator_binary")]
    pub evaluator_binary: String,

    /// Timeout for the availability check and per-rule syntax checks.
    #[serde(default = "default_syntax_check_timeout_ms")]
    pub syntax_check_timeout_ms: u64,

    /// Timeout for each external evaluation.
    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,

    /// Audit log file. `None` means a process-private temporary location.
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,

    /// HMAC key for the audit log. Falls back to `CODEGUARD_AUDIT_SECRET`,
    /// then to the test-only default key.
    #[serde(default, skip_serializing)]
    pub audit_secret: Option<String>,

    /// Advisory validity window stamped on approved overrides.
    #[serde(default = "default_override_validity_minutes")]
    pub override_validity_minutes: i64,

    /// Maximum age of a denying decision when its override is requested.
    #[serde(default = "default_override_request_timeout_secs")]
    pub override_request_timeout_secs: i64,
}

fn default_evaluator_binary() -> String {
    "opa".to_string()
}

fn default_syntax_check_timeout_ms() -> u64 {
    5_000
}

fn default_evaluation_timeout_ms() -> u64 {
    30_000
}

fn default_override_validity_minutes() -> i64 {
    60
}

fn default_override_request_timeout_secs() -> i64 {
    900
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            evaluator: EvaluatorSelection::default(),
            evaluator_binary: default_evaluator_binary(),
            syntax_check_timeout_ms: default_syntax_check_timeout_ms(),
            evaluation_timeout_ms: default_evaluation_timeout_ms(),
            audit_log_path: None,
            audit_secret: None,
            override_validity_minutes: default_override_validity_minutes(),
            override_request_timeout_secs: default_override_request_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Config that loads an explicit policy file (which must exist).
    pub fn with_policy_path(path: impl Into<PathBuf>) -> Self {
        Self {
            policy_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|e| PolicyError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| PolicyError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate().map_err(|e| PolicyError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Check that every numeric setting is usable. Timeouts must be nonzero
    /// and the override windows must be positive and at most one year.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.syntax_check_timeout_ms == 0 {
            return Err(out_of_range("syntax_check_timeout_ms", "must be greater than zero"));
        }
        if self.evaluation_timeout_ms == 0 {
            return Err(out_of_range("evaluation_timeout_ms", "must be greater than zero"));
        }
        if !(1..=MAX_OVERRIDE_VALIDITY_MINUTES).contains(&self.override_validity_minutes) {
            return Err(out_of_range(
                "override_validity_minutes",
                format!(
                    "{} is not between 1 and {MAX_OVERRIDE_VALIDITY_MINUTES}",
                    self.override_validity_minutes
                ),
            ));
        }
        if !(1..=MAX_OVERRIDE_REQUEST_TIMEOUT_SECS).contains(&self.override_request_timeout_secs) {
            return Err(out_of_range(
                "override_request_timeout_secs",
                format!(
                    "{} is not between 1 and {MAX_OVERRIDE_REQUEST_TIMEOUT_SECS}",
                    self.override_request_timeout_secs
                ),
            ));
        }
        Ok(())
    }

    /// The policy path in effect, and whether it was explicitly supplied.
    pub fn resolved_policy_path(&self) -> (PathBuf, bool) {
        match &self.policy_path {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_POLICY_PATH), false),
        }
    }

    pub fn syntax_check_timeout(&self) -> Duration {
        Duration::from_millis(self.syntax_check_timeout_ms)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn audit_signer(&self) -> AuditSigner {
        match &self.audit_secret {
            Some(secret) => AuditSigner::from_secret(secret.as_bytes()),
            None => AuditSigner::from_env_or_default(),
        }
    }
}

fn out_of_range(field: &'static str, reason: impl Into<String>) -> PolicyError {
    PolicyError::ConfigOutOfRange {
        field,
        reason: reason.into(),
    }
}
