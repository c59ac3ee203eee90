// engine.rs — The policy engine: evaluation and the override workflow.
//
// The engine is fail-closed end to end:
//
// 1. Construction fails on an out-of-range config value, any malformed
//    policy, an unreadable used-code store, or a missing required evaluator. Callers treat a failed
//    construction as "deny everything".
// 2. `evaluate()` converts any backend error into a deny-all decision that
//    names the failing policy and cannot be overridden.
// 3. `request_override()` approves only after the redeemed code has been
//    written to disk.
//
// Policies and the evaluator backend are fixed for the engine's lifetime.
// The used-code set and the audit log are shared mutable state and each sit
// behind a Mutex so concurrent callers are serialized.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use cg_audit::{hasher, AuditLog};

use crate::config::{EngineConfig, EvaluatorSelection};
use crate::decision::{
    OverrideDecision, OverrideRejection, OverrideRequest, PolicyDecision,
};
use crate::error::PolicyError;
use crate::evaluator::{ExternalEvaluator, LocalEvaluator, RuleEvaluator};
use crate::operation::{EvaluationInput, Operation};
use crate::overrides::UsedOverrideCodes;
use crate::policy::{Policy, PolicyLoader};

const MIN_CODE_LEN: usize = 6;
const MAX_CODE_LEN: usize = 64;

/// Evaluates operations against a fixed set of policies.
pub struct PolicyEngine {
    config: EngineConfig,
    policy_path: PathBuf,
    report_only: bool,
    policies: Vec<Policy>,
    evaluator: Box<dyn RuleEvaluator>,
    used_codes: Mutex<UsedOverrideCodes>,
    audit: Arc<Mutex<AuditLog>>,
}

impl PolicyEngine {
    /// Build an engine from configuration.
    pub fn new(config: EngineConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        let (policy_path, explicit) = config.resolved_policy_path();

        let (policies, report_only) = if policy_path.exists() {
            (PolicyLoader::load(&policy_path)?, false)
        } else if explicit {
            return Err(PolicyError::PolicyFileNotFound { path: policy_path });
        } else {
            tracing::warn!(
                path = %policy_path.display(),
                "no policy file at default location; running in report-only mode"
            );
            (Vec::new(), true)
        };

        let evaluator = select_evaluator(&config, &policies)?;
        let used_codes = UsedOverrideCodes::load(UsedOverrideCodes::path_for(&policy_path))?;

        let signer = config.audit_signer();
        let audit = match &config.audit_log_path {
            Some(path) => AuditLog::open(path, signer)?,
            None => AuditLog::private(signer)?,
        };

        tracing::info!(
            policies = policies.len(),
            backend = evaluator.name(),
            path = %policy_path.display(),
            "policy engine ready"
        );

        Ok(Self {
            config,
            policy_path,
            report_only,
            policies,
            evaluator,
            used_codes: Mutex::new(used_codes),
            audit: Arc::new(Mutex::new(audit)),
        })
    }

    /// Build an engine over an explicit policy file with default settings.
    pub fn from_policy_file(path: impl Into<PathBuf>) -> Result<Self, PolicyError> {
        Self::new(EngineConfig::with_policy_path(path))
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn policy_path(&self) -> &Path {
        &self.policy_path
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the backend chosen at construction ("external" or "local").
    pub fn backend_name(&self) -> &'static str {
        self.evaluator.name()
    }

    /// True when no policy file was found at the default location.
    pub fn is_report_only(&self) -> bool {
        self.report_only
    }

    /// Shared handle to the audit log. The engine itself only records
    /// override outcomes; callers record evaluation outcomes here.
    pub fn audit_log(&self) -> Arc<Mutex<AuditLog>> {
        Arc::clone(&self.audit)
    }

    /// Evaluate an operation against every in-scope policy.
    pub fn evaluate(&self, operation: &Operation) -> PolicyDecision {
        if self.report_only {
            return PolicyDecision::allow("No policies loaded (report-only mode)");
        }

        let input = EvaluationInput::from(operation);
        let mut violations = Vec::new();

        for policy in &self.policies {
            if !policy.applies_to(input.file_path.as_deref()) {
                tracing::debug!(policy = %policy.name, "policy out of scope for file");
                continue;
            }
            match self.evaluator.evaluate(policy, &input) {
                Ok(Some(violation)) => {
                    tracing::debug!(policy = %policy.name, action = %violation.action, "policy violated");
                    violations.push(violation);
                }
                Ok(None) => {
                    tracing::debug!(policy = %policy.name, "policy satisfied");
                }
                Err(e) => {
                    tracing::error!(
                        policy = %policy.name,
                        backend = self.evaluator.name(),
                        error = %e,
                        "policy evaluation failed; denying operation"
                    );
                    return PolicyDecision::evaluation_failed(&policy.name, &e);
                }
            }
        }

        PolicyDecision::from_violations(violations)
    }

    /// Ask a human-approved override for a denied operation.
    ///
    /// Rejections come back as `approved: false` with a distinct
    /// `OverrideRejection`; nothing here returns an error.
    pub fn request_override(
        &self,
        operation: &Operation,
        decision: &PolicyDecision,
        request: &OverrideRequest,
    ) -> OverrideDecision {
        match self.check_and_redeem(decision, request) {
            Ok(expires_at) => {
                let approved = OverrideDecision::approve(
                    request.justification.clone(),
                    request.approved_by.clone(),
                    expires_at,
                );
                tracing::info!(
                    override_id = ?approved.override_id,
                    policies = ?decision.violated_policies,
                    "override approved"
                );
                self.record_best_effort(
                    "override_approved",
                    decision,
                    json!({
                        "override_id": approved.override_id,
                        "justification": request.justification,
                        "approved_by": request.approved_by,
                        "code_hash": hasher::hash_str(&request.code),
                        "violated_policies": decision.violated_policies,
                        "operation": operation.operation_type,
                        "file_path": operation.file_path,
                        "expires_at": expires_at,
                    }),
                );
                approved
            }
            Err(rejection) => {
                tracing::warn!(
                    reason = rejection.reason(),
                    policies = ?decision.violated_policies,
                    "override rejected"
                );
                self.record_best_effort(
                    "override_rejected",
                    decision,
                    json!({
                        "reason": rejection.reason(),
                        "rejection": rejection,
                        "code_hash": hasher::hash_str(&request.code),
                        "violated_policies": decision.violated_policies,
                        "operation": operation.operation_type,
                        "file_path": operation.file_path,
                    }),
                );
                OverrideDecision::reject(rejection)
            }
        }
    }

    fn check_and_redeem(
        &self,
        decision: &PolicyDecision,
        request: &OverrideRequest,
    ) -> Result<DateTime<Utc>, OverrideRejection> {
        if decision.allowed || !decision.requires_override {
            return Err(OverrideRejection::NotEligible);
        }
        if request.justification.trim().is_empty() {
            return Err(OverrideRejection::MissingJustification);
        }
        let now = Utc::now();
        let age = now - decision.decided_at;
        if exceeds_seconds(age, self.config.override_request_timeout_secs) {
            return Err(OverrideRejection::TimedOut);
        }
        // Shape check only. A deployment should verify a real TOTP here.
        if !is_well_formed_code(&request.code) {
            return Err(OverrideRejection::InvalidCode);
        }

        let mut used = match self.used_codes.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::error!("used-code store lock poisoned; refusing override");
                return Err(OverrideRejection::PersistenceFailed);
            }
        };
        // Computed before redeeming so nothing after the code is burned can fail.
        let expires_at = expiry_after(now, self.config.override_validity_minutes);
        match used.redeem(&request.code) {
            Ok(true) => Ok(expires_at),
            Ok(false) => Err(OverrideRejection::AlreadyUsed),
            Err(e) => {
                tracing::error!(error = %e, "could not record override code; refusing override");
                Err(OverrideRejection::PersistenceFailed)
            }
        }
    }

    fn record_best_effort(
        &self,
        event_type: &str,
        decision: &PolicyDecision,
        details: serde_json::Value,
    ) {
        let result = match self.audit.lock() {
            Ok(mut log) => log
                .record_event(event_type, decision.severity.as_str(), details, None)
                .map(|_| ()),
            Err(_) => {
                tracing::warn!(event_type, "audit log lock poisoned; event not recorded");
                return;
            }
        };
        if let Err(e) = result {
            tracing::warn!(event_type, error = %e, "failed to write audit event");
        }
    }
}

fn is_well_formed_code(code: &str) -> bool {
    (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `now + minutes`, saturating at the latest representable instant.
fn expiry_after(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(minutes)
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True when `age` is longer than `secs`. A limit too large to represent
/// is never exceeded.
fn exceeds_seconds(age: Duration, secs: i64) -> bool {
    Duration::try_seconds(secs).is_some_and(|limit| age > limit)
}

fn select_evaluator(
    config: &EngineConfig,
    policies: &[Policy],
) -> Result<Box<dyn RuleEvaluator>, PolicyError> {
    let detected = match config.evaluator {
        EvaluatorSelection::Local => None,
        EvaluatorSelection::External | EvaluatorSelection::Auto => {
            ExternalEvaluator::detect(&config.evaluator_binary, config.syntax_check_timeout())
        }
    };

    let Some(binary) = detected else {
        if config.evaluator == EvaluatorSelection::External {
            return Err(PolicyError::EvaluatorUnavailable {
                binary: config.evaluator_binary.clone(),
                reason: "not found or did not respond to 'version'".to_string(),
            });
        }
        if config.evaluator == EvaluatorSelection::Auto {
            tracing::info!(
                binary = %config.evaluator_binary,
                "external rule evaluator unavailable; using local approximation"
            );
        }
        return Ok(Box::new(LocalEvaluator::new()));
    };

    let external = ExternalEvaluator::new(
        binary,
        config.syntax_check_timeout(),
        config.evaluation_timeout(),
    );
    for policy in policies {
        external
            .check_syntax(policy)
            .map_err(|source| PolicyError::RuleSyntaxRejected {
                policy: policy.name.clone(),
                source,
            })?;
    }
    Ok(Box::new(external))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_shape() {
        assert!(is_well_formed_code("123456"));
        assert!(is_well_formed_code("abcDEF123"));
        assert!(!is_well_formed_code("12345"));
        assert!(!is_well_formed_code("12345 6"));
        assert!(!is_well_formed_code("12-34-56"));
        assert!(!is_well_formed_code(&"a".repeat(65)));
        assert!(!is_well_formed_code(""));
    }

    #[test]
    fn expiry_saturates_instead_of_overflowing() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 60), now + Duration::minutes(60));
        assert_eq!(expiry_after(now, i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            expiry_after(DateTime::<Utc>::MAX_UTC, 1),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn age_limit_handles_extreme_values() {
        assert!(exceeds_seconds(Duration::seconds(901), 900));
        assert!(!exceeds_seconds(Duration::seconds(900), 900));
        assert!(!exceeds_seconds(Duration::days(365), i64::MAX));
    }
}
