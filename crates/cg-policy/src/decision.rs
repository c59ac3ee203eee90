// decision.rs — Evaluation results and override outcomes.
//
// Aggregation rules for `PolicyDecision::from_violations`:
//
// - any DENY violation → allowed=false, requires_override=true, and
//   violated_policies lists only the DENY-violating policy names
// - only WARN/AUDIT violations → allowed=true, violations attached
// - no violations → allowed=true
//
// An evaluation error never reaches aggregation; it produces
// `PolicyDecision::evaluation_failed`, which denies and is not overridable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::{PolicyAction, Severity};

/// One policy matched the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub policy_name: String,
    pub severity: Severity,
    pub message: String,
    pub action: PolicyAction,
}

/// The outcome of `PolicyEngine::evaluate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: String,
    /// Names of policies whose DENY action blocked the operation.
    pub violated_policies: Vec<String>,
    /// Every violation found, including WARN and AUDIT ones.
    pub violations: Vec<PolicyViolation>,
    pub requires_override: bool,
    /// Highest severity among violations; INFO when there are none.
    pub severity: Severity,
    pub decided_at: DateTime<Utc>,
}

impl PolicyDecision {
    /// No violations at all.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            violated_policies: Vec::new(),
            violations: Vec::new(),
            requires_override: false,
            severity: Severity::Info,
            decided_at: Utc::now(),
        }
    }

    pub fn from_violations(violations: Vec<PolicyViolation>) -> Self {
        if violations.is_empty() {
            return Self::allow("No policy violations");
        }

        let severity = violations
            .iter()
            .map(|v| v.severity)
            .max()
            .unwrap_or(Severity::Info);
        let denying: Vec<&PolicyViolation> = violations
            .iter()
            .filter(|v| v.action == PolicyAction::Deny)
            .collect();

        if denying.is_empty() {
            let names: Vec<&str> = violations.iter().map(|v| v.policy_name.as_str()).collect();
            return Self {
                allowed: true,
                reason: format!("Allowed with warnings: {}", names.join(", ")),
                violated_policies: Vec::new(),
                violations,
                requires_override: false,
                severity,
                decided_at: Utc::now(),
            };
        }

        let violated_policies: Vec<String> =
            denying.iter().map(|v| v.policy_name.clone()).collect();
        let reason = denying
            .iter()
            .map(|v| format!("{}: {}", v.policy_name, v.message))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            allowed: false,
            reason: format!("Denied by policy: {}", reason),
            violated_policies,
            violations,
            requires_override: true,
            severity,
            decided_at: Utc::now(),
        }
    }

    /// Evaluation of `policy_name` failed. Deny everything; errors are
    /// never overridable.
    pub fn evaluation_failed(policy_name: &str, error: impl std::fmt::Display) -> Self {
        Self {
            allowed: false,
            reason: format!(
                "Policy evaluation failed for '{}' (fail-closed): {}",
                policy_name, error
            ),
            violated_policies: vec![policy_name.to_string()],
            violations: Vec::new(),
            requires_override: false,
            severity: Severity::Critical,
            decided_at: Utc::now(),
        }
    }
}

/// Human input for overriding a denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRequest {
    pub justification: String,
    /// One-time code issued to the approving human.
    pub code: String,
    pub approved_by: Option<String>,
}

impl OverrideRequest {
    pub fn new(justification: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            justification: justification.into(),
            code: code.into(),
            approved_by: None,
        }
    }

    pub fn approved_by(mut self, who: impl Into<String>) -> Self {
        self.approved_by = Some(who.into());
        self
    }
}

/// Why an override was refused. Rejections are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideRejection {
    /// The decision was allowed, or it came from an evaluation error.
    NotEligible,
    MissingJustification,
    InvalidCode,
    AlreadyUsed,
    /// The denying decision is older than the request window.
    TimedOut,
    /// The code could not be durably recorded.
    PersistenceFailed,
}

impl OverrideRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            OverrideRejection::NotEligible => "Decision is not eligible for override",
            OverrideRejection::MissingJustification => "A justification is required",
            OverrideRejection::InvalidCode => "Invalid override code",
            OverrideRejection::AlreadyUsed => "Override code has already been used",
            OverrideRejection::TimedOut => "Override request timed out",
            OverrideRejection::PersistenceFailed => {
                "Override code could not be recorded; override refused"
            }
        }
    }
}

/// The outcome of `PolicyEngine::request_override`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDecision {
    pub approved: bool,
    pub reason: String,
    /// Set only when approved.
    pub override_id: Option<Uuid>,
    /// Advisory; the engine does not re-check it.
    pub expires_at: Option<DateTime<Utc>>,
    pub justification: Option<String>,
    pub approved_by: Option<String>,
    pub rejection: Option<OverrideRejection>,
}

impl OverrideDecision {
    pub fn approve(
        justification: String,
        approved_by: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            approved: true,
            reason: "Override approved".to_string(),
            override_id: Some(Uuid::new_v4()),
            expires_at: Some(expires_at),
            justification: Some(justification),
            approved_by,
            rejection: None,
        }
    }

    pub fn reject(rejection: OverrideRejection) -> Self {
        Self {
            approved: false,
            reason: rejection.reason().to_string(),
            override_id: None,
            expires_at: None,
            justification: None,
            approved_by: None,
            rejection: Some(rejection),
        }
    }
}
