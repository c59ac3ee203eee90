//! # cg-policy
//!
//! Fail-closed policy engine for AI-driven code modifications.
//!
//! A [`PolicyEngine`] loads policy rules from a YAML file, evaluates each
//! [`Operation`] against them through one [`RuleEvaluator`] backend, and
//! returns a [`PolicyDecision`]. A denied operation can be overridden once
//! per human-issued code through [`PolicyEngine::request_override`].
//!
//! ## Key invariants
//!
//! - **Fail closed**: a malformed policy makes the engine unconstructible;
//!   an evaluator error, timeout, or unparsable result denies the operation.
//! - **DENY wins**: any DENY violation sets `allowed = false`, however many
//!   WARN or AUDIT violations accompany it.
//! - **Single-use codes**: redeemed override codes are persisted beside the
//!   policy file before an approval is returned, and survive restarts.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use cg_policy::{Operation, OverrideRequest, PolicyEngine};
//!
//! let engine = PolicyEngine::from_policy_file(".codeguard/policy.yaml").unwrap();
//! let op = Operation::new("code_edit", "q = \"SELECT * FROM t WHERE id=\" + uid", "python");
//! let decision = engine.evaluate(&op);
//! if decision.requires_override {
//!     let outcome = engine.request_override(
//!         &op,
//!         &decision,
//!         &OverrideRequest::new("hotfix approved in review", "482913"),
//!     );
//!     println!("{}", outcome.reason);
//! }
//! ```

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod operation;
pub mod overrides;
pub mod policy;

pub use config::{
    EngineConfig, EvaluatorSelection, DEFAULT_POLICY_PATH, MAX_OVERRIDE_REQUEST_TIMEOUT_SECS,
    MAX_OVERRIDE_VALIDITY_MINUTES,
};
pub use decision::{
    OverrideDecision, OverrideRejection, OverrideRequest, PolicyDecision, PolicyViolation,
};
pub use engine::PolicyEngine;
pub use error::{EvaluationError, PolicyError};
pub use evaluator::{ExternalEvaluator, LocalEvaluator, RuleEvaluator};
pub use operation::{EvaluationInput, Operation};
pub use overrides::{UsedOverrideCodes, USED_CODES_FILE};
pub use policy::{Policy, PolicyAction, PolicyLoader, Severity};
