//! Rule evaluation backends.
//!
//! The engine picks one backend at construction and keeps it for its
//! lifetime:
//!
//! - [`ExternalEvaluator`] shells out to an OPA-compatible CLI
//! - [`LocalEvaluator`] approximates a restricted rule subset in-process
//!
//! Both report "no violation" as `Ok(None)`. Any `Err` is turned into a
//! deny-all decision by the engine.

mod external;
mod local;
mod process;

pub use external::{ExternalEvaluator, LEGACY_QUERY};
pub use local::LocalEvaluator;
pub use process::{run_with_timeout, ProcessOutput};

use crate::decision::PolicyViolation;
use crate::error::EvaluationError;
use crate::operation::EvaluationInput;
use crate::policy::Policy;

/// A backend that decides whether one policy is violated by one input.
pub trait RuleEvaluator: Send + Sync {
    /// Short backend name for logs ("external", "local").
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        policy: &Policy,
        input: &EvaluationInput,
    ) -> Result<Option<PolicyViolation>, EvaluationError>;
}
