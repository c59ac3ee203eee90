//! # cg-audit
//!
//! Tamper-evident audit trail for the codeguard policy engine.
//!
//! Events are appended to a JSONL file, one object per line, each signed
//! with HMAC-SHA256 over its canonical form. [`AuditLog::verify_integrity`]
//! replays the file and reports the first line whose signature is missing
//! or wrong.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use cg_audit::{AuditLog, AuditSigner};
//! use serde_json::json;
//!
//! let mut log = AuditLog::open("/var/lib/codeguard/audit.jsonl", AuditSigner::from_env_or_default()).unwrap();
//! log.record_event("override_approved", "HIGH", json!({"policy": "no-sql"}), None).unwrap();
//! log.verify_integrity().unwrap();
//! ```

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;
pub mod signer;

pub use error::AuditError;
pub use event::AuditEvent;
pub use log::{verify_file, AuditLog};
pub use signer::{AuditSigner, AUDIT_SECRET_ENV, TEST_ONLY_DEFAULT_SECRET};
