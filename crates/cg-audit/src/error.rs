// error.rs — Error types for the audit subsystem.
//
// Integrity failures carry the 1-based line number of the offending entry
// (and its timestamp when it could be recovered) so an operator can go
// straight to the tampered record.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the audit log file.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the process-private directory for an unnamed log.
    #[error("failed to create private audit directory: {0}")]
    PrivateDirFailed(std::io::Error),

    /// Failed to read the log back for scanning or verification.
    #[error("failed to read audit log at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an event to the log.
    #[error("failed to append event: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to serialize an event.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A line is not valid UTF-8 or could not be parsed as a JSON object.
    #[error("integrity check failed at line {line}: entry is not a valid JSON object")]
    UnparsableLine { line: usize },

    /// A line carries no signature (or a non-string one).
    #[error("integrity check failed at line {line}{}: signature missing", fmt_ts(.timestamp))]
    MissingSignature {
        line: usize,
        timestamp: Option<String>,
    },

    /// The stored signature does not match the recomputed one.
    #[error("integrity check failed at line {line}{}: signature mismatch", fmt_ts(.timestamp))]
    SignatureMismatch {
        line: usize,
        timestamp: Option<String>,
    },
}

impl AuditError {
    /// Line number for integrity errors, `None` for I/O and serialization errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            AuditError::UnparsableLine { line }
            | AuditError::MissingSignature { line, .. }
            | AuditError::SignatureMismatch { line, .. } => Some(*line),
            _ => None,
        }
    }
}

fn fmt_ts(timestamp: &Option<String>) -> String {
    match timestamp {
        Some(ts) => format!(" (timestamp {})", ts),
        None => String::new(),
    }
}
