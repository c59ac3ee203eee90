// log.rs — Append-only, HMAC-signed JSONL audit log.
//
// One JSON object per line. Every entry carries a signature over its
// canonical form, so editing any field of any line without the key is
// detected by `verify_integrity()`. The file handle is only ever opened in
// append mode; `clear()` is the single exception and exists for resets.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tempfile::TempDir;

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::signer::AuditSigner;

const PRIVATE_LOG_NAME: &str = "audit.jsonl";

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    writer: BufWriter<File>,
    path: PathBuf,
    signer: AuditSigner,
    // Keeps a process-private directory alive for logs opened without a path.
    _private_dir: Option<TempDir>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Open (or create) a persistent audit log at the given path.
    pub fn open(path: impl AsRef<Path>, signer: AuditSigner) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        }
        let writer = Self::open_append(&path)?;
        Ok(Self {
            writer,
            path,
            signer,
            _private_dir: None,
        })
    }

    /// Open a log in a fresh, process-private temporary directory.
    ///
    /// Nothing from earlier runs can leak in, and the directory is removed
    /// when the log is dropped. Deployments that need a persistent trail
    /// must use [`AuditLog::open`].
    pub fn private(signer: AuditSigner) -> Result<Self, AuditError> {
        let dir = tempfile::Builder::new()
            .prefix("codeguard-audit-")
            .tempdir()
            .map_err(AuditError::PrivateDirFailed)?;
        let path = dir.path().join(PRIVATE_LOG_NAME);
        let writer = Self::open_append(&path)?;
        Ok(Self {
            writer,
            path,
            signer,
            _private_dir: Some(dir),
        })
    }

    fn open_append(path: &Path) -> Result<BufWriter<File>, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(BufWriter::new(file))
    }

    /// Sign and append one event. Uses the current time unless `timestamp`
    /// is given. Flushes before returning.
    pub fn record_event(
        &mut self,
        event_type: &str,
        severity: &str,
        details: Value,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<AuditEvent, AuditError> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let mut entry = serde_json::Map::new();
        entry.insert("timestamp".into(), serde_json::to_value(timestamp)?);
        entry.insert("event_type".into(), Value::String(event_type.to_string()));
        entry.insert("severity".into(), Value::String(severity.to_string()));
        entry.insert("details".into(), details.clone());
        let mut entry = Value::Object(entry);

        let signature = self.signer.sign(&entry);
        if let Value::Object(map) = &mut entry {
            map.insert("signature".into(), Value::String(signature.clone()));
        }

        writeln!(self.writer, "{}", serde_json::to_string(&entry)?)?;
        self.writer.flush()?;

        Ok(AuditEvent {
            timestamp,
            event_type: event_type.to_string(),
            severity: severity.to_string(),
            details,
            signature,
        })
    }

    /// Replay every line and check its signature.
    ///
    /// Returns the number of verified entries. An absent file is vacuously
    /// valid. The first unparsable line, missing signature, or mismatch is
    /// returned as an error naming its 1-based line number.
    pub fn verify_integrity(&self) -> Result<usize, AuditError> {
        verify_file(&self.path, &self.signer)
    }

    /// Scan the log for events, optionally filtered by type and severity.
    ///
    /// Malformed lines are skipped. With `limit`, only the most recent
    /// `limit` matches are returned, still oldest first.
    pub fn get_events(
        &self,
        event_type: Option<&str>,
        severity: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|source| AuditError::OpenFailed {
            path: self.path.clone(),
            source,
        })?;

        let mut events = Vec::new();
        for raw in BufReader::new(file).split(b'\n') {
            let raw = raw.map_err(|source| AuditError::ReadFailed {
                path: self.path.clone(),
                source,
            })?;
            let Ok(line) = std::str::from_utf8(&raw) else {
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_str::<AuditEvent>(line) else {
                continue;
            };
            if event_type.is_some_and(|t| t != event.event_type) {
                continue;
            }
            if severity.is_some_and(|s| s != event.severity) {
                continue;
            }
            events.push(event);
        }

        if let Some(limit) = limit {
            let skip = events.len().saturating_sub(limit);
            events.drain(..skip);
        }
        Ok(events)
    }

    /// Truncate the log. Intended for resets in tests and fresh deployments.
    pub fn clear(&mut self) -> Result<(), AuditError> {
        self.writer.flush()?;
        File::create(&self.path).map_err(|source| AuditError::OpenFailed {
            path: self.path.clone(),
            source,
        })?;
        self.writer = Self::open_append(&self.path)?;
        tracing::warn!(path = %self.path.display(), "audit log cleared");
        Ok(())
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Verify a log file with the given signer without opening it for writing.
pub fn verify_file(path: impl AsRef<Path>, signer: &AuditSigner) -> Result<usize, AuditError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(0);
    }
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let mut verified = 0;
    for (index, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let line_no = index + 1;
        let raw = raw.map_err(|source| AuditError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let Ok(line) = std::str::from_utf8(&raw) else {
            return Err(AuditError::UnparsableLine { line: line_no });
        };
        if line.trim().is_empty() {
            continue;
        }

        let entry: Value = match serde_json::from_str(line) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Err(AuditError::UnparsableLine { line: line_no }),
        };
        let timestamp = entry
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(signature) = entry.get("signature").and_then(Value::as_str) else {
            return Err(AuditError::MissingSignature {
                line: line_no,
                timestamp,
            });
        };
        if !signer.verify(&entry, signature) {
            return Err(AuditError::SignatureMismatch {
                line: line_no,
                timestamp,
            });
        }
        verified += 1;
    }

    Ok(verified)
}
