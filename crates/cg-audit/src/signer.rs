// signer.rs — HMAC-SHA256 signing of audit entries.
//
// Each entry is signed over its canonical JSON form: object keys sorted
// recursively, compact separators, with the `signature` field removed.
// Signatures are lowercase hex.

use ring::hmac;
use serde_json::Value;

/// Environment variable consulted for the deployment's audit key.
pub const AUDIT_SECRET_ENV: &str = "CODEGUARD_AUDIT_SECRET";

/// Key used when no secret is configured.
///
/// **Test-only.** Anyone who reads this source can forge entries signed with
/// it. Production deployments must set [`AUDIT_SECRET_ENV`] or pass an
/// explicit secret.
pub const TEST_ONLY_DEFAULT_SECRET: &str = "codeguard-test-only-audit-key-do-not-deploy";

/// Signs and verifies audit entries with a shared HMAC key.
#[derive(Clone)]
pub struct AuditSigner {
    key: hmac::Key,
    uses_default_key: bool,
}

impl std::fmt::Debug for AuditSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSigner")
            .field("uses_default_key", &self.uses_default_key)
            .finish_non_exhaustive()
    }
}

impl AuditSigner {
    /// Build a signer from an explicit secret.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref()),
            uses_default_key: false,
        }
    }

    /// Signer keyed with [`TEST_ONLY_DEFAULT_SECRET`].
    pub fn test_only_default() -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, TEST_ONLY_DEFAULT_SECRET.as_bytes()),
            uses_default_key: true,
        }
    }

    /// Read the key from [`AUDIT_SECRET_ENV`], falling back to the test-only key.
    pub fn from_env_or_default() -> Self {
        match std::env::var(AUDIT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Self::from_secret(secret),
            _ => {
                tracing::warn!(
                    "{} is not set; audit log is signed with the test-only default key",
                    AUDIT_SECRET_ENV
                );
                Self::test_only_default()
            }
        }
    }

    /// Whether this signer uses the published test-only key.
    pub fn uses_default_key(&self) -> bool {
        self.uses_default_key
    }

    /// Sign an entry (any `signature` field is ignored).
    pub fn sign(&self, entry: &Value) -> String {
        let tag = hmac::sign(&self.key, canonicalize(entry).as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Verify a hex signature against an entry in constant time.
    pub fn verify(&self, entry: &Value, signature: &str) -> bool {
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };
        hmac::verify(&self.key, canonicalize(entry).as_bytes(), &tag).is_ok()
    }
}

/// Canonical JSON encoding: sorted keys at every level, no whitespace, and
/// the top-level `signature` field excluded.
pub fn canonicalize(entry: &Value) -> String {
    let mut out = String::new();
    match entry {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().filter(|k| *k != "signature").collect();
            keys.sort();
            write_object(&mut out, map, &keys);
        }
        other => write_value(&mut out, other),
    }
    out
}

fn write_object(out: &mut String, map: &serde_json::Map<String, Value>, keys: &[&String]) {
    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String((*key).clone()).to_string());
        out.push(':');
        write_value(out, &map[key.as_str()]);
    }
    out.push('}');
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            write_object(out, map, &keys);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
