// external.rs — Evaluate rules with an OPA-compatible command-line tool.
//
// Per policy, the rule and the input document are written to a fresh
// temporary directory and the CLI is run once per candidate query:
//
//   <bin> eval --format json --data <dir>/policy.rego --input <dir>/input.json <query>
//
// Candidates are the legacy fixed path `data.codeguard.deny`, then
// `data.<package>.deny` for the rule's declared package. A candidate that
// exits 0 with an undefined result (`{}`) falls through to the next one.
// A nonzero exit falls through only while no candidate has answered yet;
// after an undefined answer it is an error. Nonzero exit on every
// candidate, a timeout, or output we cannot parse is also an error, and
// the engine fails closed on it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde_json::Value;

use super::process::{run_with_timeout, ProcessOutput};
use super::RuleEvaluator;
use crate::decision::PolicyViolation;
use crate::error::EvaluationError;
use crate::operation::EvaluationInput;
use crate::policy::Policy;

/// Query tried first for every policy.
pub const LEGACY_QUERY: &str = "data.codeguard.deny";

const RULE_FILE: &str = "policy.rego";
const INPUT_FILE: &str = "input.json";

/// Backend that delegates to an external rule-evaluation CLI.
#[derive(Debug, Clone)]
pub struct ExternalEvaluator {
    binary: PathBuf,
    syntax_check_timeout: Duration,
    evaluation_timeout: Duration,
}

impl ExternalEvaluator {
    pub fn new(
        binary: impl Into<PathBuf>,
        syntax_check_timeout: Duration,
        evaluation_timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            syntax_check_timeout,
            evaluation_timeout,
        }
    }

    /// Locate `binary` and confirm it runs (`<bin> version`).
    ///
    /// Never fails: a missing binary, nonzero exit, or timeout all mean
    /// "unavailable" and yield `None`.
    pub fn detect(binary: &str, timeout: Duration) -> Option<PathBuf> {
        let path = match which::which(binary) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(binary, error = %e, "rule evaluator not found");
                return None;
            }
        };

        let mut cmd = Command::new(&path);
        cmd.arg("version");
        match run_with_timeout(cmd, timeout) {
            Ok(out) if out.status.success() => {
                tracing::debug!(binary = %path.display(), version = %out.stdout.trim(), "rule evaluator available");
                Some(path)
            }
            Ok(out) => {
                tracing::debug!(binary = %path.display(), status = %out.status, "rule evaluator detection failed");
                None
            }
            Err(e) => {
                tracing::debug!(binary = %path.display(), error = %e, "rule evaluator detection failed");
                None
            }
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run the CLI's syntax check over a policy's rule.
    pub fn check_syntax(&self, policy: &Policy) -> Result<(), EvaluationError> {
        let dir = tempfile::tempdir()?;
        let rule_path = dir.path().join(RULE_FILE);
        fs::write(&rule_path, &policy.rule)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("check").arg(&rule_path);
        let out = run_with_timeout(cmd, self.syntax_check_timeout)?;
        if !out.status.success() {
            return Err(self.non_zero(out));
        }
        Ok(())
    }

    /// Queries to try, in order, for a policy.
    pub fn candidate_queries(policy: &Policy) -> Vec<String> {
        let mut queries = vec![LEGACY_QUERY.to_string()];
        if let Some(package) = policy.declared_package() {
            let query = format!("data.{}.deny", package);
            if query != LEGACY_QUERY {
                queries.push(query);
            }
        }
        queries
    }

    fn non_zero(&self, out: ProcessOutput) -> EvaluationError {
        EvaluationError::NonZeroExit {
            program: self.binary.display().to_string(),
            status: out.status.to_string(),
            stderr: out.stderr.trim().to_string(),
        }
    }
}

impl RuleEvaluator for ExternalEvaluator {
    fn name(&self) -> &'static str {
        "external"
    }

    fn evaluate(
        &self,
        policy: &Policy,
        input: &EvaluationInput,
    ) -> Result<Option<PolicyViolation>, EvaluationError> {
        let dir = tempfile::tempdir()?;
        let rule_path = dir.path().join(RULE_FILE);
        let input_path = dir.path().join(INPUT_FILE);
        fs::write(&rule_path, &policy.rule)?;
        let input_json = serde_json::to_vec(input).map_err(|e| EvaluationError::MalformedOutput {
            reason: format!("could not serialize input: {}", e),
        })?;
        fs::write(&input_path, input_json)?;

        let mut last_failure = None;
        let mut any_undefined = false;

        for query in Self::candidate_queries(policy) {
            let mut cmd = Command::new(&self.binary);
            cmd.args(["eval", "--format", "json", "--data"])
                .arg(&rule_path)
                .arg("--input")
                .arg(&input_path)
                .arg(&query);

            tracing::debug!(policy = %policy.name, query = %query, "running external evaluation");
            let out = run_with_timeout(cmd, self.evaluation_timeout)?;
            if !out.status.success() {
                tracing::debug!(policy = %policy.name, query = %query, status = %out.status, "query failed");
                let failure = self.non_zero(out);
                // An undefined earlier candidate does not vouch for this one.
                if any_undefined {
                    return Err(failure);
                }
                last_failure = Some(failure);
                continue;
            }

            match deny_value(&out.stdout)? {
                None => any_undefined = true,
                Some(value) => return violation_from(policy, &value),
            }
        }

        match (any_undefined, last_failure) {
            (true, _) => Ok(None),
            (false, Some(err)) => Err(err),
            (false, None) => Err(EvaluationError::MalformedOutput {
                reason: "no query candidates".to_string(),
            }),
        }
    }
}

/// Extract the value of the first expression, or `None` when undefined.
fn deny_value(stdout: &str) -> Result<Option<Value>, EvaluationError> {
    let doc: Value = serde_json::from_str(stdout).map_err(|e| EvaluationError::MalformedOutput {
        reason: format!("evaluator output is not JSON: {}", e),
    })?;
    let Some(obj) = doc.as_object() else {
        return Err(EvaluationError::MalformedOutput {
            reason: "evaluator output is not an object".to_string(),
        });
    };

    let results = match obj.get("result") {
        None => return Ok(None),
        Some(Value::Array(results)) if results.is_empty() => return Ok(None),
        Some(Value::Array(results)) => results,
        Some(_) => {
            return Err(EvaluationError::MalformedOutput {
                reason: "'result' is not an array".to_string(),
            })
        }
    };

    results[0]
        .get("expressions")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("value"))
        .cloned()
        .map(Some)
        .ok_or_else(|| EvaluationError::MalformedOutput {
            reason: "result has no expression value".to_string(),
        })
}

fn violation_from(
    policy: &Policy,
    value: &Value,
) -> Result<Option<PolicyViolation>, EvaluationError> {
    let messages: Vec<&str> = match value {
        Value::Null | Value::Bool(false) => return Ok(None),
        Value::Bool(true) => Vec::new(),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) if items.is_empty() => return Ok(None),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::Object(map) if map.is_empty() => return Ok(None),
        Value::Object(map) => map.values().filter_map(Value::as_str).collect(),
        Value::Number(_) => {
            return Err(EvaluationError::MalformedOutput {
                reason: format!("unexpected deny value: {}", value),
            })
        }
    };

    let message = if messages.is_empty() {
        policy.description.clone()
    } else {
        messages.join("; ")
    };
    Ok(Some(PolicyViolation {
        policy_name: policy.name.clone(),
        severity: policy.severity,
        message,
        action: policy.action,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyAction, Severity};

    fn policy(rule: &str) -> Policy {
        Policy {
            name: "p".into(),
            description: "fallback message".into(),
            rule: rule.into(),
            severity: Severity::Medium,
            action: PolicyAction::Warn,
            paths: Vec::new(),
        }
    }

    #[test]
    fn candidates_include_declared_package() {
        let q = ExternalEvaluator::candidate_queries(&policy("package acme.sql\n"));
        assert_eq!(q, vec!["data.codeguard.deny", "data.acme.sql.deny"]);
    }

    #[test]
    fn legacy_package_not_duplicated() {
        let q = ExternalEvaluator::candidate_queries(&policy("package codeguard\n"));
        assert_eq!(q, vec!["data.codeguard.deny"]);
    }

    #[test]
    fn undefined_result_is_none() {
        assert_eq!(deny_value("{}").unwrap(), None);
        assert_eq!(deny_value(r#"{"result": []}"#).unwrap(), None);
    }

    #[test]
    fn defined_result_extracted() {
        let out = r#"{"result":[{"expressions":[{"value":["bad sql"],"text":"data.x.deny"}]}]}"#;
        assert_eq!(deny_value(out).unwrap(), Some(serde_json::json!(["bad sql"])));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            deny_value("not json"),
            Err(EvaluationError::MalformedOutput { .. })
        ));
        assert!(deny_value("[1,2]").is_err());
        assert!(deny_value(r#"{"result":[{}]}"#).is_err());
    }

    #[test]
    fn deny_set_messages_joined() {
        let p = policy("package p");
        let v = violation_from(&p, &serde_json::json!(["a", "b"]))
            .unwrap()
            .unwrap();
        assert_eq!(v.message, "a; b");
        assert_eq!(v.severity, Severity::Medium);
        assert_eq!(v.action, PolicyAction::Warn);
    }

    #[test]
    fn deny_without_strings_uses_description() {
        let p = policy("package p");
        let v = violation_from(&p, &serde_json::json!(true)).unwrap().unwrap();
        assert_eq!(v.message, "fallback message");
    }

    #[test]
    fn empty_deny_is_no_violation() {
        let p = policy("package p");
        assert_eq!(violation_from(&p, &serde_json::json!([])).unwrap(), None);
        assert_eq!(violation_from(&p, &serde_json::json!(false)).unwrap(), None);
        assert!(violation_from(&p, &serde_json::json!(3)).is_err());
    }

    #[test]
    fn detect_missing_binary_is_unavailable() {
        assert!(
            ExternalEvaluator::detect("codeguard-no-such-evaluator", Duration::from_secs(1))
                .is_none()
        );
    }
}
