// operation.rs — The code-modification request submitted for evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single code-modification request from an agent.
///
/// Built by the caller per request and handed to `PolicyEngine::evaluate`.
/// The engine never persists it as-is; only the derived `EvaluationInput`
/// crosses the process boundary to the external evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Kind of operation, e.g. "code_edit", "file_write", "refactor".
    #[serde(rename = "type")]
    pub operation_type: String,

    /// The code the agent wants to write.
    pub code: String,

    /// Language of `code` (e.g. "python", "javascript").
    pub language: String,

    /// File being modified, if any. Drives policy path scoping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default)]
    pub affected_files: Vec<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub timestamp: DateTime<Utc>,
}

impl Operation {
    pub fn new(
        operation_type: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            operation_type: operation_type.into(),
            code: code.into(),
            language: language.into(),
            file_path: None,
            affected_files: Vec::new(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_affected_file(mut self, path: impl Into<String>) -> Self {
        self.affected_files.push(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The structured document a rule is evaluated against (`input` in rules).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationInput {
    pub operation: String,
    pub code: String,
    pub language: String,
    pub file_path: Option<String>,
    pub metadata: Map<String, Value>,
}

impl From<&Operation> for EvaluationInput {
    fn from(op: &Operation) -> Self {
        Self {
            operation: op.operation_type.clone(),
            code: op.code.clone(),
            language: op.language.clone(),
            file_path: op.file_path.clone(),
            metadata: op.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_document_has_expected_keys() {
        let op = Operation::new("code_edit", "x = 1", "python")
            .with_file_path("app/db.py")
            .with_metadata("agent", "codex");
        let doc = serde_json::to_value(EvaluationInput::from(&op)).unwrap();
        let obj = doc.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["code", "file_path", "language", "metadata", "operation"]
        );
        assert_eq!(doc["operation"], "code_edit");
        assert_eq!(doc["metadata"]["agent"], "codex");
    }

    #[test]
    fn missing_file_path_serializes_as_null_in_input() {
        let op = Operation::new("code_edit", "", "go");
        let doc = serde_json::to_value(EvaluationInput::from(&op)).unwrap();
        assert!(doc["file_path"].is_null());
    }

    #[test]
    fn operation_type_serializes_as_type() {
        let op = Operation::new("refactor", "", "java").with_affected_file("A.java");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "refactor");
        assert_eq!(json["affected_files"][0], "A.java");
    }
}
