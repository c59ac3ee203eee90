// policy.rs — Policy records and the policy-file loader.
//
// A policy file is a YAML document with a top-level `policies` list:
//
// ```yaml
// policies:
//   - name: no-sql-concatenation
//     description: Block SQL assembled from strings
//     severity: HIGH     # optional, default HIGH
//     action: DENY       # optional, default DENY
//     paths: ["**/*.py"] # optional glob scope over the operation's file_path
//     rule: |
//       package codeguard.sql
//       deny[msg] {
//         contains(input.code, "SELECT")
//         msg := "SQL concatenation"
//       }
// ```
//
// Every rule goes through a structural check that does not need the
// external evaluator: delimiters must balance outside strings and comments,
// and a `package` declaration must be present. Any failure aborts loading.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// How serious a violation is. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    #[default]
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a matching policy does to the operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyAction {
    /// Block the operation (overridable by a human).
    #[default]
    Deny,
    /// Allow, but attach the violation to the decision.
    Warn,
    /// Allow, record for later review.
    Audit,
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PolicyAction::Deny => "DENY",
            PolicyAction::Warn => "WARN",
            PolicyAction::Audit => "AUDIT",
        })
    }
}

/// A single loaded policy. Immutable once the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique name, reported in decisions.
    pub name: String,

    /// Human-readable purpose; used as the violation message fallback.
    pub description: String,

    /// Rule source in the external rule language.
    pub rule: String,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub action: PolicyAction,

    /// Glob patterns over `file_path`. Empty means every file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl Policy {
    /// Whether this policy is in scope for an operation on `file_path`.
    ///
    /// Operations without a path are always in scope.
    pub fn applies_to(&self, file_path: Option<&str>) -> bool {
        let Some(file_path) = file_path else {
            return true;
        };
        if self.paths.is_empty() {
            return true;
        }
        // Patterns were validated at load; an unparsable one keeps the
        // policy in scope rather than silently dropping it.
        self.paths.iter().any(|p| match Pattern::new(p) {
            Ok(pattern) => pattern.matches(file_path),
            Err(_) => true,
        })
    }

    /// The package declared by the rule, e.g. `codeguard.sql`.
    pub fn declared_package(&self) -> Option<String> {
        declared_package(&self.rule)
    }
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    policies: Vec<Policy>,
}

/// Reads and validates policy files.
pub struct PolicyLoader;

impl PolicyLoader {
    /// Load policies from a file that must exist.
    pub fn load(path: &Path) -> Result<Vec<Policy>, PolicyError> {
        if !path.exists() {
            return Err(PolicyError::PolicyFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse and validate policy-file content. `source` is only used in errors.
    pub fn parse(content: &str, source: &Path) -> Result<Vec<Policy>, PolicyError> {
        let file: PolicyFile =
            serde_yaml::from_str(content).map_err(|e| PolicyError::ParseFailed {
                path: source.to_path_buf(),
                source: e,
            })?;

        let mut seen = HashSet::new();
        for (index, policy) in file.policies.iter().enumerate() {
            Self::validate(index, policy)?;
            if !seen.insert(policy.name.as_str()) {
                return Err(PolicyError::DuplicatePolicy {
                    name: policy.name.clone(),
                });
            }
        }
        Ok(file.policies)
    }

    fn validate(index: usize, policy: &Policy) -> Result<(), PolicyError> {
        let invalid = |reason: &str| PolicyError::InvalidPolicy {
            index,
            name: policy.name.clone(),
            reason: reason.to_string(),
        };

        if policy.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if policy.rule.trim().is_empty() {
            return Err(invalid("rule must not be empty"));
        }
        for pattern in &policy.paths {
            Pattern::new(pattern)
                .map_err(|e| invalid(&format!("invalid path pattern '{}': {}", pattern, e)))?;
        }
        check_rule_structure(&policy.rule).map_err(|reason| PolicyError::MalformedRule {
            policy: policy.name.clone(),
            reason,
        })
    }
}

static PACKAGE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)")
        .expect("static regex")
});

/// Extract the declared package name from rule source.
pub fn declared_package(rule: &str) -> Option<String> {
    let stripped = strip_strings_and_comments(rule).ok()?;
    PACKAGE_DECL
        .captures(&stripped)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Structural check independent of any external tool.
///
/// Strings (`"..."`, `` `...` ``) and `#` comments are blanked out first, so
/// brackets inside them do not count. Then `{}`, `[]` and `()` must nest
/// correctly, and a `package` declaration must be present.
pub fn check_rule_structure(rule: &str) -> Result<(), String> {
    let stripped = strip_strings_and_comments(rule)?;

    let mut stack: Vec<(char, usize)> = Vec::new();
    for (line_no, line) in stripped.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' | '[' | '(' => stack.push((c, line_no + 1)),
                '}' | ']' | ')' => {
                    let expected = match c {
                        '}' => '{',
                        ']' => '[',
                        _ => '(',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, opened_at)) => {
                            return Err(format!(
                                "'{}' on line {} closes '{}' opened on line {}",
                                c,
                                line_no + 1,
                                open,
                                opened_at
                            ))
                        }
                        None => {
                            return Err(format!("unmatched '{}' on line {}", c, line_no + 1))
                        }
                    }
                }
                _ => {}
            }
        }
    }
    if let Some((open, line)) = stack.pop() {
        return Err(format!("unclosed '{}' opened on line {}", open, line));
    }

    if !PACKAGE_DECL.is_match(&stripped) {
        return Err("missing package declaration".to_string());
    }
    Ok(())
}

/// Replace string literal contents and comments with spaces, keeping line
/// structure. Fails on an unterminated string.
fn strip_strings_and_comments(rule: &str) -> Result<String, String> {
    let mut out = String::with_capacity(rule.len());
    let mut chars = rule.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '#' => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' => {
                let start = line;
                let mut closed = false;
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            chars.next();
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\n' => {
                            return Err(format!("unterminated string on line {}", start));
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return Err(format!("unterminated string on line {}", start));
                }
                out.push_str("\"\"");
            }
            '`' => {
                let start = line;
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '`' {
                        closed = true;
                        break;
                    }
                    if next == '\n' {
                        line += 1;
                        out.push('\n');
                    }
                }
                if !closed {
                    return Err(format!("unterminated raw string on line {}", start));
                }
                out.push_str("``");
            }
            '\n' => {
                line += 1;
                out.push('\n');
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const RULE: &str = r#"package codeguard.sql

deny[msg] {
    input.operation == "code_edit"
    contains(input.code, "SELECT")
    msg := "no {raw} SQL"  # braces in strings and comments ( do not count
}
"#;

    fn src() -> PathBuf {
        PathBuf::from("policy.yaml")
    }

    #[test]
    fn balanced_rule_with_package_passes() {
        assert_eq!(check_rule_structure(RULE), Ok(()));
        assert_eq!(declared_package(RULE).as_deref(), Some("codeguard.sql"));
    }

    #[test]
    fn unbalanced_brace_fails() {
        let err = check_rule_structure("package p\ndeny { true\n").unwrap_err();
        assert!(err.contains("unclosed '{'"), "{err}");
    }

    #[test]
    fn mismatched_bracket_fails() {
        let err = check_rule_structure("package p\ndeny { x[1) }\n").unwrap_err();
        assert!(err.contains("closes '['"), "{err}");
    }

    #[test]
    fn stray_closer_fails() {
        assert!(check_rule_structure("package p\n}\n").is_err());
    }

    #[test]
    fn missing_package_fails() {
        let err = check_rule_structure("deny { true }").unwrap_err();
        assert_eq!(err, "missing package declaration");
    }

    #[test]
    fn package_only_in_comment_or_string_does_not_count() {
        assert!(check_rule_structure("# package p\ndeny { true }").is_err());
        assert!(check_rule_structure("x := \"package p\"").is_err());
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(check_rule_structure("package p\nx := \"abc\n").is_err());
    }

    #[test]
    fn raw_strings_are_stripped() {
        assert!(check_rule_structure("package p\nx := `({[`\n").is_ok());
    }

    #[test]
    fn parse_applies_defaults() {
        let yaml = format!(
            "policies:\n  - name: a\n    description: d\n    rule: |\n{}",
            RULE.lines()
                .map(|l| format!("      {}\n", l))
                .collect::<String>()
        );
        let policies = PolicyLoader::parse(&yaml, &src()).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].severity, Severity::High);
        assert_eq!(policies[0].action, PolicyAction::Deny);
        assert!(policies[0].paths.is_empty());
    }

    #[test]
    fn parse_rejects_unknown_severity() {
        let yaml = "policies:\n  - name: a\n    description: d\n    severity: SEVERE\n    rule: package p\n";
        assert!(matches!(
            PolicyLoader::parse(yaml, &src()),
            Err(PolicyError::ParseFailed { .. })
        ));
    }

    #[test]
    fn parse_rejects_unknown_action() {
        let yaml = "policies:\n  - name: a\n    description: d\n    action: BLOCK\n    rule: package p\n";
        assert!(PolicyLoader::parse(yaml, &src()).is_err());
    }

    #[test]
    fn parse_rejects_empty_name_and_rule() {
        let yaml = "policies:\n  - name: ''\n    description: d\n    rule: package p\n";
        assert!(matches!(
            PolicyLoader::parse(yaml, &src()),
            Err(PolicyError::InvalidPolicy { index: 0, .. })
        ));
        let yaml = "policies:\n  - name: a\n    description: d\n    rule: '  '\n";
        assert!(matches!(
            PolicyLoader::parse(yaml, &src()),
            Err(PolicyError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn parse_rejects_missing_description() {
        let yaml = "policies:\n  - name: a\n    rule: package p\n";
        assert!(matches!(
            PolicyLoader::parse(yaml, &src()),
            Err(PolicyError::ParseFailed { .. })
        ));
    }

    #[test]
    fn parse_rejects_duplicates() {
        let yaml = "policies:\n  - {name: a, description: d, rule: package p}\n  - {name: a, description: e, rule: package q}\n";
        assert!(matches!(
            PolicyLoader::parse(yaml, &src()),
            Err(PolicyError::DuplicatePolicy { .. })
        ));
    }

    #[test]
    fn parse_rejects_bad_glob() {
        let yaml = "policies:\n  - {name: a, description: d, rule: package p, paths: ['src/[']}\n";
        assert!(matches!(
            PolicyLoader::parse(yaml, &src()),
            Err(PolicyError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn path_scope() {
        let policy = Policy {
            name: "py-only".into(),
            description: "d".into(),
            rule: "package p".into(),
            severity: Severity::Low,
            action: PolicyAction::Warn,
            paths: vec!["src/**/*.py".into()],
        };
        assert!(policy.applies_to(Some("src/app/db.py")));
        assert!(!policy.applies_to(Some("src/app/db.rs")));
        assert!(policy.applies_to(None));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low > Severity::Info);
        assert_eq!(
            serde_json::to_string(&Severity::Medium).unwrap(),
            "\"MEDIUM\""
        );
    }
}
