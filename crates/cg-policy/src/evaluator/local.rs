// local.rs — In-process approximation of a restricted rule subset.
//
// Used when the external evaluator is not installed. Recognised shapes:
//
//   input.operation == "<value>"            operation guard
//   input.language == "<value>"             language guard
//   contains(input.code, "<text>")          required substring
//   not contains(input.code, "<text>")      forbidden substring
//   msg := "<text>"                         violation message
//
// Each `deny ... { }` body is read on its own, since separate bodies are
// alternatives. A body matches when every guard in it is satisfied, every
// required substring is present and no forbidden one is; the policy matches
// when any body does. A body with no substring predicates never matches,
// and neither does a rule whose deny bodies cannot be delimited. Such rules
// need the external evaluator.
//
// SQL-related policies get one safety exception: a match is dropped when
// the code already uses a parameterized query for its language.

use once_cell::sync::Lazy;
use regex::Regex;

use cg_semantic::{contains_sql_keyword, SemanticAnalyzer};

use super::RuleEvaluator;
use crate::decision::PolicyViolation;
use crate::error::EvaluationError;
use crate::operation::EvaluationInput;
use crate::policy::Policy;

static OPERATION_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"input\.operation\s*==\s*"((?:[^"\\]|\\.)*)""#).expect("static regex")
});

static LANGUAGE_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"input\.language\s*==\s*"((?:[^"\\]|\\.)*)""#).expect("static regex")
});

static CONTAINS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\bnot\s+)?contains\(\s*input\.code\s*,\s*"((?:[^"\\]|\\.)*)"\s*\)"#)
        .expect("static regex")
});

static DENY_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bdeny\b[^{\n]*\{").expect("static regex"));

static MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"msg\s*:?=\s*"((?:[^"\\]|\\.)*)""#).expect("static regex"));

/// The recognised parts of one rule.
#[derive(Debug, Default, PartialEq, Eq)]
struct RuleShape {
    operations: Vec<String>,
    languages: Vec<String>,
    required: Vec<String>,
    forbidden: Vec<String>,
    message: Option<String>,
}

impl RuleShape {
    fn extract(rule: &str) -> Self {
        let mut shape = RuleShape {
            operations: captures(&OPERATION_GUARD, rule),
            languages: captures(&LANGUAGE_GUARD, rule),
            message: MESSAGE.captures(rule).map(|c| unescape(&c[1])),
            ..Default::default()
        };
        for c in CONTAINS.captures_iter(rule) {
            let text = unescape(&c[2]);
            if c.get(1).is_some() {
                shape.forbidden.push(text);
            } else {
                shape.required.push(text);
            }
        }
        shape
    }

    fn matches(&self, input: &EvaluationInput) -> bool {
        if self.required.is_empty() && self.forbidden.is_empty() {
            return false;
        }
        if !self.operations.is_empty() && !self.operations.iter().any(|o| *o == input.operation) {
            return false;
        }
        if !self.languages.is_empty()
            && !self
                .languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(&input.language))
        {
            return false;
        }
        self.required.iter().all(|s| input.code.contains(s.as_str()))
            && !self.forbidden.iter().any(|s| input.code.contains(s.as_str()))
    }
}

/// The text inside each `deny` body. Empty when the rule has no deny head
/// or any body is left unclosed.
fn deny_bodies(rule: &str) -> Vec<&str> {
    let masked = mask_strings_and_comments(rule);
    let bytes = masked.as_bytes();
    let mut bodies = Vec::new();

    for head in DENY_HEAD.find_iter(&masked) {
        let start = head.end();
        let mut depth = 1usize;
        let mut end = None;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(start + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(end) => bodies.push(&rule[start..end]),
            None => return Vec::new(),
        }
    }
    bodies
}

/// Blank out string literals and `#` comments byte for byte, so offsets
/// into the result are offsets into `rule`.
fn mask_strings_and_comments(rule: &str) -> String {
    let mut out = String::with_capacity(rule.len());
    let mut in_comment = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in rule.chars() {
        let hidden = if in_comment {
            in_comment = c != '\n';
            in_comment
        } else if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            c != '\n'
        } else if c == '#' {
            in_comment = true;
            true
        } else if c == '"' || c == '`' {
            quote = Some(c);
            true
        } else {
            false
        };

        if hidden {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            out.push(c);
        }
    }
    out
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text).map(|c| unescape(&c[1])).collect()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Backend used when no external evaluator is available.
#[derive(Debug, Default)]
pub struct LocalEvaluator {
    analyzer: SemanticAnalyzer,
}

impl LocalEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_sql_related(policy: &Policy, shape: &RuleShape) -> bool {
        let mentions_sql = |s: &str| s.to_ascii_lowercase().contains("sql");
        mentions_sql(&policy.name)
            || mentions_sql(&policy.description)
            || shape.required.iter().any(|s| contains_sql_keyword(s))
    }
}

impl RuleEvaluator for LocalEvaluator {
    fn name(&self) -> &'static str {
        "local"
    }

    fn evaluate(
        &self,
        policy: &Policy,
        input: &EvaluationInput,
    ) -> Result<Option<PolicyViolation>, EvaluationError> {
        let bodies = deny_bodies(&policy.rule);
        if bodies.is_empty() {
            tracing::debug!(policy = %policy.name, "no deny body recognised; policy not applied");
            return Ok(None);
        }

        for body in bodies {
            let shape = RuleShape::extract(body);
            if !shape.matches(input) {
                continue;
            }
            if Self::is_sql_related(policy, &shape)
                && self
                    .analyzer
                    .has_parameterization(&input.code, input.language.as_str())
            {
                tracing::debug!(policy = %policy.name, language = %input.language, "match suppressed: parameterized query");
                continue;
            }
            return Ok(Some(PolicyViolation {
                policy_name: policy.name.clone(),
                severity: policy.severity,
                message: shape.message.unwrap_or_else(|| policy.description.clone()),
                action: policy.action,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::policy::{PolicyAction, Severity};

    fn policy(name: &str, rule: &str) -> Policy {
        Policy {
            name: name.into(),
            description: format!("{} description", name),
            rule: rule.into(),
            severity: Severity::High,
            action: PolicyAction::Deny,
            paths: Vec::new(),
        }
    }

    fn input(op: &str, code: &str, language: &str) -> EvaluationInput {
        EvaluationInput::from(&Operation::new(op, code, language))
    }

    #[test]
    fn extracts_all_predicates() {
        let shape = RuleShape::extract(
            r##"package p
deny[msg] {
    input.operation == "code_edit"
    input.language == "python"
    contains(input.code, "eval(")
    not contains(input.code, "# safe: \"reviewed\"")
    msg := "eval is forbidden"
}"##,
        );
        assert_eq!(shape.operations, vec!["code_edit"]);
        assert_eq!(shape.languages, vec!["python"]);
        assert_eq!(shape.required, vec!["eval("]);
        assert_eq!(shape.forbidden, vec!["# safe: \"reviewed\""]);
        assert_eq!(shape.message.as_deref(), Some("eval is forbidden"));
    }

    #[test]
    fn required_and_forbidden_substrings() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "no-eval",
            r#"package p
deny[msg] { contains(input.code, "eval(")
  not contains(input.code, "ast.literal_eval(") }"#,
        );
        assert!(eval
            .evaluate(&p, &input("code_edit", "x = eval(s)", "python"))
            .unwrap()
            .is_some());
        assert!(eval
            .evaluate(&p, &input("code_edit", "x = ast.literal_eval(s)", "python"))
            .unwrap()
            .is_none());
        assert!(eval
            .evaluate(&p, &input("code_edit", "x = int(s)", "python"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn operation_guard_skips_other_types() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "edit-only",
            r#"package p
deny[msg] { input.operation == "code_edit"
  contains(input.code, "TODO") }"#,
        );
        assert!(eval
            .evaluate(&p, &input("code_edit", "# TODO", "python"))
            .unwrap()
            .is_some());
        assert!(eval
            .evaluate(&p, &input("file_write", "# TODO", "python"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn language_guard_is_case_insensitive() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "js-only",
            r#"package p
deny[msg] { input.language == "javascript"
  contains(input.code, "innerHTML") }"#,
        );
        assert!(eval
            .evaluate(&p, &input("code_edit", "el.innerHTML = x", "JavaScript"))
            .unwrap()
            .is_some());
        assert!(eval
            .evaluate(&p, &input("code_edit", "el.innerHTML = x", "python"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn unrecognised_rule_never_matches() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "opaque",
            r#"package p
deny[msg] { count(input.affected_files) > 10
  msg := "too many files" }"#,
        );
        assert!(eval
            .evaluate(&p, &input("code_edit", "anything", "python"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn message_falls_back_to_description() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "no-print",
            r#"package p
deny[msg] { contains(input.code, "print(") }"#,
        );
        let v = eval
            .evaluate(&p, &input("code_edit", "print(1)", "python"))
            .unwrap()
            .unwrap();
        assert_eq!(v.message, "no-print description");
        assert_eq!(v.policy_name, "no-print");
    }

    #[test]
    fn sql_detection_by_name_or_keyword() {
        let shape = RuleShape::extract(r#"contains(input.code, "select ")"#);
        assert!(LocalEvaluator::is_sql_related(&policy("p", ""), &shape));
        let shape = RuleShape::extract(r#"contains(input.code, "exec(")"#);
        assert!(LocalEvaluator::is_sql_related(&policy("raw-sql", ""), &shape));
        assert!(!LocalEvaluator::is_sql_related(&policy("no-exec", ""), &shape));
    }

    #[test]
    fn separate_deny_bodies_are_alternatives() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "no-dynamic-exec",
            r#"package p
deny[msg] {
    contains(input.code, "eval(")
    msg := "eval call"
}
deny[msg] {
    contains(input.code, "exec(")
    msg := "exec call"
}"#,
        );
        let v = eval
            .evaluate(&p, &input("code_edit", "x = eval(s)", "python"))
            .unwrap()
            .unwrap();
        assert_eq!(v.message, "eval call");
        let v = eval
            .evaluate(&p, &input("code_edit", "exec(s)", "python"))
            .unwrap()
            .unwrap();
        assert_eq!(v.message, "exec call");
        assert!(eval
            .evaluate(&p, &input("code_edit", "print(s)", "python"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn guards_bind_to_their_own_body() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "split-guards",
            r#"package p
deny[msg] { input.operation == "file_write"
  contains(input.code, "secret") }
deny[msg] { contains(input.code, "password") }"#,
        );
        assert!(eval
            .evaluate(&p, &input("code_edit", "secret = 1", "python"))
            .unwrap()
            .is_none());
        assert!(eval
            .evaluate(&p, &input("code_edit", "password = 1", "python"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn body_delimiting_ignores_braces_in_strings_and_comments() {
        let rule = r##"package p
# deny { is not a head here
deny[msg] {
    contains(input.code, "}{")
    msg := "brace soup {"
}"##;
        let bodies = deny_bodies(rule);
        assert_eq!(bodies.len(), 1);
        let shape = RuleShape::extract(bodies[0]);
        assert_eq!(shape.required, vec!["}{"]);
        assert_eq!(shape.message.as_deref(), Some("brace soup {"));
    }

    #[test]
    fn rule_without_deny_body_never_matches() {
        let eval = LocalEvaluator::new();
        let p = policy(
            "violation-style",
            r#"package p
violation[msg] { contains(input.code, "eval(") }"#,
        );
        assert!(deny_bodies(&p.rule).is_empty());
        assert!(eval
            .evaluate(&p, &input("code_edit", "eval(x)", "python"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn unclosed_body_is_not_applied() {
        assert!(deny_bodies("package p\ndeny[msg] { contains(input.code, \"x\")").is_empty());
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape(r#"a\"b\\c\nd"#), "a\"b\\c\nd");
    }
}
