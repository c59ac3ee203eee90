// python.rs — Structural SQL-sink detection for Python source.
//
// This is a token-stream approximation of a syntax-tree walk, not a
// parser: there is no AST, and constructs are recognized from token
// adjacency within a logical line. A small tokenizer turns the source into
// string literals, names, operators and logical-line breaks, tracking
// bracket depth. The walker then looks for the four ways Python code builds a query string:
//
//   "SELECT ... " + user_id           (concatenation, also `+=`)
//   f"SELECT ... {user_id}"           (joined / f-string)
//   "SELECT ... {}".format(user_id)   (.format call)
//   "SELECT ... %s" % user_id         (percent formatting)
//
// and only reports a sink when a SQL keyword sits inside a string literal
// that belongs to that construct. Input the tokenizer cannot make sense of
// (unterminated strings, unbalanced brackets) is reported as `Unparsable`
// and the caller falls back to a flat keyword search.

use crate::sql::contains_sql_keyword;

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Str { text: String, formatted: bool },
    Name(String),
    Number,
    Op(String),
    LineEnd,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    /// Bracket depth of the token. Brackets carry the depth of the
    /// expression that contains them; their contents are one level deeper.
    depth: usize,
}

/// The tokenizer could not make sense of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unparsable;

const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "==", "!=", "<=", ">=", "**", "//",
    "<<", ">>", "->", ":=",
];

fn tokenize(source: &str) -> Result<Vec<Token>, Unparsable> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let depth = stack.len();

        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '\\' && chars.get(i + 1) == Some(&'\n') {
            i += 2;
            continue;
        }
        if c == '\n' {
            if depth == 0 {
                tokens.push(Token { kind: Kind::LineEnd, depth });
            }
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if matches!(chars.get(i), Some('"') | Some('\'')) && is_string_prefix(&word) {
                let formatted = word.to_ascii_lowercase().contains('f');
                let raw = word.to_ascii_lowercase().contains('r');
                let (text, next) = read_string(&chars, i, raw)?;
                tokens.push(Token {
                    kind: Kind::Str { text, formatted },
                    depth,
                });
                i = next;
            } else {
                tokens.push(Token {
                    kind: Kind::Name(word),
                    depth,
                });
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, next) = read_string(&chars, i, false)?;
            tokens.push(Token {
                kind: Kind::Str {
                    text,
                    formatted: false,
                },
                depth,
            });
            i = next;
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token {
                kind: Kind::Number,
                depth,
            });
            continue;
        }

        match c {
            '(' | '[' | '{' => {
                tokens.push(Token {
                    kind: Kind::Op(c.to_string()),
                    depth,
                });
                stack.push(c);
                i += 1;
                continue;
            }
            ')' | ']' | '}' => {
                let open = stack.pop().ok_or(Unparsable)?;
                if !brackets_pair(open, c) {
                    return Err(Unparsable);
                }
                tokens.push(Token {
                    kind: Kind::Op(c.to_string()),
                    depth: stack.len(),
                });
                i += 1;
                continue;
            }
            _ => {}
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        let op = THREE_CHAR_OPS
            .iter()
            .find(|op| rest.starts_with(*op))
            .or_else(|| TWO_CHAR_OPS.iter().find(|op| rest.starts_with(*op)))
            .map(|op| op.to_string())
            .unwrap_or_else(|| c.to_string());
        i += op.chars().count();
        tokens.push(Token {
            kind: Kind::Op(op),
            depth,
        });
    }

    if !stack.is_empty() {
        return Err(Unparsable);
    }
    Ok(tokens)
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

fn brackets_pair(open: char, close: char) -> bool {
    matches!((open, close), ('(', ')') | ('[', ']') | ('{', '}'))
}

/// Read a string literal starting at the quote at `start`. Returns the
/// literal's contents and the index just past its closing quote.
fn read_string(chars: &[char], start: usize, raw: bool) -> Result<(String, usize), Unparsable> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };
    let mut text = String::new();

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            if raw {
                text.push(c);
            }
            text.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == quote {
            if !triple {
                return Ok((text, i + 1));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((text, i + 3));
            }
        }
        if c == '\n' && !triple {
            return Err(Unparsable);
        }
        text.push(c);
        i += 1;
    }
    Err(Unparsable)
}

/// Operators and names that end an operand when scanning outward from
/// a `+` at the same depth.
fn is_operand_boundary(kind: &Kind) -> bool {
    match kind {
        Kind::LineEnd => true,
        Kind::Op(op) => matches!(
            op.as_str(),
            "," | "=" | ":" | ";" | ":=" | "+=" | "-=" | "*=" | "/=" | "%=" | "->"
        ),
        Kind::Name(name) => matches!(
            name.as_str(),
            "return" | "yield" | "if" | "else" | "for" | "in" | "and" | "or" | "not" | "lambda"
                | "assert" | "await"
        ),
        _ => false,
    }
}

fn is_sql_literal(kind: &Kind) -> bool {
    matches!(kind, Kind::Str { text, .. } if contains_sql_keyword(text))
}

/// Does the operand on one side of the operator at `at` contain a SQL
/// string literal?
fn operand_has_sql(tokens: &[Token], at: usize, forward: bool) -> bool {
    let depth = tokens[at].depth;
    let mut idx = at;
    loop {
        if forward {
            idx += 1;
            if idx >= tokens.len() {
                return false;
            }
        } else {
            if idx == 0 {
                return false;
            }
            idx -= 1;
        }
        let tok = &tokens[idx];
        if tok.depth < depth {
            return false;
        }
        if tok.depth == depth && is_operand_boundary(&tok.kind) {
            return false;
        }
        if is_sql_literal(&tok.kind) {
            return true;
        }
    }
}

fn is_op(tokens: &[Token], idx: usize, op: &str) -> bool {
    matches!(tokens.get(idx), Some(Token { kind: Kind::Op(o), .. }) if o == op)
}

fn is_name(tokens: &[Token], idx: usize, name: &str) -> bool {
    matches!(tokens.get(idx), Some(Token { kind: Kind::Name(n), .. }) if n == name)
}

/// Walk the token stream for SQL built from strings. `Err` means the
/// source could not be tokenized.
pub fn sql_sink(source: &str) -> Result<bool, Unparsable> {
    let tokens = tokenize(source)?;

    for (idx, tok) in tokens.iter().enumerate() {
        match &tok.kind {
            Kind::Op(op) if op == "+" => {
                if operand_has_sql(&tokens, idx, false) || operand_has_sql(&tokens, idx, true) {
                    return Ok(true);
                }
            }
            Kind::Op(op) if op == "+=" => {
                if operand_has_sql(&tokens, idx, true) {
                    return Ok(true);
                }
            }
            Kind::Op(op) if op == "%" => {
                if operand_has_sql(&tokens, idx, false) {
                    return Ok(true);
                }
            }
            Kind::Str { text, formatted } => {
                if !contains_sql_keyword(text) {
                    continue;
                }
                if *formatted && text.contains('{') {
                    return Ok(true);
                }
                if is_op(&tokens, idx + 1, ".")
                    && is_name(&tokens, idx + 2, "format")
                    && is_op(&tokens, idx + 3, "(")
                {
                    return Ok(true);
                }
            }
            _ => {}
        }
    }
    Ok(false)
}
