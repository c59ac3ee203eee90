// sql.rs — SQL keyword matching, text-level sink heuristics, and
// parameterization shapes.
//
// Text heuristics are used for every language without a structural
// walker. They never trace data flow; they only look at the shape of the
// code around SQL keywords.

use once_cell::sync::Lazy;
use regex::Regex;

/// Statement keywords that mark a string as SQL.
pub const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "REPLACE",
    "MERGE", "GRANT", "REVOKE",
];

static SQL_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", SQL_KEYWORDS.join("|"))).expect("static regex")
});

// StringBuilder.append / strings.Builder.WriteString / StringBuffer etc.
static ACCUMULATOR_APPEND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(?:append|Append|AppendFormat|WriteString|concat|push)\s*\(([^)]*)\)")
        .expect("static regex")
});

// Template literal with at least one interpolation.
static TEMPLATE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]*\$\{[^`]*)`").expect("static regex"));

/// True when `text` contains a SQL statement keyword (case-insensitive, whole word).
pub fn contains_sql_keyword(text: &str) -> bool {
    SQL_KEYWORD.is_match(text)
}

/// Text-only SQL sink heuristic.
///
/// Accumulator appends decide first, then interpolated template literals;
/// code showing neither falls back to a flat keyword search.
pub fn text_sql_sink(code: &str) -> bool {
    let appends: Vec<_> = ACCUMULATOR_APPEND.captures_iter(code).collect();
    if !appends.is_empty() {
        return appends
            .iter()
            .any(|c| c.get(1).is_some_and(|args| contains_sql_keyword(args.as_str())));
    }

    let templates: Vec<_> = TEMPLATE_LITERAL.captures_iter(code).collect();
    if !templates.is_empty() {
        return templates
            .iter()
            .any(|c| c.get(1).is_some_and(|body| contains_sql_keyword(body.as_str())));
    }

    contains_sql_keyword(code)
}

// ---------------------------------------------------------------------------
// Parameterization shapes
// ---------------------------------------------------------------------------

/// Python DB-API: `cursor.execute(query, (a,))` / `execute("... %s", [a])`.
pub(crate) static PY_TWO_ARG_EXECUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\.(?:execute|executemany|query|raw|fetch|fetchrow|fetchval|fetchall)\s*\(\s*(?:[rbuRBU]?"[^"\n]*"|[rbuRBU]?'[^'\n]*'|[A-Za-z_][\w.]*)\s*,\s*[\(\[\{]"#,
    )
    .expect("static regex")
});

pub(crate) static PY_PLACEHOLDER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\.(?:execute|executemany|query|raw)\s*\(\s*[rbuRBU]?(?:"[^"\n]*(?:\?|%s|%\(\w+\)s|:\w+)[^"\n]*"|'[^'\n]*(?:\?|%s|%\(\w+\)s|:\w+)[^'\n]*')\s*,"#,
    )
    .expect("static regex")
});

/// node-postgres / mysql2 / sqlite3: `db.query("... $1", [a])`.
pub(crate) static JS_PARAM_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\.(?:query|execute|run|all|get|each)\s*\(\s*(?:"[^"\n]*"|'[^'\n]*'|`[^`$]*`|[A-Za-z_$][\w.$]*)\s*,\s*\["#,
    )
    .expect("static regex")
});

pub(crate) static JAVA_PREPARED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bPreparedStatement\b|\.prepareStatement\s*\(|\.set(?:String|Int|Long|Double|Float|Boolean|Date|Timestamp|Object|BigDecimal|Bytes)\s*\(\s*\d+\s*,",
    )
    .expect("static regex")
});

pub(crate) static CSHARP_PARAMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bSqlParameter\b|\.Parameters\.Add(?:WithValue)?\s*\(").expect("static regex")
});

/// database/sql: `db.Query("... $1", id)` / `db.ExecContext(ctx, "... ?", id)`.
pub(crate) static GO_PARAM_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\.(?:Query|QueryRow|Exec|QueryContext|QueryRowContext|ExecContext)\s*\(\s*(?:ctx\s*,\s*)?(?:"[^"\n]*(?:\?|\$\d)[^"\n]*"|`[^`]*(?:\?|\$\d)[^`]*`)\s*,"#,
    )
    .expect("static regex")
});

pub(crate) static PHP_PREPARED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"->prepare\s*\([^;]*;[\s\S]*(?:->bind_param\s*\(|->bindParam\s*\(|->bindValue\s*\(|->execute\s*\(\s*\[)")
        .expect("static regex")
});

pub(crate) static RUBY_BOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?:where|find_by_sql|exec_params|select_all)\s*\(\s*\[?\s*(?:"[^"\n]*\?[^"\n]*"|'[^'\n]*\?[^'\n]*')\s*,"#,
    )
    .expect("static regex")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_match_whole_words_case_insensitively() {
        assert!(contains_sql_keyword("select * from users"));
        assert!(contains_sql_keyword("DROP TABLE x"));
        assert!(!contains_sql_keyword("selection of deleted_items"));
        assert!(!contains_sql_keyword("print('hello')"));
    }

    #[test]
    fn accumulator_appends_decide_first() {
        let flagged = r#"sb.append("SELECT * FROM users WHERE id = ").append(id);"#;
        assert!(text_sql_sink(flagged));

        // Appends that never carry SQL win over the flat search elsewhere.
        let benign = r#"log.append(name); // SELECT mentioned only in a comment"#;
        assert!(!text_sql_sink(benign));
    }

    #[test]
    fn template_literals_with_sql_are_flagged() {
        assert!(text_sql_sink("db.query(`SELECT * FROM t WHERE id = ${id}`)"));
        assert!(!text_sql_sink("console.log(`hello ${name}`)"));
    }

    #[test]
    fn flat_search_is_the_last_resort() {
        assert!(text_sql_sink(r#"String q = "DELETE FROM t WHERE id=" + id;"#));
        assert!(!text_sql_sink("int x = 1 + 2;"));
    }

    #[test]
    fn python_parameter_shapes() {
        assert!(PY_TWO_ARG_EXECUTE.is_match(r#"cur.execute("SELECT * FROM t WHERE id = ?", (uid,))"#));
        assert!(PY_TWO_ARG_EXECUTE.is_match("cur.execute(query, [uid])"));
        assert!(PY_PLACEHOLDER_CALL.is_match(r#"cur.execute("SELECT * FROM t WHERE id = %s", params)"#));
        assert!(!PY_TWO_ARG_EXECUTE.is_match(r#"cur.execute("SELECT * FROM t WHERE id = " + uid)"#));
    }

    #[test]
    fn other_ecosystem_shapes() {
        assert!(JS_PARAM_CALL.is_match("pool.query('SELECT * FROM t WHERE id = $1', [id])"));
        assert!(!JS_PARAM_CALL.is_match("pool.query(`SELECT * FROM t WHERE id = ${id}`, [])"));
        assert!(JAVA_PREPARED.is_match("PreparedStatement ps = conn.prepareStatement(sql);"));
        assert!(JAVA_PREPARED.is_match("ps.setString(1, name);"));
        assert!(CSHARP_PARAMS.is_match("cmd.Parameters.AddWithValue(\"@id\", id);"));
        assert!(GO_PARAM_CALL.is_match(r#"db.Query("SELECT * FROM t WHERE id = $1", id)"#));
        assert!(PHP_PREPARED.is_match("$s = $pdo->prepare($sql); $s->execute([$id]);"));
        assert!(RUBY_BOUND.is_match(r#"User.where("name = ?", name)"#));
    }
}
