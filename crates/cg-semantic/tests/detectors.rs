// detectors.rs — Behaviour of every detector family across languages.
//
// Each test pairs a dangerous snippet with a look-alike that must not be
// flagged, so regressions in either direction show up.

use cg_semantic::{ScannedLanguage, SemanticAnalyzer};

fn analyzer() -> SemanticAnalyzer {
    SemanticAnalyzer::new()
}

#[test]
fn python_sql_concatenation_vs_parameterized() {
    let a = analyzer();
    let unsafe_code = r#"
def get_user(cursor, user_id):
    query = "SELECT * FROM users WHERE id = " + user_id
    cursor.execute(query)
"#;
    let safe_code = r#"
def get_user(cursor, user_id):
    cursor.execute("SELECT * FROM users WHERE id = ?", (user_id,))
"#;
    assert!(a.contains_sql_sink(unsafe_code, "python"));
    assert!(!a.has_parameterization(unsafe_code, "python"));
    assert!(!a.contains_sql_sink(safe_code, "python"));
    assert!(a.has_parameterization(safe_code, "python"));
}

#[test]
fn python_fstring_and_format_are_sinks() {
    let a = analyzer();
    assert!(a.contains_sql_sink(
        "cur.execute(f\"DELETE FROM orders WHERE id = {order_id}\")",
        "python"
    ));
    assert!(a.contains_sql_sink(
        "sql = 'UPDATE t SET name = \"{}\"'.format(name)",
        "python"
    ));
}

#[test]
fn java_string_builder_and_prepared_statement() {
    let a = analyzer();
    let unsafe_code = r#"
StringBuilder sb = new StringBuilder();
sb.append("SELECT * FROM accounts WHERE owner = '");
sb.append(owner).append("'");
stmt.executeQuery(sb.toString());
"#;
    let safe_code = r#"
PreparedStatement ps = conn.prepareStatement("SELECT * FROM accounts WHERE owner = ?");
ps.setString(1, owner);
"#;
    assert!(a.contains_sql_sink(unsafe_code, "java"));
    assert!(!a.has_parameterization(unsafe_code, "java"));
    assert!(a.has_parameterization(safe_code, "java"));
}

#[test]
fn javascript_template_literal_and_placeholder_query() {
    let a = analyzer();
    let unsafe_code = "db.query(`SELECT * FROM users WHERE name = '${req.query.name}'`);";
    let safe_code = "db.query('SELECT * FROM users WHERE name = $1', [req.query.name]);";
    assert!(a.contains_sql_sink(unsafe_code, "javascript"));
    assert!(!a.has_parameterization(unsafe_code, "javascript"));
    assert!(a.has_parameterization(safe_code, ScannedLanguage::TypeScript));
}

#[test]
fn go_placeholder_query_is_parameterized() {
    let a = analyzer();
    assert!(a.has_parameterization(
        r#"rows, err := db.Query("SELECT name FROM users WHERE id = $1", id)"#,
        "go"
    ));
    assert!(!a.has_parameterization(
        r#"rows, err := db.Query("SELECT name FROM users WHERE id = " + id)"#,
        "go"
    ));
}

#[test]
fn xss_requires_sink_and_taint() {
    let a = analyzer();
    assert!(a.contains_xss_sink(
        "el.innerHTML = req.query.message;",
        "javascript"
    ));
    assert!(!a.contains_xss_sink("el.innerHTML = '<b>static</b>';", "javascript"));
    assert!(!a.contains_xss_sink("el.textContent = req.query.message;", "javascript"));
    assert!(a.contains_xss_sink(
        "return render_template_string('<p>' + request.args['q'] + '</p>')",
        "python"
    ));
}

#[test]
fn command_injection_across_languages() {
    let a = analyzer();
    assert!(a.contains_command_injection(
        "subprocess.run('ping ' + request.form['host'], shell=True)",
        "python"
    ));
    assert!(!a.contains_command_injection(
        "subprocess.run(['ping', '-c', '1', 'localhost'])",
        "python"
    ));
    assert!(a.contains_command_injection(
        "Runtime.getRuntime().exec(\"ls \" + request.getParameter(\"dir\"));",
        "java"
    ));
    assert!(a.contains_command_injection(
        "cmd := exec.Command(\"sh\", \"-c\", r.FormValue(\"cmd\"))",
        "go"
    ));
    assert!(a.contains_command_injection("<?php system($_GET['cmd']); ?>", "php"));
}

#[test]
fn path_traversal_cleared_by_normalization() {
    let a = analyzer();
    let unsafe_code = "with open('/srv/files/' + request.args['name']) as f:\n    data = f.read()";
    let safe_code = "name = secure_filename(request.args['name'])\nwith open(os.path.join('/srv/files', name)) as f:\n    data = f.read()";
    assert!(a.contains_path_traversal(unsafe_code, "python"));
    assert!(!a.contains_path_traversal(safe_code, "python"));

    let go_unsafe = "f, _ := os.Open(\"/data/\" + r.URL.Query().Get(\"file\"))";
    let go_safe = "p := filepath.Clean(r.URL.Query().Get(\"file\"))\nf, _ := os.Open(filepath.Join(root, p))";
    assert!(a.contains_path_traversal(go_unsafe, "go"));
    assert!(!a.contains_path_traversal(go_safe, "go"));
}

#[test]
fn nosql_ldap_and_xxe() {
    let a = analyzer();
    assert!(a.contains_nosql_injection(
        "users.find_one({'$where': 'this.name == \"' + request.args['n'] + '\"'})",
        "python"
    ));
    assert!(!a.contains_nosql_injection("users.find_one({'name': 'admin'})", "python"));

    assert!(a.contains_ldap_injection(
        "conn.search_s(base, ldap.SCOPE_SUBTREE, '(uid=' + request.form['user'] + ')')",
        "python"
    ));
    assert!(a.contains_ldap_injection(
        "$r = ldap_search($ds, $dn, \"(uid=\" . $_POST['u'] . \")\");",
        "php"
    ));

    assert!(a.contains_xxe_injection(
        "DocumentBuilderFactory f = DocumentBuilderFactory.newInstance();\nf.newDocumentBuilder().parse(request.getInputStream());",
        "java"
    ));
    assert!(!a.contains_xxe_injection(
        "tree = etree.parse('config/static.xml')",
        "python"
    ));
}

#[test]
fn unknown_language_uses_every_profile() {
    let a = analyzer();
    assert!(a.contains_command_injection("os.system(request.args['c'])", "cobol"));
    assert!(a.has_parameterization("cur.execute(\"SELECT 1 WHERE a = ?\", (a,))", "cobol"));
    assert!(a.contains_sql_sink("MOVE 'SELECT * FROM T' TO WS-SQL", "cobol"));
}
