//! Sink, taint-source and sanitizer catalogue per scanned language.
//!
//! Entries are plain substrings. A detector reports an injection when a
//! sink of the relevant family and a taint source appear in the same code
//! unit. No data flow is traced, so both false positives and false
//! negatives are expected.

/// Substring tables for one language ecosystem.
#[derive(Debug)]
pub struct SinkProfile {
    pub xss_sinks: &'static [&'static str],
    pub command_sinks: &'static [&'static str],
    pub path_sinks: &'static [&'static str],
    /// Normalization or validation calls; any hit clears a path-traversal finding.
    pub path_sanitizers: &'static [&'static str],
    pub nosql_sinks: &'static [&'static str],
    pub ldap_sinks: &'static [&'static str],
    pub xxe_sinks: &'static [&'static str],
    pub taint_sources: &'static [&'static str],
}

/// True when any needle occurs in `code`.
pub fn any_present(code: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| code.contains(needle))
}

pub static PYTHON: SinkProfile = SinkProfile {
    xss_sinks: &[
        "render_template_string(",
        "Markup(",
        "mark_safe(",
        "HttpResponse(",
        "make_response(",
        "|safe",
    ],
    command_sinks: &[
        "os.system(",
        "os.popen(",
        "subprocess.call(",
        "subprocess.run(",
        "subprocess.Popen(",
        "subprocess.check_output(",
        "subprocess.check_call(",
        "commands.getoutput(",
        "shell=True",
    ],
    path_sinks: &[
        "open(",
        "send_file(",
        "os.remove(",
        "os.unlink(",
        "shutil.copy",
        "shutil.rmtree(",
        "os.path.join(",
        "Path(",
    ],
    path_sanitizers: &[
        "os.path.realpath(",
        "os.path.abspath(",
        "os.path.normpath(",
        "os.path.commonpath(",
        "secure_filename(",
        ".resolve(",
        ".is_relative_to(",
    ],
    nosql_sinks: &[
        ".find(",
        ".find_one(",
        ".aggregate(",
        ".update_one(",
        ".update_many(",
        ".delete_one(",
        ".delete_many(",
        "$where",
    ],
    ldap_sinks: &["search_s(", "search_ext_s(", "search_st(", "ldap_conn.search(", "conn.search("],
    xxe_sinks: &[
        "etree.parse(",
        "etree.fromstring(",
        "etree.XMLParser(",
        "minidom.parse",
        "xml.sax.parse",
        "pulldom.parse",
        "resolve_entities=True",
    ],
    taint_sources: &[
        "request.args",
        "request.form",
        "request.values",
        "request.json",
        "request.data",
        "request.files",
        "request.cookies",
        "request.headers",
        "request.GET",
        "request.POST",
        "input(",
        "sys.argv",
        "sys.stdin",
    ],
};

pub static JAVASCRIPT: SinkProfile = SinkProfile {
    xss_sinks: &[
        ".innerHTML",
        ".outerHTML",
        "document.write(",
        "insertAdjacentHTML(",
        "dangerouslySetInnerHTML",
        ".html(",
        "v-html",
        "res.send(",
    ],
    command_sinks: &[
        "child_process",
        "execSync(",
        "execFile(",
        "spawn(",
        "spawnSync(",
        "shell: true",
    ],
    path_sinks: &[
        "fs.readFile",
        "fs.writeFile",
        "fs.createReadStream(",
        "fs.createWriteStream(",
        "fs.unlink",
        "fs.open",
        "res.sendFile(",
        "res.download(",
        "path.join(",
    ],
    path_sanitizers: &["path.normalize(", "path.resolve(", "path.basename(", "realpath", ".startsWith("],
    nosql_sinks: &[
        ".find(",
        ".findOne(",
        ".findOneAndUpdate(",
        ".aggregate(",
        ".updateOne(",
        ".deleteMany(",
        "$where",
    ],
    ldap_sinks: &["client.search(", "ldapClient.search(", "ldap.search("],
    xxe_sinks: &["libxmljs", "parseXml(", "parseXmlString(", "noent: true", "xml2js", "DOMParser("],
    taint_sources: &[
        "req.query",
        "req.body",
        "req.params",
        "req.cookies",
        "req.headers",
        "location.hash",
        "location.search",
        "document.URL",
        "window.location",
        "process.argv",
        "event.data",
    ],
};

pub static JAVA: SinkProfile = SinkProfile {
    xss_sinks: &[
        "getWriter().print",
        "getWriter().write",
        "out.println(",
        "out.print(",
        ".innerHTML",
    ],
    command_sinks: &["Runtime.getRuntime().exec(", "ProcessBuilder(", ".exec("],
    path_sinks: &[
        "new File(",
        "new FileInputStream(",
        "new FileOutputStream(",
        "new FileReader(",
        "Files.readAllBytes(",
        "Files.newInputStream(",
        "Paths.get(",
        "Path.of(",
    ],
    path_sanitizers: &[
        "getCanonicalPath(",
        ".normalize(",
        "toRealPath(",
        "FilenameUtils.getName(",
        ".startsWith(",
    ],
    nosql_sinks: &[".find(", "Filters.eq(", "BasicDBObject(", ".aggregate(", "$where"],
    ldap_sinks: &["DirContext", "InitialDirContext", "ctx.search(", "ldapTemplate.search("],
    xxe_sinks: &[
        "DocumentBuilderFactory",
        "SAXParserFactory",
        "XMLInputFactory",
        "SAXReader",
        "XMLReader",
        "TransformerFactory",
        ".unmarshal(",
    ],
    taint_sources: &[
        "getParameter(",
        "getHeader(",
        "getQueryString(",
        "getCookies(",
        "getInputStream(",
        "@RequestParam",
        "@PathVariable",
        "@RequestBody",
        "System.getenv(",
    ],
};

pub static GO: SinkProfile = SinkProfile {
    xss_sinks: &["template.HTML(", "w.Write(", "fmt.Fprintf(w", "io.WriteString(w"],
    command_sinks: &["exec.Command(", "exec.CommandContext(", "syscall.Exec("],
    path_sinks: &[
        "os.Open(",
        "os.OpenFile(",
        "os.ReadFile(",
        "ioutil.ReadFile(",
        "os.Create(",
        "os.Remove(",
        "http.ServeFile(",
        "filepath.Join(",
    ],
    path_sanitizers: &[
        "filepath.Clean(",
        "filepath.Abs(",
        "filepath.Base(",
        "filepath.Rel(",
        "filepath.EvalSymlinks(",
        "strings.HasPrefix(",
    ],
    nosql_sinks: &[".Find(", ".FindOne(", ".Aggregate(", "bson.M{", "$where"],
    ldap_sinks: &["ldap.NewSearchRequest(", ".Search("],
    xxe_sinks: &["libxml2.Parse", "xmlquery.Parse(", "etree.ReadFrom", "xml.NewDecoder("],
    taint_sources: &[
        "r.URL.Query()",
        "r.FormValue(",
        "r.PostFormValue(",
        "r.Form",
        "r.Body",
        "r.Header.Get(",
        "c.Query(",
        "c.Param(",
        "mux.Vars(",
        "os.Args",
    ],
};

pub static CSHARP: SinkProfile = SinkProfile {
    xss_sinks: &["Html.Raw(", "Response.Write(", "HtmlString(", ".InnerHtml"],
    command_sinks: &["Process.Start(", "ProcessStartInfo("],
    path_sinks: &[
        "File.ReadAllText(",
        "File.ReadAllBytes(",
        "File.Open(",
        "File.Delete(",
        "new FileStream(",
        "Path.Combine(",
    ],
    path_sanitizers: &["Path.GetFullPath(", "Path.GetFileName(", ".StartsWith("],
    nosql_sinks: &[".Find(", "BsonDocument", ".Aggregate(", "$where"],
    ldap_sinks: &["DirectorySearcher", "SearchRequest("],
    xxe_sinks: &[
        "XmlDocument",
        "XmlTextReader",
        "DtdProcessing.Parse",
        "XmlReader.Create(",
        "XmlUrlResolver",
    ],
    taint_sources: &[
        "Request.QueryString",
        "Request.Form",
        "Request.Params",
        "Request.Cookies",
        "Request.Headers",
        "[FromQuery]",
        "[FromBody]",
        "[FromRoute]",
    ],
};

pub static PHP: SinkProfile = SinkProfile {
    xss_sinks: &["echo ", "print ", "printf(", "<?="],
    command_sinks: &[
        "system(",
        "exec(",
        "shell_exec(",
        "passthru(",
        "popen(",
        "proc_open(",
    ],
    path_sinks: &[
        "file_get_contents(",
        "file_put_contents(",
        "fopen(",
        "readfile(",
        "unlink(",
        "include ",
        "include(",
        "require ",
        "require(",
    ],
    path_sanitizers: &["realpath(", "basename(", "str_starts_with("],
    nosql_sinks: &["->find(", "->findOne(", "->aggregate(", "$where"],
    ldap_sinks: &["ldap_search(", "ldap_list(", "ldap_read("],
    xxe_sinks: &[
        "simplexml_load_string(",
        "simplexml_load_file(",
        "loadXML(",
        "DOMDocument",
        "LIBXML_NOENT",
        "XMLReader",
    ],
    taint_sources: &[
        "$_GET",
        "$_POST",
        "$_REQUEST",
        "$_COOKIE",
        "$_SERVER",
        "$_FILES",
        "php://input",
    ],
};

pub static RUBY: SinkProfile = SinkProfile {
    xss_sinks: &["html_safe", "raw(", "render inline:", "<%=="],
    command_sinks: &["system(", "exec(", "%x(", "Open3.", "IO.popen(", "spawn("],
    path_sinks: &[
        "File.open(",
        "File.read(",
        "File.join(",
        "IO.read(",
        "send_file(",
        "FileUtils.rm",
    ],
    path_sanitizers: &["File.expand_path(", "File.basename(", "realpath", "cleanpath", "start_with?("],
    nosql_sinks: &[".where(", ".find(", "$where"],
    ldap_sinks: &["Net::LDAP", "ldap.search("],
    xxe_sinks: &["Nokogiri::XML(", "REXML::Document.new(", "LibXML::XML", "noent"],
    taint_sources: &[
        "params[",
        "params.",
        "request.body",
        "request.query_string",
        "cookies[",
        "ARGV",
        "gets",
    ],
};
