use std::path::Path;
use std::process::{Command, Output};

fn linkgate_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_linkgate"));
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A docs tree with one page linking to a sibling.
fn docs_tree() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("docs/guide")).unwrap();
    std::fs::write(tmp.path().join("docs/guide/page.md"), "# Page\n\n[next](next.md)\n").unwrap();
    std::fs::write(tmp.path().join("docs/guide/next.md"), "# Next\n").unwrap();
    std::fs::write(tmp.path().join("docs/notes.txt"), "plain\n").unwrap();
    tmp
}

#[test]
fn classify_prints_kind() {
    let tmp = tempfile::tempdir().unwrap();
    let cases = [
        ("#intro", "ANCHOR"),
        ("https://example.com", "EXTERNAL_HTTP"),
        ("mailto:someone@example.com", "EXTERNAL_HTTP"),
        ("file:///tmp/x.md", "FILE_PROTOCOL"),
        ("guide/page.md", "RELATIVE_DOCUMENT"),
        ("page.md#usage", "TABLE_OF_CONTENTS_ENTRY"),
        ("logo.PNG", "IMAGE"),
        ("flow.mmd", "DIAGRAM"),
        ("guide/", "DIRECTORY"),
        ("weird", "UNKNOWN"),
    ];
    for (href, expected) in cases {
        let out = linkgate_cmd(tmp.path()).args(["classify", href]).output().unwrap();
        assert!(out.status.success(), "classify {href} failed: {}", stderr(&out));
        assert_eq!(stdout(&out).trim(), expected, "href {href}");
    }
}

#[test]
fn classify_diagram_flag_marks_plain_names() {
    let tmp = tempfile::tempdir().unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["classify", "--diagram", "graph-1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "DIAGRAM");
}

#[test]
fn diagram_flag_does_not_override_document_rule() {
    let tmp = tempfile::tempdir().unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["classify", "--diagram", "page.md"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "RELATIVE_DOCUMENT");
}

#[test]
fn resolve_relative_to_document() {
    let tmp = docs_tree();
    let from = tmp.path().join("docs/guide/page.md");
    let out = linkgate_cmd(tmp.path())
        .args(["resolve", "../notes.txt", "--from"])
        .arg(&from)
        .output()
        .unwrap();
    assert!(out.status.success(), "resolve failed: {}", stderr(&out));
    assert_eq!(
        Path::new(stdout(&out).trim()),
        tmp.path().join("docs/notes.txt")
    );
}

#[test]
fn resolve_file_url_decodes_escapes() {
    let tmp = tempfile::tempdir().unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["resolve", "file:///srv/my%20docs/a.md"])
        .output()
        .unwrap();
    assert!(out.status.success(), "resolve failed: {}", stderr(&out));
    assert_eq!(stdout(&out).trim(), "/srv/my docs/a.md");
}

#[test]
fn resolve_bad_escape_is_runtime_error() {
    let tmp = tempfile::tempdir().unwrap();
    let out = linkgate_cmd(tmp.path()).args(["resolve", "a%FF.md"]).output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("invalid percent-encoding"));
}

#[test]
fn check_existing_document_succeeds() {
    let tmp = docs_tree();
    let from = tmp.path().join("docs/guide/page.md");
    let out = linkgate_cmd(tmp.path())
        .args(["check", "next.md", "--from"])
        .arg(&from)
        .output()
        .unwrap();
    assert!(out.status.success(), "check failed: {}", stderr(&out));
    assert!(stdout(&out).contains("# Link: open-document"));
}

#[test]
fn check_missing_document_exits_denied() {
    let tmp = docs_tree();
    let from = tmp.path().join("docs/guide/page.md");
    let out = linkgate_cmd(tmp.path())
        .args(["check", "gone.md", "--from"])
        .arg(&from)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("NOT_FOUND"));
}

#[test]
fn check_external_is_fail_closed_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["check", "https://example.com/page", "--json"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["kind"], "EXTERNAL_HTTP");
    assert_eq!(json["result"]["success"], false);
    assert_eq!(json["result"]["action"], "show-error");
    assert_eq!(json["result"]["reason"], "SECURITY_BLOCKED");
}

#[test]
fn check_external_allowed_by_policy_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join(".linkgate.toml"),
        "[security]\nallowed_domains = [\"example.com\"]\n",
    )
    .unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["check", "https://example.com/page", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "check failed: {}", stderr(&out));

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["result"]["action"], "open-external");
    assert_eq!(json["result"]["payload"]["url"], "https://example.com/page");
}

#[test]
fn check_directory_from_browsed_dir() {
    let tmp = docs_tree();
    let out = linkgate_cmd(tmp.path())
        .args(["check", "guide/", "--dir"])
        .arg(tmp.path().join("docs"))
        .output()
        .unwrap();
    assert!(out.status.success(), "check failed: {}", stderr(&out));
    assert!(stdout(&out).contains("open-directory"));
}

#[test]
fn explicit_policy_must_exist() {
    let tmp = tempfile::tempdir().unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["--policy", "missing.toml", "policy"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("Policy Not Found"));
}

#[test]
fn malformed_policy_is_runtime_error() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join(".linkgate.toml"), "check_exists = \"yes\"\n").unwrap();
    let out = linkgate_cmd(tmp.path()).args(["check", "#top"]).output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("Invalid Policy"));
}

#[test]
fn policy_json_reflects_section_table() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("custom.toml"),
        "[link_processing]\ncheck_acl = true\n\n[link_processing.windows_specific]\nmax_path_depth = 4\n",
    )
    .unwrap();
    let out = linkgate_cmd(tmp.path())
        .args(["policy", "--json", "--policy", "custom.toml"])
        .output()
        .unwrap();
    assert!(out.status.success(), "policy failed: {}", stderr(&out));

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["check_acl"], true);
    assert_eq!(json["check_exists"], true);
    assert_eq!(json["windows_specific"]["max_path_depth"], 4);
}
