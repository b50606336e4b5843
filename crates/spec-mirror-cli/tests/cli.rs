//! Integration tests for the spec-mirror binary
//!
//! Network-facing runs point the binary at local responders through the
//! hidden `NOTION_API_BASE` / `GEMINI_API_BASE` overrides.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PAGE_ID: &str = "a1b2c3d4e5f647a8b9c0d1e2f3a4b5c6";

const LISTING: &str = r#"{"object":"list","results":[{"object":"block","id":"X1","type":"to_do","to_do":{"rich_text":[{"plain_text":"Add retry logic","href":null}],"checked":false}},{"object":"block","id":"X2","type":"to_do","to_do":{"rich_text":[{"plain_text":"Expose metrics [PR #42]","href":null}],"checked":true}}],"has_more":false}"#;

const VERDICT: &str = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"matched_ids\": [\"X1\", \"X2\", \"ZZ\"]}"}]},"finishReason":"STOP"}]}"#;

/// Helper to create a spec-mirror Command with a clean environment
fn spec_mirror(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("spec-mirror");
    cmd.env_clear().current_dir(dir.path());
    cmd
}

/// Environment for a checklist-mode run, minus the API bases
fn run_env(cmd: &mut Command, dir: &TempDir, milestone: &str) {
    let diff = dir.path().join("pr.diff");
    std::fs::write(&diff, "diff --git a/src/retry.rs b/src/retry.rs\n+fn retry() {}\n").unwrap();

    cmd.env("NOTION_KEY", "secret_notion")
        .env("GOOGLE_API_KEY", "google-key")
        .env("DIFF_FILE_PATH", &diff)
        .env("PR_MILESTONE_DESC", milestone)
        .env("PR_NUMBER", "42")
        .env("PR_URL", "https://github.com/acme/widgets/pull/42");
}

fn milestone() -> String {
    format!("Milestone 3: https://www.notion.so/Spec-{PAGE_ID}")
}

// ── local responder ──

/// Answer one connection per entry of `responses`, in order, then stop.
/// Resolves to the raw requests received.
fn serve(responses: Vec<(&'static str, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let Some(mut stream) = accept_within(&listener, Duration::from_secs(15)) else {
                break;
            };
            requests.push(read_request(&mut stream));
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        requests
    });

    (base, handle)
}

fn accept_within(listener: &TcpListener, limit: Duration) -> Option<TcpStream> {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false).unwrap();
                stream
                    .set_read_timeout(Some(Duration::from_secs(5)))
                    .unwrap();
                return Some(stream);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => panic!("accept failed: {e}"),
        }
    }
    None
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(_) => break,
        };
        raw.extend_from_slice(&buf[..n]);
        if n == 0 || request_complete(&raw) {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    spec_mirror(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("extract-id"));
}

#[test]
fn test_extract_id_prints_page_id() {
    let dir = TempDir::new().unwrap();
    spec_mirror(&dir)
        .args(["extract-id", &milestone()])
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{PAGE_ID}\n")));
}

#[test]
fn test_extract_id_without_id_fails() {
    let dir = TempDir::new().unwrap();
    spec_mirror(&dir)
        .args(["extract-id", "Milestone 3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No Notion page id found"));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_run_without_notion_key_fails() {
    let dir = TempDir::new().unwrap();
    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, &milestone());
    cmd.env_remove("NOTION_KEY");

    cmd.arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NOTION_KEY"));
}

#[test]
fn test_run_reads_dotenv_file() {
    let dir = TempDir::new().unwrap();
    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, "no page here");
    cmd.env_remove("NOTION_KEY");
    std::fs::write(dir.path().join(".env"), "NOTION_KEY=from_dotenv\n").unwrap();

    cmd.arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped"));
}

#[test]
fn test_invalid_mode_flag_fails() {
    let dir = TempDir::new().unwrap();
    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, &milestone());

    cmd.args(["run", "--mode", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sideways"));
}

// =============================================================================
// Runs
// =============================================================================

#[test]
fn test_run_without_page_reference_skips() {
    let dir = TempDir::new().unwrap();
    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, "Milestone 3: retry support");
    // Any request would fail to connect.
    cmd.env("NOTION_API_BASE", "http://127.0.0.1:9/v1")
        .env("GEMINI_API_BASE", "http://127.0.0.1:9/v1beta");

    cmd.arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped"));
}

#[test]
fn test_run_annotates_matched_item() {
    let dir = TempDir::new().unwrap();
    let (notion, notion_server) =
        serve(vec![("200 OK", LISTING), ("200 OK", r#"{"object":"block"}"#)]);
    let (gemini, gemini_server) = serve(vec![("200 OK", VERDICT)]);

    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, &milestone());
    cmd.env("NOTION_API_BASE", format!("{notion}/v1"))
        .env("GEMINI_API_BASE", format!("{gemini}/v1beta"));

    cmd.arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 matched, 1 updated"))
        .stdout(predicate::str::contains("1 already linked"))
        .stdout(predicate::str::contains("1 unknown id(s) ignored"));

    let notion_requests = notion_server.join().unwrap();
    assert_eq!(notion_requests.len(), 2);
    assert!(notion_requests[0]
        .starts_with(&format!("GET /v1/blocks/{PAGE_ID}/children?page_size=100 ")));
    let patch = &notion_requests[1];
    assert!(patch.starts_with("PATCH /v1/blocks/X1 "));
    assert!(patch.contains(r#""checked":true"#));
    assert!(patch.contains(" [PR #42]"));

    let gemini_requests = gemini_server.join().unwrap();
    assert!(gemini_requests[0].contains("- [ID: X1] Add retry logic"));
}

#[test]
fn test_dry_run_sends_no_updates() {
    let dir = TempDir::new().unwrap();
    let (notion, notion_server) = serve(vec![("200 OK", LISTING)]);
    let (gemini, gemini_server) = serve(vec![("200 OK", VERDICT)]);

    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, &milestone());
    cmd.env("NOTION_API_BASE", format!("{notion}/v1"))
        .env("GEMINI_API_BASE", format!("{gemini}/v1beta"));

    cmd.args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(dry run)"));

    assert_eq!(notion_server.join().unwrap().len(), 1);
    gemini_server.join().unwrap();
}

#[test]
fn test_oracle_failure_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let (notion, notion_server) = serve(vec![("200 OK", LISTING)]);
    let (gemini, gemini_server) = serve(vec![(
        "500 Internal Server Error",
        r#"{"error":{"code":500,"message":"Internal error","status":"INTERNAL"}}"#,
    )]);

    let mut cmd = spec_mirror(&dir);
    run_env(&mut cmd, &dir, &milestone());
    cmd.env("NOTION_API_BASE", format!("{notion}/v1"))
        .env("GEMINI_API_BASE", format!("{gemini}/v1beta"));

    cmd.arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("oracle returned 500"));

    assert_eq!(notion_server.join().unwrap().len(), 1);
    gemini_server.join().unwrap();
}

#[test]
fn test_specs_lists_checklist() {
    let dir = TempDir::new().unwrap();
    let (notion, notion_server) = serve(vec![("200 OK", LISTING)]);

    spec_mirror(&dir)
        .env("NOTION_KEY", "secret_notion")
        .env("NOTION_API_BASE", format!("{notion}/v1"))
        .args(["specs", "--milestone", &milestone(), "--pr-number", "42"])
        .args(["--pr-url", "https://github.com/acme/widgets/pull/42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 spec item(s)"))
        .stdout(predicate::str::contains("[ ] X1  Add retry logic"))
        .stdout(predicate::str::contains("[x] X2  Expose metrics [PR #42]  (linked)"));

    notion_server.join().unwrap();
}
