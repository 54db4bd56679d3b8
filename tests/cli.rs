mod backend_stub;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use backend_stub::{BackendStub, Reply};
use predicates::prelude::*;
use serde_json::json;

fn uxscope(stub_url: &str, session_file: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("uxscope");
    cmd.env_remove("UXSCOPE_API_URL")
        .env_remove("UXSCOPE_SESSION_FILE")
        .args(["--api-url", stub_url])
        .arg("--session-file")
        .arg(session_file);
    cmd
}

fn backend() -> BackendStub {
    BackendStub::spawn(|req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/api/auth/login/") => Reply::json(
            200,
            json!({
                "access": "access-1",
                "refresh": "refresh-1",
                "user": {"id": 1, "email": "ada@example.com", "name": "Ada"}
            }),
        ),
        ("GET", "/api/projects/12/available-routes/") if req.bearer() == Some("access-1") => {
            Reply::json(
                200,
                json!([
                    {"id": 1, "page_name": "Home", "page_url": "https://shop.example/",
                     "status": "completed", "ux_score": "80",
                     "report_json": {"ux_score": 80, "issues": [
                        {"severity": 1, "heuristic": "Consistency", "label": "Mixed button styles",
                         "observation": "Two primary styles.", "solution": "Use one style.",
                         "bounding_box": {"x": 5, "y": 6, "width": 7, "height": 8}}
                     ]}},
                    {"id": 2, "page_name": "Checkout", "page_url": "https://shop.example/checkout",
                     "status": "pending", "ux_score": "", "report_json": null}
                ]),
            )
        }
        ("POST", "/api/projects/12/pages/bulk-action/") => {
            Reply::json(200, json!({"message": "Analysis started"}))
        }
        _ => Reply::json(401, json!({"detail": "not authenticated"})),
    })
}

fn login(stub: &BackendStub, session_file: &Path) {
    uxscope(&stub.base_url, session_file)
        .args(["login", "--email", "ada@example.com", "--password", "pw"])
        .assert()
        .success()
        .stdout("Signed in as ada@example.com\n");
}

#[test]
fn logout_without_session_succeeds() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("uxscope");
    cmd.arg("--session-file")
        .arg(temp.path().join("session.json"))
        .arg("logout")
        .assert()
        .success()
        .stdout("Signed out\n");
    Ok(())
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("uxscope");
    cmd.env("RUST_LOG", "debug")
        .arg("--session-file")
        .arg(temp.path().join("session.json"))
        .arg("logout")
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
    Ok(())
}

#[test]
fn login_persists_session_for_later_commands() -> anyhow::Result<()> {
    let stub = backend();
    let temp = tempfile::TempDir::new()?;
    let session_file = temp.path().join("state").join("session.json");

    login(&stub, &session_file);
    assert!(session_file.exists());

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "list", "12", "--sort", "name"])
        .assert()
        .success()
        .stdout(
            "2\tPending\t-\tCheckout\thttps://shop.example/checkout\n\
             1\tCompleted\t80\tHome\thttps://shop.example/\n\
             Average UX Score: 80/100\n",
        );

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "list", "12", "--status", "PENDING"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkout").and(predicate::str::contains("Home").not()));
    Ok(())
}

#[test]
fn pages_list_requires_sign_in() -> anyhow::Result<()> {
    let stub = backend();
    let temp = tempfile::TempDir::new()?;

    uxscope(&stub.base_url, &temp.path().join("session.json"))
        .args(["pages", "list", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("You are not signed in"));
    assert!(stub.requests().is_empty());
    Ok(())
}

#[test]
fn analyze_submits_selected_pages() -> anyhow::Result<()> {
    let stub = backend();
    let temp = tempfile::TempDir::new()?;
    let session_file = temp.path().join("session.json");
    login(&stub, &session_file);

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "analyze", "12", "--page", "2"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Queued 1 of 1 pages for analysis")
                .and(predicate::str::contains("Analysis started")),
        );

    let bulk = stub
        .requests()
        .into_iter()
        .find(|r| r.path == "/api/projects/12/pages/bulk-action/")
        .expect("bulk request sent");
    assert_eq!(bulk.json(), json!({"page_analysis_ids": [2]}));
    Ok(())
}

#[test]
fn analyze_reports_queued_pages_when_reload_fails() -> anyhow::Result<()> {
    let submitted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&submitted);
    let stub = BackendStub::spawn(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/api/auth/login/") => Reply::json(
            200,
            json!({"access": "access-1", "refresh": "refresh-1",
                   "user": {"id": 1, "email": "ada@example.com", "name": "Ada"}}),
        ),
        ("GET", "/api/projects/12/available-routes/") if flag.load(Ordering::SeqCst) => {
            Reply::text(500, "boom")
        }
        ("GET", "/api/projects/12/available-routes/") => Reply::json(
            200,
            json!([{"id": 2, "page_name": "Checkout", "page_url": "https://shop.example/checkout",
                    "status": "pending", "ux_score": "", "report_json": null}]),
        ),
        ("POST", "/api/projects/12/pages/bulk-action/") => {
            flag.store(true, Ordering::SeqCst);
            Reply::json(200, json!({"message": "Analysis started"}))
        }
        _ => Reply::not_found(),
    });
    let temp = tempfile::TempDir::new()?;
    let session_file = temp.path().join("session.json");
    login(&stub, &session_file);

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "analyze", "12", "--page", "2"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Queued 1 of 1 pages for analysis")
                .and(predicate::str::contains("Could not reload page statuses")),
        );
    assert!(submitted.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn analyze_rejects_unknown_page_before_submitting() -> anyhow::Result<()> {
    let stub = backend();
    let temp = tempfile::TempDir::new()?;
    let session_file = temp.path().join("session.json");
    login(&stub, &session_file);

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "analyze", "12", "--page", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page 99 is not part of project 12"));
    assert!(
        stub.paths()
            .iter()
            .all(|path| path != "/api/projects/12/pages/bulk-action/")
    );
    Ok(())
}

#[test]
fn report_renders_issues_and_pending_pages() -> anyhow::Result<()> {
    let stub = backend();
    let temp = tempfile::TempDir::new()?;
    let session_file = temp.path().join("session.json");
    login(&stub, &session_file);

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "report", "12", "1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("UX Score: 80/100 (good)")
                .and(predicate::str::contains("[Low Severity] Mixed button styles (Consistency)"))
                .and(predicate::str::contains("Location: x:5, y:6, size:7\u{d7}8")),
        );

    uxscope(&stub.base_url, &session_file)
        .args(["pages", "report", "12", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Analysis Pending"));
    Ok(())
}

#[test]
fn misspelled_project_type_is_rejected_before_sending() -> anyhow::Result<()> {
    let stub = backend();
    let temp = tempfile::TempDir::new()?;
    let session_file = temp.path().join("session.json");
    login(&stub, &session_file);

    uxscope(&stub.base_url, &session_file)
        .args([
            "projects",
            "create",
            "--name",
            "Shop",
            "--website-url",
            "https://shop.example",
            "--type",
            "websit",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project type: websit"));
    assert_eq!(stub.paths(), vec!["/api/auth/login/"]);
    Ok(())
}

#[test]
fn invalid_api_url_from_env_is_rejected() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("uxscope");
    cmd.env("UXSCOPE_API_URL", "ftp://example.com/api")
        .arg("--session-file")
        .arg(temp.path().join("session.json"))
        .arg("logout")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid UXSCOPE_API_URL"));
    Ok(())
}
