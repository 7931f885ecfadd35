//! Listing and capture tests through the HTTP API.

use axum::http::StatusCode;
use integration_tests::fixtures::*;
use integration_tests::mocks::MockGeo;
use integration_tests::setup::{TestContext, ACTOR_HEADER, SESSION_HEADER};
use serde_json::{json, Value};
use session_store::ScopeMode;

/// Local sessions come first, then alice's IMAP connections only.
#[tokio::test]
async fn test_list_merges_local_and_external() {
    let ctx = TestContext::with_options(
        vec![
            located_row("s1", "alice", "10.0.0.1", FIREFOX_UA, "Berlin, Land Berlin, Germany"),
            located_row("s2", "alice", "10.0.0.2", CHROME_UA, "Paris, Ile-de-France, France"),
        ],
        WHO_OUTPUT,
        MockGeo::new().with_location("1.2.3.4", "Sydney, New South Wales, Australia"),
        ScopeMode::Global,
    );
    let server = ctx.server();

    let response = server.get("/sessions").add_header(ACTOR_HEADER, "alice").await;
    response.assert_status_ok();

    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 4);

    let origins: Vec<&str> = body.iter().map(|s| s["origin"].as_str().unwrap()).collect();
    assert_eq!(origins, vec!["local", "local", "external", "external"]);

    assert_eq!(body[0]["sess_id"], "s1");
    assert_eq!(body[0]["attributes"]["language"], "de_DE");
    assert_eq!(body[0]["attributes"]["theme"], "bootstrap");
    assert_eq!(body[0]["attributes"]["dark_mode"], true);

    assert_eq!(body[2]["username"], "alice");
    assert_eq!(body[2]["ip"], "1.2.3.4");
    assert_eq!(body[2]["pid"], "123");
    assert_eq!(body[2]["location"], "Sydney, New South Wales, Australia");
    assert_eq!(body[2]["task"], "imap");
    assert_eq!(body[2]["user_agent"], "Client App");
    assert_eq!(body[3]["ip"], "5.6.7.8");
    assert_eq!(body[3]["pid"], "456");
    assert_eq!(body[3]["location"], "Unknown");

    // Stored locations are not looked up again.
    assert_eq!(ctx.geo.lookups(), vec!["1.2.3.4", "5.6.7.8"]);
}

#[tokio::test]
async fn test_list_requires_actor() {
    let ctx = TestContext::new(vec![], WHO_OUTPUT);
    let response = ctx.server().get("/sessions").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "AUTH_001");
}

#[tokio::test]
async fn test_list_survives_doveadm_failure() {
    let ctx = TestContext::new(
        vec![located_row("s1", "alice", "10.0.0.1", FIREFOX_UA, "A, B, C")],
        WHO_OUTPUT,
    );
    ctx.runner.set_who_fails(true);

    let response = ctx.server().get("/sessions").add_header(ACTOR_HEADER, "alice").await;
    response.assert_status_ok();

    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["origin"], "local");
}

#[tokio::test]
async fn test_list_survives_store_failure() {
    let ctx = TestContext::new(
        vec![located_row("s1", "alice", "10.0.0.1", FIREFOX_UA, "A, B, C")],
        WHO_OUTPUT,
    );
    ctx.store.set_should_fail(true);

    let response = ctx.server().get("/sessions").add_header(ACTOR_HEADER, "bob").await;
    response.assert_status_ok();

    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["origin"], "external");
    assert_eq!(body[0]["ip"], "9.9.9.9");
}

#[tokio::test]
async fn test_list_persists_resolved_location() {
    let ctx = TestContext::with_options(
        vec![session_row("s1", "alice", "8.8.8.8", FIREFOX_UA)],
        "",
        MockGeo::new().with_location("8.8.8.8", "Mountain View, California, United States"),
        ScopeMode::Global,
    );
    let server = ctx.server();

    for _ in 0..2 {
        let body: Vec<Value> = server
            .get("/sessions")
            .add_header(ACTOR_HEADER, "alice")
            .await
            .json();
        assert_eq!(body[0]["location"], "Mountain View, California, United States");
    }

    assert_eq!(ctx.geo.lookups(), vec!["8.8.8.8"]);
    assert_eq!(
        ctx.store.row("s1").unwrap().location,
        "Mountain View, California, United States"
    );
}

#[tokio::test]
async fn test_actor_scope_hides_other_users() {
    let ctx = TestContext::with_options(
        vec![
            located_row("s1", "alice", "10.0.0.1", FIREFOX_UA, "A, B, C"),
            located_row("s2", "carol", "10.0.0.2", FIREFOX_UA, "A, B, C"),
        ],
        "",
        MockGeo::new(),
        ScopeMode::Actor,
    );

    let body: Vec<Value> = ctx
        .server()
        .get("/sessions")
        .add_header(ACTOR_HEADER, "alice")
        .await
        .json();

    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["sess_id"], "s1");
}

#[tokio::test]
async fn test_capture_writes_once() {
    let ctx = TestContext::with_options(
        vec![session_row("s1", "alice", "8.8.8.8", "")],
        "",
        MockGeo::new().with_location("8.8.8.8", "Mountain View, California, United States"),
        ScopeMode::Global,
    );
    let server = ctx.server();

    let first: Value = server
        .post("/sessions/capture")
        .add_header(ACTOR_HEADER, "alice")
        .add_header(SESSION_HEADER, "s1")
        .add_header("User-Agent", FIREFOX_UA)
        .json(&json!({}))
        .await
        .json();
    assert_eq!(first["written"], true);

    let second: Value = server
        .post("/sessions/capture")
        .add_header(ACTOR_HEADER, "alice")
        .add_header(SESSION_HEADER, "s1")
        .add_header("User-Agent", CHROME_UA)
        .json(&json!({ "client_ua": CHROME_UA }))
        .await
        .json();
    assert_eq!(second["written"], false);

    let row = ctx.store.row("s1").unwrap();
    assert_eq!(row.user_agent, FIREFOX_UA);
    assert_eq!(row.location, "Mountain View, California, United States");
    assert_eq!(ctx.store.update_count(), 1);
}

#[tokio::test]
async fn test_capture_prefers_client_agent_over_short_header() {
    let ctx = TestContext::new(vec![session_row("s1", "alice", "10.0.0.1", "")], "");

    let body: Value = ctx
        .server()
        .post("/sessions/capture")
        .add_header(ACTOR_HEADER, "alice")
        .add_header(SESSION_HEADER, "s1")
        .add_header("User-Agent", "curl/8")
        .json(&json!({ "client_ua": "MailApp/3.1 (Android 14)" }))
        .await
        .json();

    assert_eq!(body["written"], true);
    assert_eq!(ctx.store.row("s1").unwrap().user_agent, "MailApp/3.1 (Android 14)");
}

#[tokio::test]
async fn test_capture_requires_session_header() {
    let ctx = TestContext::new(vec![], "");

    ctx.server()
        .post("/sessions/capture")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_capture_foreign_session_forbidden_under_actor_scope() {
    let ctx = TestContext::with_options(
        vec![session_row("s1", "bob", "10.0.0.1", "")],
        "",
        MockGeo::new(),
        ScopeMode::Actor,
    );

    let response = ctx
        .server()
        .post("/sessions/capture")
        .add_header(ACTOR_HEADER, "alice")
        .add_header(SESSION_HEADER, "s1")
        .add_header("User-Agent", FIREFOX_UA)
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "AUTH_002");
    assert_eq!(ctx.store.update_count(), 0);
    assert_eq!(ctx.store.row("s1").unwrap().user_agent, "");
}
