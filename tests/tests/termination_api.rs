//! Termination tests through the HTTP API.

use axum::http::StatusCode;
use integration_tests::fixtures::*;
use integration_tests::mocks::MockGeo;
use integration_tests::setup::{TestContext, ACTOR_HEADER};
use serde_json::{json, Value};
use session_store::ScopeMode;

fn two_users() -> Vec<sessions_core::LocalRow> {
    vec![
        session_row("s1", "alice", "10.0.0.1", FIREFOX_UA),
        session_row("s2", "alice", "10.0.0.2", CHROME_UA),
        session_row("s3", "bob", "10.0.0.9", FIREFOX_UA),
    ]
}

#[tokio::test]
async fn test_terminate_local_session() {
    let ctx = TestContext::new(two_users(), WHO_OUTPUT);

    let response = ctx
        .server()
        .post("/sessions/terminate")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({ "sess_id": "s2" }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["refresh"], true);
    assert_eq!(body["local_deleted"], 1);
    assert!(ctx.store.row("s2").is_none());
    assert_eq!(ctx.store.len(), 2);
    assert!(ctx.runner.kicks().is_empty());
}

#[tokio::test]
async fn test_terminate_unknown_local_session_still_refreshes() {
    let ctx = TestContext::new(two_users(), "");

    let body: Value = ctx
        .server()
        .post("/sessions/terminate")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({ "sess_id": "gone" }))
        .await
        .json();

    assert_eq!(body["refresh"], true);
    assert_eq!(body["local_deleted"], 0);
    assert_eq!(ctx.store.len(), 3);
}

#[tokio::test]
async fn test_terminate_local_store_down_withholds_refresh() {
    let ctx = TestContext::new(two_users(), "");
    ctx.store.set_should_fail(true);

    let body: Value = ctx
        .server()
        .post("/sessions/terminate")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({ "sess_id": "s1" }))
        .await
        .json();

    assert_eq!(body["refresh"], false);
    assert_eq!(body["errors"], json!(["STORE_001"]));
}

#[tokio::test]
async fn test_terminate_external_issues_single_kick() {
    let ctx = TestContext::new(vec![], WHO_OUTPUT);

    let body: Value = ctx
        .server()
        .post("/sessions/terminate-external")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({ "username": "alice", "ip": "5.6.7.8" }))
        .await
        .json();

    assert_eq!(body["refresh"], true);
    assert_eq!(body["kicked"], 1);

    let calls = ctx.runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "sudo");
    assert_eq!(calls[0].1, vec!["doveadm", "kick", "alice", "5.6.7.8"]);
}

#[tokio::test]
async fn test_terminate_external_rejects_injection() {
    let ctx = TestContext::new(vec![], WHO_OUTPUT);
    let server = ctx.server();

    for (username, ip, code) in [
        ("alice; reboot", "1.2.3.4", "VALID_001"),
        ("-alice", "1.2.3.4", "VALID_001"),
        ("alice", "1.2.3.4 $(id)", "VALID_002"),
        ("alice", "example.com", "VALID_002"),
    ] {
        let response = server
            .post("/sessions/terminate-external")
            .add_header(ACTOR_HEADER, "alice")
            .json(&json!({ "username": username, "ip": ip }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], code, "input {:?}/{:?}", username, ip);
    }

    assert!(ctx.runner.calls().is_empty());
}

#[tokio::test]
async fn test_terminate_external_foreign_user_forbidden() {
    let ctx = TestContext::new(vec![], WHO_OUTPUT);

    let response = ctx
        .server()
        .post("/sessions/terminate-external")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({ "username": "bob", "ip": "9.9.9.9" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "AUTH_002");
    assert!(ctx.runner.kicks().is_empty());
}

#[tokio::test]
async fn test_terminate_external_kick_failure() {
    let ctx = TestContext::new(vec![], WHO_OUTPUT);
    ctx.runner.fail_kicks_for("1.2.3.4");

    let body: Value = ctx
        .server()
        .post("/sessions/terminate-external")
        .add_header(ACTOR_HEADER, "alice")
        .json(&json!({ "username": "alice", "ip": "1.2.3.4" }))
        .await
        .json();

    assert_eq!(body["refresh"], false);
    assert_eq!(body["kick_failures"], 1);
    // Command output stays in the server log.
    assert_eq!(body["errors"], json!(["DOVEADM_002"]));
}

#[tokio::test]
async fn test_terminate_all_global_scope() {
    let ctx = TestContext::new(two_users(), WHO_OUTPUT);
    ctx.runner.fail_kicks_for("5.6.7.8");

    let body: Value = ctx
        .server()
        .post("/sessions/terminate-all")
        .add_header(ACTOR_HEADER, "alice")
        .await
        .json();

    assert_eq!(body["refresh"], true);
    assert_eq!(body["local_deleted"], 3);
    assert_eq!(body["kicked"], 1);
    assert_eq!(body["kick_failures"], 1);
    assert!(ctx.store.is_empty());

    // Only the actor's connections are kicked; bob's is untouched.
    assert_eq!(
        ctx.runner.kicks(),
        vec![
            ("alice".to_string(), "1.2.3.4".to_string()),
            ("alice".to_string(), "5.6.7.8".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_terminate_all_actor_scope() {
    let ctx = TestContext::with_options(two_users(), WHO_OUTPUT, MockGeo::new(), ScopeMode::Actor);

    let body: Value = ctx
        .server()
        .post("/sessions/terminate-all")
        .add_header(ACTOR_HEADER, "alice")
        .await
        .json();

    assert_eq!(body["local_deleted"], 2);
    assert_eq!(ctx.store.len(), 1);
    assert!(ctx.store.row("s3").is_some());
}

#[tokio::test]
async fn test_terminate_all_with_enumeration_failure() {
    let ctx = TestContext::new(two_users(), WHO_OUTPUT);
    ctx.runner.set_who_fails(true);

    let body: Value = ctx
        .server()
        .post("/sessions/terminate-all")
        .add_header(ACTOR_HEADER, "alice")
        .await
        .json();

    assert_eq!(body["refresh"], true);
    assert_eq!(body["kicked"], 0);
    assert_eq!(body["errors"], json!(["DOVEADM_001"]));
    assert!(ctx.runner.kicks().is_empty());
}

#[tokio::test]
async fn test_terminate_all_both_backends_down() {
    let ctx = TestContext::new(two_users(), WHO_OUTPUT);
    ctx.runner.set_who_fails(true);
    ctx.store.set_should_fail(true);

    let body: Value = ctx
        .server()
        .post("/sessions/terminate-all")
        .add_header(ACTOR_HEADER, "alice")
        .await
        .json();

    assert_eq!(body["refresh"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_terminate_requires_actor() {
    let ctx = TestContext::new(two_users(), WHO_OUTPUT);

    ctx.server()
        .post("/sessions/terminate-all")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.store.len(), 3);
}
