// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios (spec §8 S1-S6), driven against
//! the assembled `scp_daemon::router` via `tower::ServiceExt::oneshot` —
//! the same harness shape the per-crate unit tests already use, scaled up
//! to exercise the full request/workflow/storage round trip.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use scp_core::SessionId;
use scp_daemon::state::test_support::test_state_with;
use scp_sandbox::agent::AgentPart;
use scp_sandbox::fake::{FakeAgentBackend, FakeSandbox};
use scp_sandbox::{AgentMessageResponse, SandboxAdapter};
use scp_storage::keys;
use scp_workflow::WorkflowEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const AUTH_TOKEN: &str = "test-auth-token";

fn rpc_body(id: i64, tool: &str, arguments: Value) -> Body {
    Body::from(
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments },
        })
        .to_string(),
    )
}

fn mcp_request(id: i64, tool: &str, arguments: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {AUTH_TOKEN}"))
        .body(rpc_body(id, tool, arguments))
        .unwrap()
}

/// Extract the JSON-RPC `result`/`error` payload a tool call returned. The
/// dispatcher wraps tool output as a single text content block (spec
/// §4.4), so this unwraps that envelope down to the tool's own JSON.
async fn tool_payload(response: axum::response::Response) -> Result<Value, Value> {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let envelope: Value = serde_json::from_slice(&bytes).unwrap();
    if let Some(error) = envelope.get("error") {
        return Err(error.clone());
    }
    let text = envelope["result"]["content"][0]["text"].as_str().unwrap();
    Ok(serde_json::from_str(text).unwrap())
}

/// S1 — new session with a repository, run to completion; then a second
/// call reusing that session (exercising the `sessionId` resume path too),
/// after pre-seeding the fake sandbox's agent-storage directory so
/// `backup-session` actually produces an archive.
#[tokio::test]
async fn s1_new_session_with_repo_runs_to_completion() {
    let sandbox = FakeSandbox::new();
    let agent = FakeAgentBackend::new();
    agent.script_default_response(AgentMessageResponse {
        parts: vec![AgentPart { part_type: "text".into(), text: Some("Added README.md".into()) }],
        error: None,
        usage: None,
    });
    let state = test_state_with(sandbox.clone(), agent);
    let app = scp_daemon::router(state.clone());

    // Bootstrap call: create the session so we learn its generated id.
    let bootstrap = app
        .clone()
        .oneshot(mcp_request(1, "run_task", json!({ "task": "bootstrap" })))
        .await
        .unwrap();
    let bootstrap = tool_payload(bootstrap).await.unwrap();
    let session_id = bootstrap["sessionId"].as_str().unwrap().to_string();
    assert!(session_id.len() <= 64);
    assert_eq!(bootstrap["status"], "started");

    let bootstrap_run_id = scp_core::RunId::from_raw(bootstrap["runId"].as_str().unwrap());
    state.workflow_engine.wait(&bootstrap_run_id).await.unwrap();

    // Seed the sandbox's agent-storage dir so the second run's
    // backup-session step has something to archive.
    sandbox
        .write_file(&session_id, "/root/.local/share/opencode/storage/session/a.json", b"{}")
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(mcp_request(
            2,
            "run_task",
            json!({ "task": "Add README", "sessionId": session_id, "repository": "https://github.com/u/r" }),
        ))
        .await
        .unwrap();
    let started = tool_payload(response).await.unwrap();
    assert_eq!(started["status"], "started");
    assert_eq!(started["sessionId"], session_id);
    let run_id_str = started["runId"].as_str().unwrap().to_string();
    assert_eq!(started["webUiUrl"], format!("https://control.example/session/{session_id}/"));

    let run_id = scp_core::RunId::from_raw(&run_id_str);
    let outcome = state.workflow_engine.wait(&run_id).await.unwrap();
    assert!(outcome.success);

    let result = app
        .clone()
        .oneshot(mcp_request(3, "get_result", json!({ "runId": run_id_str })))
        .await
        .unwrap();
    let result = tool_payload(result).await.unwrap();
    assert_eq!(result["status"], "completed");
    assert_eq!(result["result"]["success"], true);
    let started_at = result["startedAt"].as_u64().unwrap();
    let completed_at = result["completedAt"].as_u64().unwrap();
    assert!(completed_at >= started_at);
    assert!(result["webUiUrl"].as_str().is_some());

    let parsed_session_id = SessionId::parse(session_id.clone()).unwrap();
    let parsed_run_id = scp_core::RunId::from_raw(&run_id_str);
    assert!(state.object_store.get(&keys::session_key(&parsed_session_id)).await.unwrap().is_some());
    assert!(state.object_store.get(keys::SESSION_INDEX_KEY).await.unwrap().is_some());
    assert!(state.object_store.get(&keys::run_key(&parsed_run_id)).await.unwrap().is_some());
    assert!(state.object_store.get(keys::RUN_INDEX_KEY).await.unwrap().is_some());
    assert!(state.object_store.get(&keys::session_backup_key(&parsed_session_id)).await.unwrap().is_some());

    let session_index: Value =
        serde_json::from_slice(&state.object_store.get(keys::SESSION_INDEX_KEY).await.unwrap().unwrap().body)
            .unwrap();
    assert!(session_index["sessions"].get(&session_id).is_some());

    let run_index: Value =
        serde_json::from_slice(&state.object_store.get(keys::RUN_INDEX_KEY).await.unwrap().unwrap().body).unwrap();
    assert!(run_index["runs"].get(&run_id_str).is_some());
}

/// S2 — resuming a session id that does not exist reports a structured
/// `SessionNotFoundError`, not a generic failure.
#[tokio::test]
async fn s2_missing_session_continuation_is_reported() {
    let state = test_state_with(FakeSandbox::new(), FakeAgentBackend::new());
    let app = scp_daemon::router(state);

    let response = app
        .oneshot(mcp_request(1, "run_task", json!({ "sessionId": "does-not-exist", "task": "x" })))
        .await
        .unwrap();
    let error = tool_payload(response).await.unwrap_err();
    assert_eq!(error["code"], "SessionNotFoundError");
    assert_eq!(error["message"], "Session \"does-not-exist\" not found");
}

/// S6 — `list_runs` filtering and `before`/`hasMore` pagination, driven
/// directly against the run store so the three fixture runs land with
/// exact, known `startedAt` values (spec §8 scenario S6).
#[tokio::test]
async fn s6_list_runs_filters_and_paginates() {
    let state = test_state_with(FakeSandbox::new(), FakeAgentBackend::new());
    let session = scp_core::test_support::SessionBuilder::default().session_id("s6-session").build();
    state.session_store.put_session(&session).await.unwrap();

    let fixtures = [
        ("run-a0000000", scp_core::RunStatus::Completed, 100u64),
        ("run-b0000000", scp_core::RunStatus::Failed, 200u64),
        ("run-c0000000", scp_core::RunStatus::Completed, 300u64),
    ];
    for (run_id, status, started_at) in fixtures {
        let mut run = scp_core::Run::new_started(
            scp_core::RunId::from_raw(run_id),
            session.session_id.clone(),
            run_id,
            "task",
            "title",
            "model",
            started_at,
        );
        run.status = status;
        state.run_store.put_run(&run).await.unwrap();
    }

    let app = scp_daemon::router(state);

    let page1 = app
        .clone()
        .oneshot(mcp_request(1, "list_runs", json!({ "status": "completed", "limit": 1 })))
        .await
        .unwrap();
    let page1 = tool_payload(page1).await.unwrap();
    assert_eq!(page1["runs"].as_array().unwrap().len(), 1);
    assert_eq!(page1["runs"][0]["runId"], "run-c0000000");
    assert_eq!(page1["hasMore"], true);

    let page2 = app
        .oneshot(mcp_request(
            2,
            "list_runs",
            json!({ "status": "completed", "limit": 1, "before": 300 }),
        ))
        .await
        .unwrap();
    let page2 = tool_payload(page2).await.unwrap();
    assert_eq!(page2["runs"].as_array().unwrap().len(), 1);
    assert_eq!(page2["runs"][0]["runId"], "run-a0000000");
    assert_eq!(page2["hasMore"], false);
}

/// S3/S4/S5 — proxy path allow-listing, credential injection, and token
/// expiry, driven against a `ProxyEngine` pointed at a local echo server
/// standing in for the `github` upstream (kept in one test function so
/// the `GITHUB_TOKEN` env var the proxy reads per-request, spec §5, is
/// never raced by a sibling test in this binary).
#[tokio::test]
async fn s3_s4_s5_proxy_github_path_allowlist_and_token_lifecycle() {
    std::env::set_var("GITHUB_TOKEN", "secret-gh-token");

    let echo = axum::Router::new().fallback(echo_request);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, echo).await.unwrap();
    });
    let upstream = format!("http://{addr}");

    let mut registry = scp_proxy::ServiceRegistry::new();
    registry.register("github", Arc::new(scp_proxy::GithubService::new(upstream.clone())));
    let engine = scp_proxy::ProxyEngine {
        registry,
        jwt_secret: "proxy-secret".to_string(),
        mount_path: "/proxy".to_string(),
        client: reqwest::Client::new(),
    };
    let app = engine.router();

    // `ProxyEngine::handle` verifies tokens against the real wall clock
    // (spec §5), so tokens here must be minted from it too, not a fixed
    // fake timestamp.
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let valid_token = scp_proxy::create_token(
        scp_proxy::CreateTokenParams {
            secret: "proxy-secret",
            sandbox_id: "sandbox-1",
            session_id: None,
            expires_in: Some("1h"),
        },
        now,
    )
    .unwrap();

    // S3: a non-git path is rejected with 400, without reaching upstream.
    let rejected = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/proxy/github/owner/repo/releases")
                .header("authorization", format!("Bearer {valid_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    let body = rejected.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(std::str::from_utf8(&body).unwrap(), "Invalid git path");

    // S4: a git smart-HTTP path is forwarded with injected Basic auth and
    // a fixed User-Agent, preserving the query string.
    let forwarded = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/proxy/github/u/r.git/info/refs?service=git-upload-pack")
                .header("authorization", format!("Bearer {valid_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forwarded.status(), StatusCode::OK);
    let echoed: Value =
        serde_json::from_slice(&forwarded.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(echoed["path"], "/u/r.git/info/refs");
    assert_eq!(echoed["query"], "service=git-upload-pack");
    let expected_basic =
        format!("Basic {}", base64::Engine::encode(&base64::engine::general_purpose::STANDARD, "x-access-token:secret-gh-token"));
    assert_eq!(echoed["headers"]["authorization"], expected_basic);
    assert_eq!(echoed["headers"]["user-agent"], "Sandbox-Git-Proxy");

    // S5: an expired token is rejected before the path is even parsed for
    // allow-listing.
    let expired_token = scp_proxy::create_token(
        scp_proxy::CreateTokenParams {
            secret: "proxy-secret",
            sandbox_id: "sandbox-1",
            session_id: None,
            expires_in: Some("0"),
        },
        now.saturating_sub(5),
    )
    .unwrap();
    let expired = app
        .oneshot(
            Request::builder()
                .uri("/proxy/github/u/r.git/info/refs?service=git-upload-pack")
                .header("authorization", format!("Bearer {expired_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&expired.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["code"], "PROXY_TOKEN_EXPIRED");

    std::env::remove_var("GITHUB_TOKEN");
}

/// Echoes back the request's path, query string and headers as JSON, so
/// proxy-forwarding tests can assert on exactly what reached "upstream".
async fn echo_request(
    uri: axum::http::Uri,
    headers: axum::http::HeaderMap,
) -> axum::response::Json<Value> {
    let mut header_map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        header_map.insert(name.as_str().to_string(), Value::from(value.to_str().unwrap_or("")));
    }
    axum::response::Json(json!({
        "path": uri.path(),
        "query": uri.query().unwrap_or(""),
        "headers": header_map,
    }))
}
