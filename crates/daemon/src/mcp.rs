// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `/mcp` JSON-RPC dispatcher (spec §4.4/§6): a `tools/call` envelope
//! carrying one of `run_task`, `get_result`, `list_runs`. Grounded on the
//! teacher's `engine::executor` match-arm-per-concern style, generalized
//! from effect dispatch to RPC method dispatch.

use crate::state::AppState;
use crate::telemetry::ToolCallEvent;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use scp_core::{CoreError, Repository, RunId, RunStatus, Session, SessionId, SessionStatus};
use scp_proxy::{create_token, sandbox_facing_proxy_url, CreateTokenParams};
use scp_storage::ListRunsParams;
use scp_workflow::TaskParams;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

fn now_epoch_s() -> u64 {
    now_ms() / 1000
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<RpcParams>,
}

#[derive(Debug, Deserialize)]
pub struct RpcParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct RpcSuccess {
    content: Vec<ContentBlock>,
}

fn success_envelope(id: Value, payload: Value) -> Value {
    let text = serde_json::to_string(&payload).unwrap_or_else(|_| "null".to_string());
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": RpcSuccess { content: vec![ContentBlock { block_type: "text", text }] },
    })
}

fn error_envelope(id: Value, code: impl Into<String>, message: impl Into<String>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": RpcError { code: code.into(), message: message.into() },
    })
}

pub async fn handle(State(state): State<Arc<AppState>>, Json(request): Json<RpcRequest>) -> Response {
    let RpcRequest { id, method, params, .. } = request;

    if method != "tools/call" {
        return Json(error_envelope(id, "UNKNOWN_ERROR", format!("unknown method {method:?}"))).into_response();
    }
    let Some(params) = params else {
        return Json(error_envelope(id, "UNKNOWN_ERROR", "missing params")).into_response();
    };

    let request_id = id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string());
    let started = std::time::Instant::now();
    let outcome = match params.name.as_str() {
        "run_task" => run_task(&state, params.arguments).await.map(|v| v),
        "get_result" => get_result(&state, params.arguments).await,
        "list_runs" => list_runs(&state, params.arguments).await,
        other => Err(CoreError::Validation(format!("unknown tool {other:?}"))),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(payload) => {
            ToolCallEvent::success(request_id.clone(), params.name.clone(), duration_ms).emit();
            Json(success_envelope(id, payload)).into_response()
        }
        Err(err) => {
            let code = err.code();
            ToolCallEvent::failure(request_id, params.name, duration_ms, code.clone(), err.to_string()).emit();
            Json(error_envelope(id, code, err.to_string())).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunTaskArgs {
    task: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Spec §4.4 `run_task`: resolve or create the session, mint a proxy token,
/// submit the workflow, and return at submission time — not completion.
async fn run_task(state: &AppState, arguments: Value) -> Result<Value, CoreError> {
    let args: RunTaskArgs =
        serde_json::from_value(arguments).map_err(|e| CoreError::Validation(e.to_string()))?;

    let now = now_ms();
    let repository = args.repository.as_ref().map(|url| Repository { url: url.clone(), branch: args.branch.clone() });

    let mut session = match &args.session_id {
        Some(raw) => {
            let session_id =
                SessionId::parse(raw.clone()).map_err(|e| CoreError::Validation(e.to_string()))?;
            state
                .session_store
                .get_session(&session_id)
                .await?
                .ok_or_else(|| CoreError::SessionNotFound(raw.clone()))?
        }
        None => {
            let session_id = SessionId::generate();
            Session::new_active(
                session_id,
                &state.config.public_base_url,
                state.config.default_model.clone(),
                now,
                repository.clone(),
            )
        }
    };

    if let Some(repo) = &repository {
        session.record_clone(&repo.url);
    }
    if session.status == SessionStatus::Creating {
        session.status = SessionStatus::Active;
    }

    let run_id = RunId::generate();
    let model = args.model.clone().unwrap_or_else(|| session.config.default_model.clone());
    let title = args.title.clone().unwrap_or_else(|| args.task.clone());

    let proxy_token = create_token(
        CreateTokenParams {
            secret: &state.config.proxy_jwt_secret,
            sandbox_id: &session.sandbox_id,
            session_id: Some(session.session_id.as_str()),
            expires_in: Some("2h"),
        },
        now_epoch_s(),
    )
    .map_err(|e| CoreError::Validation(e.to_string()))?;

    let proxy_base_url = sandbox_facing_proxy_url(&state.config.public_base_url, &state.config.mount_path);

    // Run creation stays owned by the workflow's `create-run` step (spec
    // §3/§4.3 step 1) — `submit` runs it synchronously before spawning the
    // rest, so a caller polling `get_result` right after this call returns
    // is guaranteed to find the run already written.
    let params = TaskParams {
        session_id: session.session_id.clone(),
        sandbox_id: session.sandbox_id.clone(),
        task: args.task,
        model,
        run_id: run_id.clone(),
        title,
        repository_url: repository.as_ref().map(|r| r.url.clone()),
        branch: args.branch,
        proxy_token,
        proxy_base_url,
        existing_opencode_session_id: session.opencode_session_id.clone(),
    };

    state
        .workflow_engine
        .submit(run_id.clone(), params)
        .await
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    session.touch(now);
    state.session_store.put_session(&session).await?;

    Ok(serde_json::json!({
        "runId": run_id.as_str(),
        "sessionId": session.session_id.as_str(),
        "status": "started",
        "webUiUrl": session.web_ui_url,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetResultArgs {
    run_id: String,
}

/// Spec §4.4 `get_result`: the canonical polling endpoint. `webUiUrl` is
/// simply absent if the owning session has since been deleted.
async fn get_result(state: &AppState, arguments: Value) -> Result<Value, CoreError> {
    let args: GetResultArgs =
        serde_json::from_value(arguments).map_err(|e| CoreError::Validation(e.to_string()))?;
    let run_id = RunId::parse(args.run_id.clone()).map_err(|e| CoreError::Validation(e.to_string()))?;

    let run = state
        .run_store
        .get_run(&run_id)
        .await?
        .ok_or_else(|| CoreError::RunNotFound(args.run_id.clone()))?;

    let web_ui_url = state.session_store.get_session(&run.session_id).await?.map(|s| s.web_ui_url);

    Ok(serde_json::json!({
        "runId": run.run_id.as_str(),
        "sessionId": run.session_id.as_str(),
        "status": run.status,
        "title": run.title,
        "startedAt": run.started_at,
        "completedAt": run.completed_at,
        "result": run.result,
        "webUiUrl": web_ui_url,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRunsArgs {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    status: Option<RunStatus>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    before: Option<u64>,
}

/// Spec §4.4 `list_runs`: fetch `limit + 1` entries so `hasMore` can be
/// derived without a second round trip.
async fn list_runs(state: &AppState, arguments: Value) -> Result<Value, CoreError> {
    let args: ListRunsArgs =
        serde_json::from_value(arguments).map_err(|e| CoreError::Validation(e.to_string()))?;
    let limit = args.limit.unwrap_or(10).clamp(1, 100);

    let session_id = args
        .session_id
        .map(SessionId::parse)
        .transpose()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let result = state
        .run_store
        .list_runs(ListRunsParams {
            session_id,
            status: args.status,
            before: args.before,
            limit: limit + 1,
        })
        .await?;

    let has_more = result.entries.len() > limit;
    let runs: Vec<_> = result.entries.into_iter().take(limit).collect();

    Ok(serde_json::json!({
        "runs": runs,
        "hasMore": has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    fn call(tool: &str, arguments: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Value::from(1),
            method: "tools/call".to_string(),
            params: Some(RpcParams { name: tool.to_string(), arguments }),
        }
    }

    #[tokio::test]
    async fn run_task_without_session_id_creates_a_new_session() {
        let state = test_state();
        let result = run_task(&state, serde_json::json!({ "task": "write tests" })).await.unwrap();
        assert_eq!(result["status"], "started");
        assert!(result["sessionId"].as_str().unwrap().len() <= 64);

        let session_id = SessionId::parse(result["sessionId"].as_str().unwrap()).unwrap();
        assert!(state.session_store.get_session(&session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn run_task_with_missing_session_id_reports_not_found() {
        let state = test_state();
        let err = run_task(&state, serde_json::json!({ "task": "x", "sessionId": "nope" })).await.unwrap_err();
        assert!(matches!(err, CoreError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn get_result_for_unknown_run_reports_not_found() {
        let state = test_state();
        let err = get_result(&state, serde_json::json!({ "runId": "run-00000000" })).await.unwrap_err();
        assert!(matches!(err, CoreError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn list_runs_reports_has_more_past_the_limit() {
        let state = test_state();
        let run_task_result = run_task(&state, serde_json::json!({ "task": "a" })).await.unwrap();
        let session_id = run_task_result["sessionId"].as_str().unwrap();

        run_task(&state, serde_json::json!({ "task": "b", "sessionId": session_id })).await.unwrap();
        run_task(&state, serde_json::json!({ "task": "c", "sessionId": session_id })).await.unwrap();

        let listed = list_runs(&state, serde_json::json!({ "sessionId": session_id, "limit": 2 })).await.unwrap();
        assert_eq!(listed["runs"].as_array().unwrap().len(), 2);
        assert_eq!(listed["hasMore"], true);
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool_with_tagged_error() {
        let state = test_state();
        let request = call("not_a_real_tool", serde_json::json!({}));
        let response = handle(State(state), Json(request)).await;
        assert!(response.status().is_success());
    }
}
