// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five named workflow steps (spec §4.3): `create-run`,
//! `prepare-sandbox`, `execute-task`, `complete-run`, `backup-session`.
//! Grounded on `engine::executor`'s per-effect match-arm style (timed,
//! traced, one function per concern) and on
//! `daemon::adapters::credential`'s idempotent check-then-act pattern for
//! `prepare_sandbox`'s "is it already configured" checks.

use crate::memo::StepMemo;
use scp_core::{CoreError, Run, RunId, SessionId};
use scp_sandbox::backup::{export_storage_dir, import_storage_dir};
use scp_sandbox::{AgentBackendFactory, SandboxFactory, SendMessageParams, StartProcessOptions};
use scp_storage::{keys, CompleteRunParams, ObjectStore, PutOptions, RunStore, SessionStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Directory the coding agent persists its own session state under inside
/// the sandbox (spec §4.3 step 2/5). Matches the literal path the teacher's
/// `FakeSandbox`-driven backup tests exercise.
pub const OPENCODE_STORAGE_DIR: &str = "/root/.local/share/opencode/storage";

const DEFAULT_GIT_EMAIL: &str = "agent@sandbox.local";
const DEFAULT_GIT_NAME: &str = "Sandbox Agent";

/// Appended to every user task before it's submitted to the agent (spec
/// §4.3 step 3): asks for a structured summary so `get_result` has
/// something useful to surface.
const TASK_SUMMARY_SUFFIX: &str = "\n\nWhen you are done, reply with a structured summary: \
accomplishments, files changed, commits made, and any warnings.";

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Collaborators the workflow calls through (spec §4.3 F/G/H plus C/D).
pub struct WorkflowDeps {
    pub object_store: Arc<dyn ObjectStore>,
    pub session_store: Arc<SessionStore>,
    pub run_store: Arc<RunStore>,
    pub sandbox_factory: Arc<dyn SandboxFactory>,
    pub agent_factory: Arc<dyn AgentBackendFactory>,
}

/// Input the dispatcher assembles for one task execution (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParams {
    pub session_id: SessionId,
    pub sandbox_id: String,
    pub task: String,
    pub model: String,
    pub run_id: RunId,
    pub title: String,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    pub proxy_token: String,
    /// The proxy's URL as reachable *from inside the sandbox* (already
    /// host-rewritten for local dev, spec §4.1).
    pub proxy_base_url: String,
    #[serde(default)]
    pub existing_opencode_session_id: Option<String>,
}

/// Workflow outcome (spec §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opencode_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

/// Output of `prepare-sandbox` (spec §4.3 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareResult {
    pub workspace_path: String,
    pub restored_backup: bool,
    pub cloned_repo: bool,
    pub configured_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackupOutcome {
    backed_up: bool,
}

/// Run just `create-run` against a fresh `StepMemo` scoped to
/// `workflow_id`. Exposed so the workflow engine can write the run record
/// synchronously before spawning the rest of the workflow in the
/// background — run creation stays owned by the workflow (spec §3), but a
/// caller polling `get_result` right after submission must already find
/// it. Memoized, so the full `run_task_workflow`'s own `create-run` call
/// below just replays this cached output.
pub async fn ensure_run_created(
    deps: &WorkflowDeps,
    workflow_id: &RunId,
    params: &TaskParams,
) -> Result<(), CoreError> {
    let memo = StepMemo::new(deps.object_store.as_ref(), workflow_id.as_str());
    memo.run("create-run", || create_run(deps, params)).await?;
    Ok(())
}

/// Run the five steps in strict order against a fresh `StepMemo` scoped to
/// `workflow_id`. Steps 1, 2 and 4 may fail the whole workflow; step 3
/// never throws (spec §7) so step 4 always runs once step 2 succeeds.
pub async fn run_task_workflow(
    deps: &WorkflowDeps,
    workflow_id: &RunId,
    params: TaskParams,
) -> TaskResult {
    let memo = StepMemo::new(deps.object_store.as_ref(), workflow_id.as_str());

    if let Err(e) = memo.run("create-run", || create_run(deps, &params)).await {
        tracing::error!(workflow_id = %workflow_id, error = %e, "create-run failed; workflow aborted");
        return TaskResult { success: false, error: Some(e.to_string()), ..Default::default() };
    }

    let prepare = match memo.run("prepare-sandbox", || prepare_sandbox(deps, &params)).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(workflow_id = %workflow_id, error = %e, "prepare-sandbox failed; workflow aborted");
            return TaskResult { success: false, error: Some(e.to_string()), ..Default::default() };
        }
    };

    let exec_result = memo
        .run_always("execute-task", || execute_task(deps, &params, &prepare.workspace_path))
        .await;

    if let Err(e) = memo.run("complete-run", || complete_run(deps, &params, &exec_result)).await {
        // Spec §7: an accepted gap — the run stays at `status:"started"` and
        // must be reconciled externally. The workflow still reports the
        // execution outcome it actually observed.
        tracing::error!(workflow_id = %workflow_id, error = %e, "complete-run failed; run left non-terminal");
    }

    memo.run_always("backup-session", || backup_session(deps, &params)).await;

    exec_result
}

/// Step 1: write a `started` run record, upserting the global run index.
async fn create_run(deps: &WorkflowDeps, params: &TaskParams) -> Result<Run, CoreError> {
    if let Some(existing) = deps.run_store.get_run(&params.run_id).await? {
        return Ok(existing);
    }
    let run = Run::new_started(
        params.run_id.clone(),
        params.session_id.clone(),
        params.run_id.as_str(),
        params.task.clone(),
        params.title.clone(),
        params.model.clone(),
        now_ms(),
    );
    deps.run_store.put_run(&run).await?;
    Ok(run)
}

fn repo_dir_name(repository_url: &str) -> String {
    repository_url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or("repo")
        .to_string()
}

fn sandbox_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::SandboxAdapter(e.to_string())
}

/// Step 2: idempotently configure the proxy env file and git credential
/// rewrite, restore prior agent state if missing, and clone/fetch the
/// repository (spec §4.3 step 2). Every check-then-act pair here is
/// idempotent — running this twice on an already-configured sandbox is a
/// no-op (spec §8 property 10).
async fn prepare_sandbox(deps: &WorkflowDeps, params: &TaskParams) -> Result<PrepareResult, CoreError> {
    let sandbox = deps.sandbox_factory.handle(&params.sandbox_id);
    let env_path = "/workspace/.env";

    let env_contents = sandbox
        .read_file(&params.sandbox_id, env_path)
        .await
        .map_err(sandbox_err)?
        .unwrap_or_default();
    let has_anthropic_base = env_contents.windows(b"ANTHROPIC_BASE_URL".len()).any(|w| w == b"ANTHROPIC_BASE_URL");

    let configured_proxy = if has_anthropic_base {
        false
    } else {
        let append = format!(
            "ANTHROPIC_BASE_URL={}/proxy/anthropic\nANTHROPIC_API_KEY={}\n",
            params.proxy_base_url, params.proxy_token
        );
        sandbox
            .append_file(&params.sandbox_id, env_path, append.as_bytes())
            .await
            .map_err(sandbox_err)?;
        sandbox
            .git_configure_proxy(
                &params.sandbox_id,
                &params.proxy_base_url,
                &params.proxy_token,
                DEFAULT_GIT_EMAIL,
                DEFAULT_GIT_NAME,
            )
            .await
            .map_err(sandbox_err)?;
        true
    };

    let storage_present = sandbox.file_exists(&params.sandbox_id, OPENCODE_STORAGE_DIR).await.map_err(sandbox_err)?;
    let restored_backup = if storage_present {
        false
    } else {
        let key = keys::session_backup_key(&params.session_id);
        match deps.object_store.get(&key).await.map_err(|e| CoreError::StorageRead(e.to_string()))? {
            Some(obj) => {
                import_storage_dir(&*sandbox, &params.sandbox_id, OPENCODE_STORAGE_DIR, &obj.body)
                    .await
                    .map_err(sandbox_err)?;
                true
            }
            None => false,
        }
    };

    let (workspace_path, cloned_repo) = match &params.repository_url {
        Some(url) => {
            let dest = format!("/workspace/{}", repo_dir_name(url));
            let git_marker = format!("{dest}/.git");
            if sandbox.file_exists(&params.sandbox_id, &git_marker).await.map_err(sandbox_err)? {
                sandbox.git_fetch(&params.sandbox_id, &dest).await.map_err(sandbox_err)?;
                if let Some(branch) = &params.branch {
                    sandbox.git_checkout(&params.sandbox_id, &dest, branch).await.map_err(sandbox_err)?;
                }
                (dest, false)
            } else {
                sandbox
                    .git_clone(&params.sandbox_id, &dest, url, params.branch.as_deref().or(Some("main")))
                    .await
                    .map_err(sandbox_err)?;
                (dest, true)
            }
        }
        None => ("/workspace".to_string(), false),
    };

    Ok(PrepareResult { workspace_path, restored_backup, cloned_repo, configured_proxy })
}

/// Step 3: launch the agent subprocess, submit the task, collect output.
/// Never throws to the caller (spec §4.3 step 3/§7) — any failure becomes
/// `{success:false, output:"", error}`. Always stops the subprocess.
async fn execute_task(deps: &WorkflowDeps, params: &TaskParams, workspace_path: &str) -> TaskResult {
    let sandbox = deps.sandbox_factory.handle(&params.sandbox_id);

    let handle = match sandbox
        .start_process(
            &params.sandbox_id,
            StartProcessOptions {
                command: "opencode".to_string(),
                args: vec!["serve".to_string()],
                env: vec![
                    ("ANTHROPIC_BASE_URL".to_string(), format!("{}/proxy/anthropic", params.proxy_base_url)),
                    ("ANTHROPIC_API_KEY".to_string(), params.proxy_token.clone()),
                ],
                cwd: Some(workspace_path.to_string()),
            },
        )
        .await
    {
        Ok(h) => h,
        Err(e) => return execute_task_failure(params, e.to_string()),
    };

    let outcome = run_agent_turn(deps, params, workspace_path, &handle.port).await;
    let _ = sandbox.stop_process(&params.sandbox_id, &handle).await;

    match outcome {
        Ok(result) => result,
        Err(e) => execute_task_failure(params, e.to_string()),
    }
}

fn execute_task_failure(params: &TaskParams, message: String) -> TaskResult {
    TaskResult {
        success: false,
        output: Some(String::new()),
        error: Some(message),
        title: None,
        opencode_session_id: Some(params.existing_opencode_session_id.clone().unwrap_or_else(|| "unknown".to_string())),
        workspace_path: None,
        tokens: None,
    }
}

async fn run_agent_turn(
    deps: &WorkflowDeps,
    params: &TaskParams,
    workspace_path: &str,
    port: &Option<u16>,
) -> Result<TaskResult, CoreError> {
    let sandbox = deps.sandbox_factory.handle(&params.sandbox_id);
    let port = port.ok_or_else(|| CoreError::SandboxAdapter("agent process exposed no port".to_string()))?;
    let base_url = sandbox.expose_port(&params.sandbox_id, port).await.map_err(sandbox_err)?;
    let agent = deps.agent_factory.handle(&base_url);

    let session_id = match &params.existing_opencode_session_id {
        Some(id) => id.clone(),
        None => {
            let sessions = agent.list_sessions(workspace_path).await.map_err(sandbox_err)?;
            match sessions.into_iter().next() {
                Some(existing) => existing.id,
                None => agent.create_session(workspace_path).await.map_err(sandbox_err)?.id,
            }
        }
    };

    let text = format!("{}{}", params.task, TASK_SUMMARY_SUFFIX);
    let response = agent
        .send_message(&session_id, SendMessageParams { text: &text, provider_id: "anthropic", model_id: &params.model })
        .await
        .map_err(sandbox_err)?;

    let output = response.output_text();
    let tokens = response.usage.as_ref().map(|u| u.input + u.output);

    if let Some(error) = response.error {
        return Ok(TaskResult {
            success: false,
            output: Some(output),
            error: Some(error),
            title: None,
            opencode_session_id: Some(session_id),
            workspace_path: Some(workspace_path.to_string()),
            tokens,
        });
    }

    Ok(TaskResult {
        success: true,
        output: Some(output),
        error: None,
        title: None,
        opencode_session_id: Some(session_id),
        workspace_path: Some(workspace_path.to_string()),
        tokens,
    })
}

/// Step 4: move the run to its terminal status and best-effort update the
/// session (spec §4.3 step 4). A missing session is logged and swallowed,
/// never failing the workflow.
async fn complete_run(deps: &WorkflowDeps, params: &TaskParams, result: &TaskResult) -> Result<Run, CoreError> {
    let now = now_ms();
    let run = deps
        .run_store
        .complete_run(
            &params.run_id,
            CompleteRunParams {
                success: result.success,
                output: result.output.clone(),
                error: result.error.clone(),
                title: result.title.clone(),
            },
            now,
        )
        .await?;

    match deps.session_store.get_session(&params.session_id).await? {
        Some(mut session) => {
            if let Some(opencode_session_id) = &result.opencode_session_id {
                session.opencode_session_id = Some(opencode_session_id.clone());
            }
            if let Some(workspace_path) = &result.workspace_path {
                session.workspace_path = workspace_path.clone();
            }
            if let Some(url) = &params.repository_url {
                session.record_clone(url);
            }
            session.touch(now);
            if let Err(e) = deps.session_store.put_session(&session).await {
                tracing::warn!(session_id = %params.session_id, error = %e, "failed to update session after run completion");
            }
        }
        None => {
            tracing::warn!(session_id = %params.session_id, "session vanished before run completion; continuing");
        }
    }

    Ok(run)
}

/// Step 5: best-effort archive of the agent's storage directory. Every
/// failure is swallowed — backup is advisory, never causal to run success
/// (spec §4.3 step 5).
async fn backup_session(deps: &WorkflowDeps, params: &TaskParams) -> BackupOutcome {
    let sandbox = deps.sandbox_factory.handle(&params.sandbox_id);
    let archive = match export_storage_dir(&*sandbox, &params.sandbox_id, OPENCODE_STORAGE_DIR).await {
        Ok(archive) => archive,
        Err(e) => {
            tracing::warn!(session_id = %params.session_id, error = %e, "backup-session: export failed");
            return BackupOutcome { backed_up: false };
        }
    };

    let Some(bytes) = archive else {
        tracing::debug!(session_id = %params.session_id, "backup-session: nothing to back up");
        return BackupOutcome { backed_up: false };
    };

    let key = keys::session_backup_key(&params.session_id);
    match deps.object_store.put(&key, bytes, PutOptions::default()).await {
        Ok(_) => BackupOutcome { backed_up: true },
        Err(e) => {
            tracing::warn!(session_id = %params.session_id, error = %e, "backup-session: failed to persist archive");
            BackupOutcome { backed_up: false }
        }
    }
}
