// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkflowEngine` — submits a task to run in the background and lets a
//! caller later await its outcome (spec §4.3: `run_task` returns as soon as
//! the run is accepted, not when it finishes). Grounded on the teacher's
//! `engine::Engine` (`crates/engine/src/lib.rs`): a `tokio::spawn`-backed
//! dispatcher holding a registry of in-flight handles, generalized from the
//! teacher's single effect queue to one `JoinHandle` per workflow id.

use crate::steps::{ensure_run_created, run_task_workflow, TaskParams, TaskResult};
pub use crate::steps::WorkflowDeps;
use async_trait::async_trait;
use parking_lot::Mutex;
use scp_core::RunId;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {0:?} is already running")]
    AlreadyRunning(String),
    #[error("no running or completed workflow found for {0:?}")]
    NotFound(String),
    #[error("workflow task panicked: {0}")]
    Join(String),
    #[error("create-run step failed: {0}")]
    CreateRun(String),
}

/// Submits workflows and lets callers wait on their completion. Kept as a
/// trait, not a concrete struct, so `scp-daemon` can hold `Arc<dyn
/// WorkflowEngine>` without depending on the tokio-spawn implementation
/// detail.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Accept a task and start running it in the background. Returns once
    /// the workflow has been scheduled, not once it has finished.
    async fn submit(&self, workflow_id: RunId, params: TaskParams) -> Result<(), WorkflowError>;

    /// Block until `workflow_id`'s task execution finishes and return its
    /// outcome. Consumes the engine's handle for that id — a second `wait`
    /// on the same id after this one returns fails with `NotFound`.
    async fn wait(&self, workflow_id: &RunId) -> Result<TaskResult, WorkflowError>;
}

/// `WorkflowEngine` backed by `tokio::spawn`, durable across process
/// restarts only insofar as step outputs are memoized in the object store
/// (spec §4.3) — the in-memory `JoinHandle` registry itself does not
/// survive a restart; a restarted process re-submitting the same workflow
/// id replays memoized steps instead of re-running them.
pub struct LocalWorkflowEngine {
    deps: Arc<WorkflowDeps>,
    handles: Mutex<HashMap<String, JoinHandle<TaskResult>>>,
}

impl LocalWorkflowEngine {
    pub fn new(deps: Arc<WorkflowDeps>) -> Self {
        Self { deps, handles: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl WorkflowEngine for LocalWorkflowEngine {
    async fn submit(&self, workflow_id: RunId, params: TaskParams) -> Result<(), WorkflowError> {
        let key = workflow_id.as_str().to_string();
        if self.handles.lock().contains_key(&key) {
            return Err(WorkflowError::AlreadyRunning(key));
        }

        // Run creation is owned by the workflow, never the dispatcher (spec
        // §3), but a caller polling `get_result` right after `submit`
        // returns must already find the run — so `create-run` runs
        // synchronously here, before the remaining steps are spawned in the
        // background. It's memoized, so the spawned task's own attempt at
        // this step below just replays the cached output.
        ensure_run_created(&self.deps, &workflow_id, &params)
            .await
            .map_err(|e| WorkflowError::CreateRun(e.to_string()))?;

        let deps = self.deps.clone();
        let wf_id = workflow_id.clone();
        let handle = tokio::spawn(async move { run_task_workflow(&deps, &wf_id, params).await });
        self.handles.lock().insert(key, handle);
        Ok(())
    }

    async fn wait(&self, workflow_id: &RunId) -> Result<TaskResult, WorkflowError> {
        let key = workflow_id.as_str().to_string();
        let handle = self
            .handles
            .lock()
            .remove(&key)
            .ok_or_else(|| WorkflowError::NotFound(key.clone()))?;
        handle.await.map_err(|e| WorkflowError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_core::test_support::SessionBuilder;
    use scp_core::SessionId;
    use scp_sandbox::fake::{FakeAgentBackend, FakeAgentBackendFactory, FakeSandbox, FakeSandboxFactory};
    use scp_sandbox::AgentMessageResponse;
    use scp_storage::{InMemoryObjectStore, ObjectStore, RunStore, SessionStore};

    fn deps_with(agent: FakeAgentBackend) -> Arc<WorkflowDeps> {
        let sandbox = FakeSandbox::new();
        let object_store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        Arc::new(WorkflowDeps {
            object_store: object_store.clone(),
            session_store: Arc::new(SessionStore::new(object_store.clone())),
            run_store: Arc::new(RunStore::new(object_store)),
            sandbox_factory: Arc::new(FakeSandboxFactory::new(sandbox)),
            agent_factory: Arc::new(FakeAgentBackendFactory::new(agent)),
        })
    }

    fn params(session_id: &str, run_id: &str) -> TaskParams {
        TaskParams {
            session_id: SessionId::parse(session_id).unwrap(),
            sandbox_id: session_id.to_string(),
            task: "Write tests".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            run_id: RunId::from_raw(run_id),
            title: "Write tests".to_string(),
            repository_url: None,
            branch: None,
            proxy_token: "tok".to_string(),
            proxy_base_url: "https://host/proxy".to_string(),
            existing_opencode_session_id: None,
        }
    }

    #[tokio::test]
    async fn submit_then_wait_returns_the_workflow_outcome() {
        let agent = FakeAgentBackend::new();
        agent.script_default_response(AgentMessageResponse {
            parts: vec![scp_sandbox::agent::AgentPart { part_type: "text".into(), text: Some("ok".into()) }],
            error: None,
            usage: None,
        });
        let deps = deps_with(agent);
        deps.session_store.put_session(&SessionBuilder::default().session_id("abc").build()).await.unwrap();

        let engine = LocalWorkflowEngine::new(deps);
        let workflow_id = RunId::from_raw("run-11110000");
        engine.submit(workflow_id.clone(), params("abc", "run-11110000")).await.unwrap();

        let result = engine.wait(&workflow_id).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn resubmitting_a_workflow_already_in_flight_is_rejected() {
        let deps = deps_with(FakeAgentBackend::new());
        deps.session_store.put_session(&SessionBuilder::default().session_id("dup").build()).await.unwrap();

        let engine = LocalWorkflowEngine::new(deps);
        let workflow_id = RunId::from_raw("run-22220000");
        engine.submit(workflow_id.clone(), params("dup", "run-22220000")).await.unwrap();

        let err = engine.submit(workflow_id.clone(), params("dup", "run-22220000")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyRunning(_)));

        engine.wait(&workflow_id).await.unwrap();
    }

    #[tokio::test]
    async fn waiting_on_an_unknown_workflow_fails() {
        let deps = deps_with(FakeAgentBackend::new());
        let engine = LocalWorkflowEngine::new(deps);
        let err = engine.wait(&RunId::from_raw("run-99999999")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
