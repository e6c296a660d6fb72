// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared daemon state (spec §5: "the daemon's own in-process state is
//! limited to the config, the object store handle, the sandbox/agent
//! factory, and the workflow engine's task registry"). One `Arc<AppState>`
//! is cloned into every axum handler via `State`.

use crate::config::Config;
use scp_sandbox::SandboxFactory;
use scp_storage::{ObjectStore, RunStore, SessionStore};
use scp_workflow::WorkflowEngine;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub object_store: Arc<dyn ObjectStore>,
    pub session_store: Arc<SessionStore>,
    pub run_store: Arc<RunStore>,
    pub sandbox_factory: Arc<dyn SandboxFactory>,
    pub workflow_engine: Arc<dyn WorkflowEngine>,
    /// Shared outbound client for tunneling browser requests into the
    /// sandbox's own web server (`session_routes`'s reverse-proxy fallback).
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        object_store: Arc<dyn ObjectStore>,
        sandbox_factory: Arc<dyn SandboxFactory>,
        agent_factory: Arc<dyn scp_sandbox::AgentBackendFactory>,
    ) -> Self {
        let session_store = Arc::new(SessionStore::new(object_store.clone()));
        let run_store = Arc::new(RunStore::new(object_store.clone()));
        let deps = Arc::new(scp_workflow::WorkflowDeps {
            object_store: object_store.clone(),
            session_store: session_store.clone(),
            run_store: run_store.clone(),
            sandbox_factory: sandbox_factory.clone(),
            agent_factory,
        });
        Self {
            config,
            object_store,
            session_store,
            run_store,
            sandbox_factory,
            workflow_engine: Arc::new(scp_workflow::LocalWorkflowEngine::new(deps)),
            http_client: reqwest::Client::new(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::AppState;
    use crate::config::{Config, LogFormat};
    use scp_sandbox::fake::{FakeAgentBackend, FakeAgentBackendFactory, FakeSandbox, FakeSandboxFactory};
    use scp_storage::{InMemoryObjectStore, ObjectStore, RunStore, SessionStore};
    use scp_workflow::{LocalWorkflowEngine, WorkflowDeps};
    use std::sync::Arc;
    use std::time::Duration;

    pub fn test_config() -> Config {
        Config {
            auth_token: "test-auth-token".to_string(),
            proxy_jwt_secret: "test-jwt-secret".to_string(),
            mount_path: "/proxy".to_string(),
            public_base_url: "https://control.example".to_string(),
            anthropic_api_key: Some("sk-test".to_string()),
            github_token: Some("gh-test".to_string()),
            sessions_bucket: "sessions".to_string(),
            default_model: "claude-sonnet-4-5".to_string(),
            sandbox_exec_timeout: Duration::from_secs(30),
            log_format: LogFormat::Pretty,
            sandbox_runtime_url: "http://localhost:7000".to_string(),
        }
    }

    /// A fully wired `AppState` over an in-memory object store and fake
    /// sandbox/agent collaborators, for router- and dispatcher-level tests.
    pub fn test_state() -> Arc<AppState> {
        test_state_with(FakeSandbox::new(), FakeAgentBackend::new())
    }

    pub fn test_state_with(sandbox: FakeSandbox, agent: FakeAgentBackend) -> Arc<AppState> {
        let object_store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let sandbox_factory = Arc::new(FakeSandboxFactory::new(sandbox));
        let session_store = Arc::new(SessionStore::new(object_store.clone()));
        let run_store = Arc::new(RunStore::new(object_store.clone()));
        let deps = Arc::new(WorkflowDeps {
            object_store: object_store.clone(),
            session_store: session_store.clone(),
            run_store: run_store.clone(),
            sandbox_factory: sandbox_factory.clone(),
            agent_factory: Arc::new(FakeAgentBackendFactory::new(agent)),
        });
        Arc::new(AppState {
            config: Arc::new(test_config()),
            object_store,
            session_store,
            run_store,
            sandbox_factory,
            workflow_engine: Arc::new(LocalWorkflowEngine::new(deps)),
            http_client: reqwest::Client::new(),
        })
    }
}
