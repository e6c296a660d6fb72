// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders for `Session`/`Run` records, available to other crates'
//! tests via the `test-support` feature.

use crate::ids::{RunId, SessionId};
use crate::run::{Run, RunStatus};
use crate::session::{Session, SessionConfig, SessionStatus};

pub struct SessionBuilder {
    session_id: String,
    status: SessionStatus,
    created_at: u64,
    last_activity: u64,
    workspace_path: String,
    web_ui_url: String,
    default_model: String,
    title: Option<String>,
    cloned_repos: Vec<String>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            session_id: "test-session".to_string(),
            status: SessionStatus::Active,
            created_at: 1_000,
            last_activity: 1_000,
            workspace_path: "/workspace".to_string(),
            web_ui_url: "https://host/session/test-session/".to_string(),
            default_model: "claude-sonnet-4-5".to_string(),
            title: None,
            cloned_repos: Vec::new(),
        }
    }
}

impl SessionBuilder {
    crate::setters! {
        into { session_id: String, workspace_path: String, web_ui_url: String, default_model: String }
        set { status: SessionStatus, created_at: u64, last_activity: u64 }
        option { title: String }
    }

    pub fn cloned_repos(mut self, repos: Vec<String>) -> Self {
        self.cloned_repos = repos;
        self
    }

    pub fn build(self) -> Session {
        Session {
            session_id: SessionId::parse(self.session_id).expect("valid test session id"),
            sandbox_id: String::new(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            status: self.status,
            workspace_path: self.workspace_path,
            web_ui_url: self.web_ui_url,
            repository: None,
            title: self.title,
            config: SessionConfig { default_model: self.default_model },
            opencode_session_id: None,
            cloned_repos: self.cloned_repos,
        }
        .with_sandbox_id_from_session_id()
    }
}

impl Session {
    fn with_sandbox_id_from_session_id(mut self) -> Self {
        self.sandbox_id = self.session_id.as_str().to_string();
        self
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }
}

pub struct RunBuilder {
    run_id: String,
    session_id: String,
    workflow_id: String,
    status: RunStatus,
    task: String,
    title: String,
    model: String,
    started_at: u64,
    completed_at: Option<u64>,
}

impl Default for RunBuilder {
    fn default() -> Self {
        Self {
            run_id: "run-00000000".to_string(),
            session_id: "test-session".to_string(),
            workflow_id: "run-00000000".to_string(),
            status: RunStatus::Started,
            task: "do the thing".to_string(),
            title: "Do the thing".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            started_at: 1_000,
            completed_at: None,
        }
    }
}

impl RunBuilder {
    crate::setters! {
        into { run_id: String, session_id: String, workflow_id: String, task: String, title: String, model: String }
        set { status: RunStatus, started_at: u64 }
        option { completed_at: u64 }
    }

    pub fn build(self) -> Run {
        Run {
            run_id: RunId::from_raw(self.run_id),
            session_id: SessionId::parse(self.session_id).expect("valid test session id"),
            workflow_id: self.workflow_id,
            status: self.status,
            task: self.task,
            title: self.title,
            model: self.model,
            started_at: self.started_at,
            completed_at: self.completed_at,
            result: None,
        }
    }
}

impl Run {
    pub fn builder() -> RunBuilder {
        RunBuilder::default()
    }
}
