// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run record — one task execution against a session, owned end-to-end by
//! the workflow (never created or completed by the dispatcher directly).

use crate::ids::{RunId, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Running,
    Completed,
    Failed,
}

crate::simple_display! {
    RunStatus {
        Started => "started",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

impl RunStatus {
    /// Invariant 5: only `Completed`/`Failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub workflow_id: String,
    pub status: RunStatus,
    pub task: String,
    pub title: String,
    pub model: String,
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
}

impl Run {
    pub fn new_started(
        run_id: RunId,
        session_id: SessionId,
        workflow_id: impl Into<String>,
        task: impl Into<String>,
        title: impl Into<String>,
        model: impl Into<String>,
        started_at: u64,
    ) -> Self {
        Self {
            run_id,
            session_id,
            workflow_id: workflow_id.into(),
            status: RunStatus::Started,
            task: task.into(),
            title: title.into(),
            model: model.into(),
            started_at,
            completed_at: None,
            result: None,
        }
    }
}
