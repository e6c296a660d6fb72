// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record — a logical user workspace: one sandbox identity, an
//! optional repository, and accumulated coding-agent state.

use crate::ids::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Creating,
    Active,
    Idle,
    Stopped,
    Error,
}

crate::simple_display! {
    SessionStatus {
        Creating => "creating",
        Active => "active",
        Idle => "idle",
        Stopped => "stopped",
        Error => "error",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Must start with `https://github.com/`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub default_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    /// Equal to `session_id` in this design.
    pub sandbox_id: String,
    pub created_at: u64,
    pub last_activity: u64,
    pub status: SessionStatus,
    pub workspace_path: String,
    pub web_ui_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub config: SessionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opencode_session_id: Option<String>,
    /// Ordered, duplicate-free list of repo URLs ever cloned into this
    /// sandbox (invariant 4: a set, repeat clones are no-ops).
    #[serde(default)]
    pub cloned_repos: Vec<String>,
}

impl Session {
    pub const DEFAULT_WORKSPACE_PATH: &'static str = "/workspace";

    /// Construct a freshly created session with spec-mandated defaults.
    pub fn new_active(
        session_id: SessionId,
        base_url: &str,
        default_model: impl Into<String>,
        now_ms: u64,
        repository: Option<Repository>,
    ) -> Self {
        let web_ui_url = format!("{base_url}/session/{session_id}/");
        let cloned_repos = repository
            .as_ref()
            .map(|r| vec![r.url.clone()])
            .unwrap_or_default();
        Self {
            sandbox_id: session_id.as_str().to_string(),
            session_id,
            created_at: now_ms,
            last_activity: now_ms,
            status: SessionStatus::Active,
            workspace_path: Self::DEFAULT_WORKSPACE_PATH.to_string(),
            web_ui_url,
            repository,
            title: None,
            config: SessionConfig {
                default_model: default_model.into(),
            },
            opencode_session_id: None,
            cloned_repos,
        }
    }

    /// Record a clone of `url` if not already present. Invariant 4: a set.
    pub fn record_clone(&mut self, url: &str) {
        if !self.cloned_repos.iter().any(|r| r == url) {
            self.cloned_repos.push(url.to_string());
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity = now_ms;
    }
}
