// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AgentBackend` — thin HTTP client over the coding agent's opaque API
//! (spec §1, §4.3 component G). Grounded on the same "thin typed client
//! over an opaque HTTP service" shape the teacher uses for its coop/docker
//! agent adapters (`daemon::adapters::agent::{coop,docker}`); crate:
//! `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent request failed: {0}")]
    Request(String),
    #[error("agent returned an error: {0}")]
    Remote(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: String,
    pub directory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageParams<'a> {
    pub text: &'a str,
    pub provider_id: &'a str,
    pub model_id: &'a str,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentMessageResponse {
    #[serde(default)]
    pub parts: Vec<AgentPart>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: Option<AgentUsage>,
}

impl AgentMessageResponse {
    /// Concatenate all `text` parts joined by blank lines (spec §4.3 step 3).
    pub fn output_text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.part_type == "text")
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Speaks to the agent subprocess's opaque HTTP API on a known port inside
/// the sandbox (list sessions, create session, send message).
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn list_sessions(&self, directory: &str) -> Result<Vec<AgentSession>, AgentError>;

    async fn create_session(&self, directory: &str) -> Result<AgentSession, AgentError>;

    async fn send_message(
        &self,
        session_id: &str,
        params: SendMessageParams<'_>,
    ) -> Result<AgentMessageResponse, AgentError>;
}

/// The workflow obtains a fresh backend handle per step, same rationale as
/// [`crate::adapter::SandboxFactory`].
pub trait AgentBackendFactory: Send + Sync {
    fn handle(&self, base_url: &str) -> std::sync::Arc<dyn AgentBackend>;
}

/// Hands out an [`HttpAgentClient`] bound to whatever `base_url` the caller
/// resolved for this step (typically via `SandboxAdapter::expose_port`).
pub struct HttpAgentBackendFactory;

impl AgentBackendFactory for HttpAgentBackendFactory {
    fn handle(&self, base_url: &str) -> std::sync::Arc<dyn AgentBackend> {
        std::sync::Arc::new(HttpAgentClient::new(base_url))
    }
}

/// Production `AgentBackend`: a `reqwest` client against the agent's HTTP
/// API exposed at `base_url` (reached via [`crate::adapter::SandboxAdapter::expose_port`]).
pub struct HttpAgentClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl AgentBackend for HttpAgentClient {
    async fn list_sessions(&self, directory: &str) -> Result<Vec<AgentSession>, AgentError> {
        let resp = self
            .client
            .get(format!("{}/session", self.base_url))
            .query(&[("directory", directory)])
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;
        resp.json::<Vec<AgentSession>>().await.map_err(|e| AgentError::Request(e.to_string()))
    }

    async fn create_session(&self, directory: &str) -> Result<AgentSession, AgentError> {
        let resp = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&serde_json::json!({ "directory": directory }))
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;
        resp.json::<AgentSession>().await.map_err(|e| AgentError::Request(e.to_string()))
    }

    async fn send_message(
        &self,
        session_id: &str,
        params: SendMessageParams<'_>,
    ) -> Result<AgentMessageResponse, AgentError> {
        let resp = self
            .client
            .post(format!("{}/session/{}/message", self.base_url, session_id))
            .json(&serde_json::json!({
                "providerID": params.provider_id,
                "modelID": params.model_id,
                "parts": [{ "type": "text", "text": params.text }],
            }))
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;
        resp.json::<AgentMessageResponse>().await.map_err(|e| AgentError::Request(e.to_string()))
    }
}
