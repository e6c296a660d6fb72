// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wide-event telemetry (spec §4.4/§6): one `tool.call` event per tool
//! invocation, one `workflow` event per workflow run, newline-delimited
//! JSON on stdout. Kept separate from the ambient `tracing` output the
//! rest of the daemon emits, and synchronous (spec §5: "telemetry emission
//! is synchronous to standard output and does not suspend") — a plain
//! `println!` rather than a queued writer or a `tracing_subscriber` layer.

use serde::Serialize;
use std::collections::BTreeMap;

const SERVICE: &str = "sandbox-mcp";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// One `tool.call` event (spec §6). `phases` times the named sub-steps the
/// dispatcher passes through: `validate`, `storage`, `token`, `workflow`.
#[derive(Debug, Serialize)]
pub struct ToolCallEvent {
    pub timestamp: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub tool: String,
    pub service: &'static str,
    pub version: &'static str,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub phases: BTreeMap<String, u64>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ToolCallEvent {
    pub fn success(request_id: impl Into<String>, tool: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            timestamp: now_rfc3339(),
            request_id: request_id.into(),
            tool: tool.into(),
            service: SERVICE,
            version: VERSION,
            duration_ms,
            phases: BTreeMap::new(),
            outcome: "success",
            error: None,
            metadata: None,
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        tool: impl Into<String>,
        duration_ms: u64,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            request_id: request_id.into(),
            tool: tool.into(),
            service: SERVICE,
            version: VERSION,
            duration_ms,
            phases: BTreeMap::new(),
            outcome: "error",
            error: Some(ErrorDetail { code: code.into(), message: message.into() }),
            metadata: None,
        }
    }

    pub fn phase(mut self, name: &str, duration_ms: u64) -> Self {
        self.phases.insert(name.to_string(), duration_ms);
        self
    }

    pub fn metadata(mut self, value: serde_json::Value) -> Self {
        self.metadata = Some(value);
        self
    }

    pub fn emit(&self) {
        emit(self);
    }
}

/// One `workflow` event (spec §6), emitted after `run_task_workflow`
/// finishes — success or failure of the individual execution, not of the
/// dispatch call that submitted it.
#[derive(Debug, Serialize)]
pub struct WorkflowEvent {
    pub timestamp: String,
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub service: &'static str,
    pub version: &'static str,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl WorkflowEvent {
    pub fn new(
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        session_id: impl Into<String>,
        duration_ms: u64,
        success: bool,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            session_id: session_id.into(),
            service: SERVICE,
            version: VERSION,
            duration_ms,
            outcome: if success { "success" } else { "error" },
            error: error.map(|message| serde_json::json!({ "phase": "execute-task", "message": message })),
            metadata: None,
        }
    }

    pub fn emit(&self) {
        emit(self);
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn emit<T: Serialize>(event: &T) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to serialize telemetry event"),
    }
}
