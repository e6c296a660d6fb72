// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scp-sandbox: the Sandbox Adapter (F), Agent I/O (G) and backup/restore
//! byte-plumbing (H) collaborators (spec §4.3). The sandbox runtime and the
//! coding-agent subprocess are both external, opaque collaborators per
//! spec §1 — this crate only defines the seams the workflow calls through
//! and, behind `test-support`, the fakes the workflow's own tests drive.

pub mod adapter;
pub mod agent;
pub mod backup;
pub mod http_adapter;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use adapter::{
    ExecOptions, ExecResult, ProcessHandle, SandboxAdapter, SandboxError, SandboxFactory,
    StartProcessOptions,
};
pub use agent::{
    AgentBackend, AgentBackendFactory, AgentError, AgentMessageResponse, AgentSession,
    HttpAgentBackendFactory, HttpAgentClient, SendMessageParams,
};
pub use http_adapter::{HttpSandboxAdapter, HttpSandboxFactory};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentBackend, FakeAgentBackendFactory, FakeSandbox, FakeSandboxFactory};
