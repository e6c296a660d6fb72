// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SandboxAdapter` — the external sandbox runtime collaborator (spec §1,
//! component F). Grounded on `daemon/src/adapters/agent/docker/mod.rs` and
//! `daemon/src/adapters/agent/k8s/mod.rs`: a trait-based external-compute
//! backend with exec, file I/O, git, process lifecycle and port exposure,
//! generalized from the teacher's agent-container-specific surface to the
//! spec's broader per-sandbox `exec`/stream-files/git-checkout/expose-port
//! contract (spec §9 Open Questions: this is the seam the broader
//! direct-sandbox tool surface would hang off of, not implemented here).
//!
//! A real deployment's transport is often text-only (exec over an RPC
//! channel); base64-chunking binary payloads through `exec` for files over
//! ~100KB (spec §4.3 step 2) is such an adapter's internal concern, not
//! part of this trait — callers always deal in plain `Vec<u8>`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox {0:?} not found")]
    NotFound(String),
    #[error("exec failed: {0}")]
    Exec(String),
    #[error("file operation failed: {0}")]
    File(String),
    #[error("git operation failed: {0}")]
    Git(String),
    #[error("process operation failed: {0}")]
    Process(String),
    #[error("port expose failed: {0}")]
    Port(String),
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    /// Defaults to 30s per spec §5 (sandbox `exec` calls carry a default
    /// 30-second timeout unless overridden).
    pub timeout: Duration,
}

impl ExecOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone)]
pub struct StartProcessOptions {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<String>,
}

/// Handle to a process started in a sandbox. Background-process starts
/// never time out from the core's side (spec §5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub id: String,
    pub port: Option<u16>,
}

/// Thin client to the external sandbox runtime (spec GLOSSARY "Sandbox").
/// Every method suspends at I/O (spec §5 suspension points).
#[async_trait]
pub trait SandboxAdapter: Send + Sync {
    async fn exec(&self, sandbox_id: &str, opts: ExecOptions) -> Result<ExecResult, SandboxError>;

    async fn file_exists(&self, sandbox_id: &str, path: &str) -> Result<bool, SandboxError>;

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<Option<Vec<u8>>, SandboxError>;

    async fn write_file(&self, sandbox_id: &str, path: &str, contents: &[u8]) -> Result<(), SandboxError>;

    async fn append_file(&self, sandbox_id: &str, path: &str, contents: &[u8]) -> Result<(), SandboxError>;

    /// Clone is idempotent — see `ensureSandboxReady` (spec §4.3 step 2):
    /// a caller checks `{dest}/.git` first and skips this call if present.
    async fn git_clone(
        &self,
        sandbox_id: &str,
        dest: &str,
        url: &str,
        branch: Option<&str>,
    ) -> Result<(), SandboxError>;

    async fn git_fetch(&self, sandbox_id: &str, dest: &str) -> Result<(), SandboxError>;

    async fn git_checkout(&self, sandbox_id: &str, dest: &str, branch: &str) -> Result<(), SandboxError>;

    /// Global git config rewrite + extraheader auth, scoped to this
    /// sandbox (spec §4.3 step 2).
    async fn git_configure_proxy(
        &self,
        sandbox_id: &str,
        container_proxy_url: &str,
        proxy_token: &str,
        user_email: &str,
        user_name: &str,
    ) -> Result<(), SandboxError>;

    async fn start_process(
        &self,
        sandbox_id: &str,
        opts: StartProcessOptions,
    ) -> Result<ProcessHandle, SandboxError>;

    async fn stop_process(&self, sandbox_id: &str, handle: &ProcessHandle) -> Result<(), SandboxError>;

    async fn list_processes(&self, sandbox_id: &str) -> Result<Vec<ProcessHandle>, SandboxError>;

    async fn process_logs(&self, sandbox_id: &str, handle: &ProcessHandle) -> Result<String, SandboxError>;

    /// Returns a URL the control plane can reach the exposed port at.
    async fn expose_port(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError>;
}

/// The workflow engine obtains a fresh handle per step rather than
/// carrying one across step boundaries, since a remote stub cannot be
/// serialized into memoized step state (spec §4.3 step 2).
pub trait SandboxFactory: Send + Sync {
    fn handle(&self, sandbox_id: &str) -> std::sync::Arc<dyn SandboxAdapter>;
}
