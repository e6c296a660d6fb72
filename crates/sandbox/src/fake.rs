// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for [`SandboxAdapter`]/[`AgentBackend`], available to
//! other crates' tests via the `test-support` feature. Grounded on the
//! teacher's own test-only `FakeAgentAdapter`
//! (`daemon/src/adapters/agent/fake.rs`): an in-memory double scripted by
//! the test rather than a mock framework.

use crate::adapter::{
    ExecOptions, ExecResult, ProcessHandle, SandboxAdapter, SandboxError, SandboxFactory,
    StartProcessOptions,
};
use crate::agent::{
    AgentBackend, AgentBackendFactory, AgentError, AgentMessageResponse, AgentSession,
    SendMessageParams,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct SandboxFs {
    files: BTreeMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    processes: Vec<ProcessHandle>,
    next_port: u16,
}

/// In-memory sandbox double: a per-`sandbox_id` virtual filesystem plus
/// scripted handling for the handful of shell commands the workflow
/// actually issues (`tar`, `mkdir`, `rm`, `git config`).
#[derive(Clone, Default)]
pub struct FakeSandbox {
    sandboxes: Arc<Mutex<HashMap<String, SandboxFs>>>,
    pub exec_log: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_fs<T>(&self, sandbox_id: &str, f: impl FnOnce(&mut SandboxFs) -> T) -> T {
        let mut guard = self.sandboxes.lock();
        let fs = guard.entry(sandbox_id.to_string()).or_insert_with(|| SandboxFs {
            next_port: 20_000,
            ..Default::default()
        });
        f(fs)
    }

    fn normalize(parent: &str, name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else if parent.ends_with('/') {
            format!("{parent}{name}")
        } else {
            format!("{parent}/{name}")
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ArchiveEntry {
    path: String,
    data: String,
}

#[async_trait]
impl SandboxAdapter for FakeSandbox {
    async fn exec(&self, sandbox_id: &str, opts: ExecOptions) -> Result<ExecResult, SandboxError> {
        self.exec_log.lock().push((sandbox_id.to_string(), opts.command.clone()));
        let cwd = opts.cwd.clone().unwrap_or_else(|| "/".to_string());

        match opts.command.as_str() {
            "mkdir" => {
                if let Some(path) = opts.args.last() {
                    self.with_fs(sandbox_id, |fs| {
                        fs.dirs.insert(path.clone());
                    });
                }
                Ok(ExecResult { exit_code: 0, stdout: String::new(), stderr: String::new() })
            }
            "rm" => {
                if let Some(path) = opts.args.last() {
                    self.with_fs(sandbox_id, |fs| {
                        fs.files.remove(path);
                    });
                }
                Ok(ExecResult { exit_code: 0, stdout: String::new(), stderr: String::new() })
            }
            "tar" if opts.args.first().map(String::as_str) == Some("-czf") => {
                let out_path = opts.args.get(1).cloned().unwrap_or_default();
                let leaf = opts.args.get(2).cloned().unwrap_or_default();
                let source_dir = Self::normalize(&cwd, &leaf);
                let base = cwd.trim_end_matches('/').to_string();
                let entries: Vec<ArchiveEntry> = self.with_fs(sandbox_id, |fs| {
                    fs.files
                        .iter()
                        .filter(|(path, _)| path.starts_with(&format!("{source_dir}/")))
                        .map(|(path, data)| ArchiveEntry {
                            // tar stores paths relative to `cwd`, so the leaf
                            // directory name is preserved in the archive.
                            path: path[base.len() + 1..].to_string(),
                            data: BASE64.encode(data),
                        })
                        .collect()
                });
                let body = serde_json::to_vec(&entries).map_err(|e| SandboxError::Exec(e.to_string()))?;
                self.with_fs(sandbox_id, |fs| {
                    fs.files.insert(out_path, body);
                });
                Ok(ExecResult { exit_code: 0, stdout: String::new(), stderr: String::new() })
            }
            "tar" if opts.args.first().map(String::as_str) == Some("-xzf") => {
                let in_path = opts.args.get(1).cloned().unwrap_or_default();
                let dest = opts
                    .args
                    .iter()
                    .position(|a| a == "-C")
                    .and_then(|i| opts.args.get(i + 1))
                    .cloned()
                    .unwrap_or_else(|| ".".to_string());
                let body = self.with_fs(sandbox_id, |fs| fs.files.get(&in_path).cloned());
                let Some(body) = body else {
                    return Err(SandboxError::Exec(format!("archive {in_path:?} not found")));
                };
                let entries: Vec<ArchiveEntry> =
                    serde_json::from_slice(&body).map_err(|e| SandboxError::Exec(e.to_string()))?;
                self.with_fs(sandbox_id, |fs| {
                    for entry in entries {
                        let data = BASE64.decode(entry.data).unwrap_or_default();
                        let full = Self::normalize(&dest, &entry.path);
                        fs.files.insert(full, data);
                    }
                });
                Ok(ExecResult { exit_code: 0, stdout: String::new(), stderr: String::new() })
            }
            other => Ok(ExecResult {
                exit_code: 0,
                stdout: format!("ok: {other}"),
                stderr: String::new(),
            }),
        }
    }

    async fn file_exists(&self, sandbox_id: &str, path: &str) -> Result<bool, SandboxError> {
        Ok(self.with_fs(sandbox_id, |fs| {
            fs.files.contains_key(path)
                || fs.dirs.contains(path)
                || fs.files.keys().any(|k| k.starts_with(&format!("{path}/")))
        }))
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<Option<Vec<u8>>, SandboxError> {
        Ok(self.with_fs(sandbox_id, |fs| fs.files.get(path).cloned()))
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, contents: &[u8]) -> Result<(), SandboxError> {
        self.with_fs(sandbox_id, |fs| {
            fs.files.insert(path.to_string(), contents.to_vec());
        });
        Ok(())
    }

    async fn append_file(&self, sandbox_id: &str, path: &str, contents: &[u8]) -> Result<(), SandboxError> {
        self.with_fs(sandbox_id, |fs| {
            fs.files.entry(path.to_string()).or_default().extend_from_slice(contents);
        });
        Ok(())
    }

    async fn git_clone(
        &self,
        sandbox_id: &str,
        dest: &str,
        url: &str,
        branch: Option<&str>,
    ) -> Result<(), SandboxError> {
        let marker = format!("{dest}/.git/HEAD");
        let contents = format!("cloned {url} ({})", branch.unwrap_or("default"));
        self.write_file(sandbox_id, &marker, contents.as_bytes()).await
    }

    async fn git_fetch(&self, sandbox_id: &str, dest: &str) -> Result<(), SandboxError> {
        self.exec_log.lock().push((sandbox_id.to_string(), format!("git fetch {dest}")));
        Ok(())
    }

    async fn git_checkout(&self, sandbox_id: &str, dest: &str, branch: &str) -> Result<(), SandboxError> {
        self.exec_log
            .lock()
            .push((sandbox_id.to_string(), format!("git checkout {dest} {branch}")));
        Ok(())
    }

    async fn git_configure_proxy(
        &self,
        sandbox_id: &str,
        container_proxy_url: &str,
        proxy_token: &str,
        user_email: &str,
        user_name: &str,
    ) -> Result<(), SandboxError> {
        let marker = "/root/.gitconfig".to_string();
        let contents = format!(
            "url.{container_proxy_url}/github/.insteadOf=https://github.com/\nextraheader=Bearer {proxy_token}\nemail={user_email}\nname={user_name}\n"
        );
        self.write_file(sandbox_id, &marker, contents.as_bytes()).await
    }

    async fn start_process(
        &self,
        sandbox_id: &str,
        opts: StartProcessOptions,
    ) -> Result<ProcessHandle, SandboxError> {
        let port = self.with_fs(sandbox_id, |fs| {
            let p = fs.next_port;
            fs.next_port += 1;
            p
        });
        let handle = ProcessHandle { id: format!("proc-{sandbox_id}-{port}"), port: Some(port) };
        self.with_fs(sandbox_id, |fs| fs.processes.push(handle.clone()));
        self.exec_log.lock().push((sandbox_id.to_string(), format!("start {}", opts.command)));
        Ok(handle)
    }

    async fn stop_process(&self, sandbox_id: &str, handle: &ProcessHandle) -> Result<(), SandboxError> {
        self.with_fs(sandbox_id, |fs| fs.processes.retain(|p| p.id != handle.id));
        Ok(())
    }

    async fn list_processes(&self, sandbox_id: &str) -> Result<Vec<ProcessHandle>, SandboxError> {
        Ok(self.with_fs(sandbox_id, |fs| fs.processes.clone()))
    }

    async fn process_logs(&self, _sandbox_id: &str, handle: &ProcessHandle) -> Result<String, SandboxError> {
        Ok(format!("logs for {}", handle.id))
    }

    async fn expose_port(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError> {
        Ok(format!("http://{sandbox_id}.sandbox.local:{port}"))
    }
}

/// Always returns the same shared [`FakeSandbox`], simulating "a fresh
/// handle per step" without actually reconnecting anything (spec §4.3
/// step 2's carry-no-handle-across-steps rule is about remote stubs, which
/// a fake has none of).
#[derive(Clone, Default)]
pub struct FakeSandboxFactory {
    sandbox: FakeSandbox,
}

impl FakeSandboxFactory {
    pub fn new(sandbox: FakeSandbox) -> Self {
        Self { sandbox }
    }
}

impl SandboxFactory for FakeSandboxFactory {
    fn handle(&self, _sandbox_id: &str) -> Arc<dyn SandboxAdapter> {
        Arc::new(self.sandbox.clone())
    }
}

#[derive(Default)]
struct AgentFixture {
    sessions: Vec<AgentSession>,
    next_id: u32,
    /// Scripted response for the next `send_message` call, keyed by session id.
    scripted: HashMap<String, AgentMessageResponse>,
}

/// Scripted in-memory double for [`AgentBackend`]. Tests call
/// [`FakeAgentBackend::script_response`] to control what `execute-task`
/// observes.
#[derive(Clone, Default)]
pub struct FakeAgentBackend {
    state: Arc<Mutex<AgentFixture>>,
}

impl FakeAgentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_response(&self, session_id: &str, response: AgentMessageResponse) {
        self.state.lock().scripted.insert(session_id.to_string(), response);
    }

    pub fn script_default_response(&self, response: AgentMessageResponse) {
        self.state.lock().scripted.insert("*".to_string(), response);
    }
}

#[async_trait]
impl AgentBackend for FakeAgentBackend {
    async fn list_sessions(&self, directory: &str) -> Result<Vec<AgentSession>, AgentError> {
        Ok(self
            .state
            .lock()
            .sessions
            .iter()
            .filter(|s| s.directory == directory)
            .cloned()
            .collect())
    }

    async fn create_session(&self, directory: &str) -> Result<AgentSession, AgentError> {
        let mut guard = self.state.lock();
        guard.next_id += 1;
        let session = AgentSession { id: format!("agent-session-{}", guard.next_id), directory: directory.to_string() };
        guard.sessions.push(session.clone());
        Ok(session)
    }

    async fn send_message(
        &self,
        session_id: &str,
        _params: SendMessageParams<'_>,
    ) -> Result<AgentMessageResponse, AgentError> {
        let guard = self.state.lock();
        if let Some(resp) = guard.scripted.get(session_id) {
            return Ok(resp.clone());
        }
        if let Some(resp) = guard.scripted.get("*") {
            return Ok(resp.clone());
        }
        Ok(AgentMessageResponse::default())
    }
}

/// Always returns the same shared [`FakeAgentBackend`] regardless of
/// `base_url`, mirroring [`FakeSandboxFactory`].
#[derive(Clone, Default)]
pub struct FakeAgentBackendFactory {
    backend: FakeAgentBackend,
}

impl FakeAgentBackendFactory {
    pub fn new(backend: FakeAgentBackend) -> Self {
        Self { backend }
    }
}

impl AgentBackendFactory for FakeAgentBackendFactory {
    fn handle(&self, _base_url: &str) -> Arc<dyn AgentBackend> {
        Arc::new(self.backend.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let sandbox = FakeSandbox::new();
        sandbox.write_file("sb-1", "/workspace/.env", b"A=1").await.unwrap();
        let got = sandbox.read_file("sb-1", "/workspace/.env").await.unwrap();
        assert_eq!(got, Some(b"A=1".to_vec()));
    }

    #[tokio::test]
    async fn append_file_extends_existing_contents() {
        let sandbox = FakeSandbox::new();
        sandbox.write_file("sb-1", "/workspace/.env", b"A=1\n").await.unwrap();
        sandbox.append_file("sb-1", "/workspace/.env", b"B=2\n").await.unwrap();
        let got = sandbox.read_file("sb-1", "/workspace/.env").await.unwrap().unwrap();
        assert_eq!(got, b"A=1\nB=2\n");
    }

    #[tokio::test]
    async fn git_clone_creates_git_marker_so_second_call_can_detect_it() {
        let sandbox = FakeSandbox::new();
        assert!(!sandbox.file_exists("sb-1", "/workspace/repo/.git").await.unwrap());
        sandbox.git_clone("sb-1", "/workspace/repo", "https://github.com/a/b", None).await.unwrap();
        assert!(sandbox.file_exists("sb-1", "/workspace/repo/.git").await.unwrap());
    }

    #[tokio::test]
    async fn agent_backend_reuses_scripted_response() {
        let agent = FakeAgentBackend::new();
        agent.script_response(
            "s1",
            AgentMessageResponse {
                parts: vec![crate::agent::AgentPart { part_type: "text".into(), text: Some("hi".into()) }],
                error: None,
                usage: None,
            },
        );
        let resp = agent
            .send_message("s1", SendMessageParams { text: "go", provider_id: "anthropic", model_id: "m" })
            .await
            .unwrap();
        assert_eq!(resp.output_text(), "hi");
    }
}
