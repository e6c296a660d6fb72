// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HttpSandboxAdapter` — production [`SandboxAdapter`] speaking a plain
//! JSON-over-HTTP contract to the external sandbox runtime. Grounded on
//! [`crate::agent::HttpAgentClient`]'s "thin `reqwest` client over an
//! opaque HTTP service" shape rather than the teacher's container-lifecycle
//! adapters (`daemon::adapters::agent::{docker,k8s}`) — provisioning and
//! scheduling the runtime itself is out of scope (spec §1 Non-goals), this
//! only implements the narrow exec/file/git/process contract the trait
//! already defines. Binary file payloads are base64-encoded on the wire per
//! [`crate::adapter`]'s doc comment.

use crate::adapter::{
    ExecOptions, ExecResult, ProcessHandle, SandboxAdapter, SandboxError, SandboxFactory,
    StartProcessOptions,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct HttpSandboxAdapter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSandboxAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }

    fn url(&self, sandbox_id: &str, suffix: &str) -> String {
        format!("{}/sandboxes/{}{}", self.base_url, sandbox_id, suffix)
    }
}

fn req_err(e: reqwest::Error) -> SandboxError {
    SandboxError::Exec(e.to_string())
}

#[derive(Serialize)]
struct ExecBody<'a> {
    command: &'a str,
    args: &'a [String],
    cwd: Option<&'a str>,
    #[serde(rename = "timeoutMs")]
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct ExecResponse {
    #[serde(rename = "exitCode")]
    exit_code: i32,
    stdout: String,
    stderr: String,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Serialize, Deserialize)]
struct FileBody {
    #[serde(rename = "contentsBase64")]
    contents_base64: String,
}

#[derive(Serialize)]
struct CloneBody<'a> {
    dest: &'a str,
    url: &'a str,
    branch: Option<&'a str>,
}

#[derive(Serialize)]
struct ConfigureProxyBody<'a> {
    #[serde(rename = "containerProxyUrl")]
    container_proxy_url: &'a str,
    #[serde(rename = "proxyToken")]
    proxy_token: &'a str,
    #[serde(rename = "userEmail")]
    user_email: &'a str,
    #[serde(rename = "userName")]
    user_name: &'a str,
}

#[derive(Serialize)]
struct StartProcessBody<'a> {
    command: &'a str,
    args: &'a [String],
    env: &'a [(String, String)],
    cwd: Option<&'a str>,
}

#[derive(Serialize, Deserialize)]
struct ProcessHandleBody {
    id: String,
    port: Option<u16>,
}

#[derive(Deserialize)]
struct ExposePortResponse {
    url: String,
}

impl From<ProcessHandleBody> for ProcessHandle {
    fn from(b: ProcessHandleBody) -> Self {
        ProcessHandle { id: b.id, port: b.port }
    }
}

#[async_trait]
impl SandboxAdapter for HttpSandboxAdapter {
    async fn exec(&self, sandbox_id: &str, opts: ExecOptions) -> Result<ExecResult, SandboxError> {
        let resp = self
            .client
            .post(self.url(sandbox_id, "/exec"))
            .json(&ExecBody {
                command: &opts.command,
                args: &opts.args,
                cwd: opts.cwd.as_deref(),
                timeout_ms: opts.timeout.as_millis() as u64,
            })
            .timeout(opts.timeout)
            .send()
            .await
            .map_err(req_err)?;
        let body: ExecResponse = resp.json().await.map_err(req_err)?;
        Ok(ExecResult { exit_code: body.exit_code, stdout: body.stdout, stderr: body.stderr })
    }

    async fn file_exists(&self, sandbox_id: &str, path: &str) -> Result<bool, SandboxError> {
        let resp = self
            .client
            .get(self.url(sandbox_id, "/files/exists"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(req_err)?;
        let body: ExistsResponse = resp.json().await.map_err(req_err)?;
        Ok(body.exists)
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<Option<Vec<u8>>, SandboxError> {
        let resp = self
            .client
            .get(self.url(sandbox_id, "/files"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(req_err)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: FileBody = resp.json().await.map_err(req_err)?;
        BASE64
            .decode(body.contents_base64)
            .map(Some)
            .map_err(|e| SandboxError::File(e.to_string()))
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, contents: &[u8]) -> Result<(), SandboxError> {
        self.client
            .put(self.url(sandbox_id, "/files"))
            .query(&[("path", path)])
            .json(&FileBody { contents_base64: BASE64.encode(contents) })
            .send()
            .await
            .map_err(req_err)?;
        Ok(())
    }

    async fn append_file(&self, sandbox_id: &str, path: &str, contents: &[u8]) -> Result<(), SandboxError> {
        self.client
            .post(self.url(sandbox_id, "/files/append"))
            .query(&[("path", path)])
            .json(&FileBody { contents_base64: BASE64.encode(contents) })
            .send()
            .await
            .map_err(req_err)?;
        Ok(())
    }

    async fn git_clone(
        &self,
        sandbox_id: &str,
        dest: &str,
        url: &str,
        branch: Option<&str>,
    ) -> Result<(), SandboxError> {
        self.client
            .post(self.url(sandbox_id, "/git/clone"))
            .json(&CloneBody { dest, url, branch })
            .send()
            .await
            .map_err(|e| SandboxError::Git(e.to_string()))?;
        Ok(())
    }

    async fn git_fetch(&self, sandbox_id: &str, dest: &str) -> Result<(), SandboxError> {
        self.client
            .post(self.url(sandbox_id, "/git/fetch"))
            .json(&serde_json::json!({ "dest": dest }))
            .send()
            .await
            .map_err(|e| SandboxError::Git(e.to_string()))?;
        Ok(())
    }

    async fn git_checkout(&self, sandbox_id: &str, dest: &str, branch: &str) -> Result<(), SandboxError> {
        self.client
            .post(self.url(sandbox_id, "/git/checkout"))
            .json(&serde_json::json!({ "dest": dest, "branch": branch }))
            .send()
            .await
            .map_err(|e| SandboxError::Git(e.to_string()))?;
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
        self.client
            .post(self.url(sandbox_id, "/git/configure-proxy"))
            .json(&ConfigureProxyBody { container_proxy_url, proxy_token, user_email, user_name })
            .send()
            .await
            .map_err(|e| SandboxError::Git(e.to_string()))?;
        Ok(())
    }

    async fn start_process(
        &self,
        sandbox_id: &str,
        opts: StartProcessOptions,
    ) -> Result<ProcessHandle, SandboxError> {
        let resp = self
            .client
            .post(self.url(sandbox_id, "/processes"))
            .json(&StartProcessBody {
                command: &opts.command,
                args: &opts.args,
                env: &opts.env,
                cwd: opts.cwd.as_deref(),
            })
            .send()
            .await
            .map_err(|e| SandboxError::Process(e.to_string()))?;
        let body: ProcessHandleBody = resp.json().await.map_err(|e| SandboxError::Process(e.to_string()))?;
        Ok(body.into())
    }

    async fn stop_process(&self, sandbox_id: &str, handle: &ProcessHandle) -> Result<(), SandboxError> {
        self.client
            .delete(self.url(sandbox_id, &format!("/processes/{}", handle.id)))
            .send()
            .await
            .map_err(|e| SandboxError::Process(e.to_string()))?;
        Ok(())
    }

    async fn list_processes(&self, sandbox_id: &str) -> Result<Vec<ProcessHandle>, SandboxError> {
        let resp = self
            .client
            .get(self.url(sandbox_id, "/processes"))
            .send()
            .await
            .map_err(|e| SandboxError::Process(e.to_string()))?;
        let body: Vec<ProcessHandleBody> =
            resp.json().await.map_err(|e| SandboxError::Process(e.to_string()))?;
        Ok(body.into_iter().map(Into::into).collect())
    }

    async fn process_logs(&self, sandbox_id: &str, handle: &ProcessHandle) -> Result<String, SandboxError> {
        self.client
            .get(self.url(sandbox_id, &format!("/processes/{}/logs", handle.id)))
            .send()
            .await
            .map_err(|e| SandboxError::Process(e.to_string()))?
            .text()
            .await
            .map_err(|e| SandboxError::Process(e.to_string()))
    }

    async fn expose_port(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError> {
        let resp = self
            .client
            .post(self.url(sandbox_id, &format!("/ports/{}/expose", port)))
            .send()
            .await
            .map_err(|e| SandboxError::Port(e.to_string()))?;
        let body: ExposePortResponse = resp.json().await.map_err(|e| SandboxError::Port(e.to_string()))?;
        Ok(body.url)
    }
}

/// Hands out one [`HttpSandboxAdapter`] instance per call, all sharing the
/// same runtime base URL — sandbox identity is carried in the path, not the
/// connection, so a single client is reused rather than one per sandbox.
pub struct HttpSandboxFactory {
    base_url: String,
}

impl HttpSandboxFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl SandboxFactory for HttpSandboxFactory {
    fn handle(&self, _sandbox_id: &str) -> Arc<dyn SandboxAdapter> {
        Arc::new(HttpSandboxAdapter::new(self.base_url.clone()))
    }
}
