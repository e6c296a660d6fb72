// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed error taxonomy (spec §7) shared across crates. Grounded on the
//! teacher's `ExecuteError` (`crates/engine/src/executor.rs`): one
//! `thiserror` enum aggregating adapter failures via `#[from]`, so call
//! sites never thread raw third-party error types through.

use serde::Serialize;

/// The proxy's own small, HTTP-status-bearing error codes (spec §4.1/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProxyErrorCode {
    PathInvalid,
    ServiceNotFound,
    TokenMissing,
    TokenExpired,
    TokenInvalid,
    TargetError,
    CredentialMissing,
}

impl ProxyErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            ProxyErrorCode::PathInvalid => "PROXY_PATH_INVALID",
            ProxyErrorCode::ServiceNotFound => "PROXY_SERVICE_NOT_FOUND",
            ProxyErrorCode::TokenMissing => "PROXY_TOKEN_MISSING",
            ProxyErrorCode::TokenExpired => "PROXY_TOKEN_EXPIRED",
            ProxyErrorCode::TokenInvalid => "PROXY_TOKEN_INVALID",
            ProxyErrorCode::TargetError => "PROXY_TARGET_ERROR",
            ProxyErrorCode::CredentialMissing => "PROXY_CREDENTIAL_MISSING",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            ProxyErrorCode::PathInvalid => 400,
            ProxyErrorCode::ServiceNotFound => 404,
            ProxyErrorCode::TokenMissing
            | ProxyErrorCode::TokenExpired
            | ProxyErrorCode::TokenInvalid => 401,
            ProxyErrorCode::TargetError => 502,
            ProxyErrorCode::CredentialMissing => 500,
        }
    }
}

impl std::fmt::Display for ProxyErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// The single error type tool handlers and storage operations return.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("Session \"{0}\" not found")]
    SessionNotFound(String),

    #[error("run \"{0}\" not found")]
    RunNotFound(String),

    #[error("storage read error: {0}")]
    StorageRead(String),

    #[error("storage write error: {0}")]
    StorageWrite(String),

    #[error("proxy error [{code}]: {message}")]
    Proxy { code: ProxyErrorCode, message: String },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("sandbox adapter error: {0}")]
    SandboxAdapter(String),
}

impl CoreError {
    /// Tag used in the `{code, message}` envelope tool handlers emit.
    pub fn code(&self) -> String {
        match self {
            CoreError::Validation(_) => "ValidationError".to_string(),
            CoreError::SessionNotFound(_) => "SessionNotFoundError".to_string(),
            CoreError::RunNotFound(_) => "RunNotFoundError".to_string(),
            CoreError::StorageRead(_) => "StorageReadError".to_string(),
            CoreError::StorageWrite(_) => "StorageWriteError".to_string(),
            CoreError::Proxy { code, .. } => code.code().to_string(),
            CoreError::Upstream(_) => "UpstreamError".to_string(),
            CoreError::SandboxAdapter(_) => "SandboxAdapterError".to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::StorageRead(e.to_string())
    }
}

/// `{code, message}` — the shape tool handlers serialize domain errors as.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
}

impl From<&CoreError> for ErrorEnvelope {
    fn from(e: &CoreError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}
