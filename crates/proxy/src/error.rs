// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ProxyError` — wraps `scp_core::CoreError` with an `IntoResponse` impl
//! that renders the exact `{error, code}` JSON envelope and HTTP status
//! from spec §4.1/§6, so axum handlers can `?`-propagate it directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scp_core::{CoreError, ProxyErrorCode};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ProxyError(pub CoreError);

impl ProxyError {
    pub fn new(code: ProxyErrorCode, message: impl Into<String>) -> Self {
        Self(CoreError::Proxy { code, message: message.into() })
    }
}

#[derive(Serialize)]
struct ProxyErrorBody {
    error: String,
    code: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            CoreError::Proxy { code, message } => (
                StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                code.code().to_string(),
                message.clone(),
            ),
            other => (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN_ERROR".to_string(), other.to_string()),
        };
        (status, Json(ProxyErrorBody { error: message, code })).into_response()
    }
}

impl From<ProxyErrorCode> for ProxyError {
    fn from(code: ProxyErrorCode) -> Self {
        Self::new(code, code.code())
    }
}
