// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-facing session routes (spec §6): `GET /session/{id}` issues the
//! entry redirect and sets the session cookie; any other path carrying that
//! cookie is reverse-proxied straight into the sandbox's web server; any
//! other path without it gets an informational JSON index.
//!
//! The sandbox's own web server (`opencode serve`) is assumed kept running
//! by the sandbox runtime itself for the session's lifetime — process
//! supervision of that server is out of scope here, the same boundary
//! `execute-task`'s short-lived task subprocess draws around itself. This
//! module only needs the conventional port it listens on.

use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use scp_core::SessionId;
use std::sync::Arc;

pub const SESSION_COOKIE_NAME: &str = "opencode_session_id";
const SANDBOX_WEB_UI_PORT: u16 = 4096;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn origin_of(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// `GET /session/{id}` (spec §6).
pub async fn entry(State(state): State<Arc<AppState>>, Path(raw_session_id): Path<String>) -> Response {
    let Ok(session_id) = SessionId::parse(raw_session_id.clone()) else {
        return not_found(&raw_session_id);
    };

    let session = match state.session_store.get_session(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return not_found(&raw_session_id),
        Err(e) => return internal_error(&e.to_string()),
    };

    let encoded_workspace = BASE64.encode(session.workspace_path.as_bytes());
    let origin = origin_of(&state.config.public_base_url);
    let mut location = format!("/{encoded_workspace}/session");
    if let Some(opencode_id) = &session.opencode_session_id {
        location.push('/');
        location.push_str(opencode_id);
    }
    location.push_str(&format!("?url={origin}"));

    let cookie = format!("{SESSION_COOKIE_NAME}={}; Path=/; SameSite=Lax", session.session_id);

    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::LOCATION, HeaderValue::from_str(&location).unwrap_or(HeaderValue::from_static("/")));
    headers.insert(axum::http::header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap_or(HeaderValue::from_static("")));

    (StatusCode::FOUND, headers).into_response()
}

/// Catch-all for browser requests once the session cookie is set: tunnels
/// straight to the sandbox's web server (spec §6: "method/headers/body
/// preserved; URL rewritten to the sandbox-local path; response body/
/// status/headers passed through").
pub async fn tunnel_or_index(
    State(state): State<Arc<AppState>>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(session_id) = cookie_session_id(&headers) else {
        return index();
    };
    let Ok(session_id) = SessionId::parse(session_id) else {
        return index();
    };

    let session = match state.session_store.get_session(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return index(),
        Err(e) => return internal_error(&e.to_string()),
    };

    let adapter = state.sandbox_factory.handle(&session.sandbox_id);
    let base_url = match adapter.expose_port(&session.sandbox_id, SANDBOX_WEB_UI_PORT).await {
        Ok(url) => url,
        Err(e) => return internal_error(&e.to_string()),
    };

    let target = format!("{}{}", base_url.trim_end_matches('/'), uri.path_and_query().map_or("", |pq| pq.as_str()));

    let mut request = state.http_client.request(method, &target);
    for (name, value) in headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        request = request.header(name, value);
    }
    request = request.body(body);

    let upstream = match request.send().await {
        Ok(resp) => resp,
        Err(e) => return internal_error(&e.to_string()),
    };

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
            response_headers.insert(name, value.clone());
        }
    }
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => return internal_error(&e.to_string()),
    };

    (status, response_headers, body).into_response()
}

fn cookie_session_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE_NAME).then(|| value.to_string())
    })
}

fn not_found(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": format!("session {session_id:?} not found") })),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

/// Default path without a session cookie: informational JSON (spec §6).
pub fn index() -> Response {
    axum::Json(serde_json::json!({
        "service": "sandbox-mcp",
        "endpoints": {
            "health": "/health",
            "mcp": "/mcp",
            "proxy": "/proxy/{service}/...",
            "session": "/session/{id}",
        },
    }))
    .into_response()
}
