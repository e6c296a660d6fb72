// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The proxy's axum router implementing the 8-step request pipeline (spec
//! §4.1). Grounded on `openSVM-larp/sidecar/src/auth/mod.rs` for the
//! axum-router-returning-`Router` shape; forwarding uses `reqwest`, the
//! pack's only example wiring an outbound HTTP client alongside axum.

use crate::error::ProxyError;
use crate::host_rewrite::rewrite_for_sandbox;
use crate::path::{build_target_url, parse_proxy_path};
use crate::registry::{ForwardRequest, ProxyContext, ServiceRegistry};
use crate::token_service;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use scp_core::ProxyErrorCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct ProxyEngine {
    pub registry: ServiceRegistry,
    pub jwt_secret: String,
    pub mount_path: String,
    pub client: reqwest::Client,
}

impl ProxyEngine {
    pub fn router(self) -> Router {
        let mount = normalize_mount(&self.mount_path);
        let state = Arc::new(self);
        let pattern = format!("{}/*rest", mount.trim_end_matches('/'));
        Router::new().route(&pattern, any(handle)).with_state(state)
    }
}

fn normalize_mount(mount_path: &str) -> String {
    let trimmed = mount_path.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
}

fn now_epoch_s() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

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

async fn handle(
    State(state): State<Arc<ProxyEngine>>,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    // Step 1: parse path.
    let parsed = parse_proxy_path(&state.mount_path, uri.path())
        .map_err(|_| ProxyError::new(ProxyErrorCode::PathInvalid, "invalid proxy path"))?;

    // Step 1 (cont'd): resolve service.
    let service = state.registry.resolve(&parsed.service).ok_or_else(|| {
        ProxyError::new(
            ProxyErrorCode::ServiceNotFound,
            format!(
                "unknown proxy service {:?}; available: {}",
                parsed.service,
                state.registry.names().join(", ")
            ),
        )
    })?;

    // Step 2: extract token.
    let token = service
        .validate(&headers)
        .ok_or_else(|| ProxyError::new(ProxyErrorCode::TokenMissing, "missing proxy token"))?;

    // Step 3: verify token.
    token_service::verify(&state.jwt_secret, &token, now_epoch_s()).map_err(|e| match e {
        token_service::TokenVerifyError::Expired => {
            ProxyError::new(ProxyErrorCode::TokenExpired, "proxy token expired")
        }
        token_service::TokenVerifyError::Invalid(reason) => {
            ProxyError::new(ProxyErrorCode::TokenInvalid, reason)
        }
    })?;

    // Step 4: build upstream URL, preserving the query string verbatim.
    let query = uri.query().unwrap_or("");
    let target_url = build_target_url(service.target(), &parsed.path, query);

    // Step 5: GET/HEAD carry a null body; other methods forward the body.
    let forward_body = if method == Method::GET || method == Method::HEAD {
        Bytes::new()
    } else {
        body
    };
    strip_hop_by_hop(&mut headers);

    let forward_req = ForwardRequest {
        method: method.clone(),
        target_url,
        path: parsed.path,
        headers,
        body: forward_body,
    };

    // Step 6: transform (credential injection; may short-circuit).
    let ctx = ProxyContext {
        anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
        github_token: std::env::var("GITHUB_TOKEN").ok(),
    };
    let forward_req = match service.transform(forward_req, &ctx).await {
        Ok(req) => req,
        Err(response) => return Ok(response),
    };

    // Step 7: forward.
    let mut upstream_req = state
        .client
        .request(forward_req.method, &forward_req.target_url)
        .body(forward_req.body.to_vec());
    for (name, value) in forward_req.headers.iter() {
        upstream_req = upstream_req.header(name, value);
    }

    let upstream_resp = upstream_req.send().await.map_err(|_| {
        ProxyError::new(
            ProxyErrorCode::TargetError,
            format!("could not reach {}", service.target()),
        )
    })?;

    let status = StatusCode::from_u16(upstream_resp.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let mut resp_headers = HeaderMap::new();
    for (name, value) in upstream_resp.headers().iter() {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            resp_headers.append(n, v);
        }
    }
    strip_hop_by_hop(&mut resp_headers);

    let body_bytes = upstream_resp.bytes().await.map_err(|_| {
        ProxyError::new(ProxyErrorCode::TargetError, format!("could not read body from {}", service.target()))
    })?;

    let mut response = (status, body_bytes).into_response();
    *response.headers_mut() = resp_headers;
    Ok(response)
}

/// Rewrites `container_proxy_url` for the sandbox, applying the
/// local-development host substitution (spec §4.1).
pub fn sandbox_facing_proxy_url(public_base_url: &str, mount_path: &str) -> String {
    rewrite_for_sandbox(&format!("{public_base_url}{mount_path}"))
}
