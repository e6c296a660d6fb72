// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scp-daemon: the Tool Dispatcher (J) and Telemetry (K) components, plus
//! the HTTP surface named in spec §6 (`/health`, `/mcp`, `/proxy/*`,
//! `/session/*`). Assembles the other five crates behind one axum
//! `Router`, the way the teacher's `daemon::lib` wires its own adapters
//! and listeners behind one process entry point.

pub mod auth;
pub mod config;
pub mod mcp;
pub mod session_routes;
pub mod state;
pub mod telemetry;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Assemble the full daemon router over an already-constructed
/// [`AppState`] (spec §6's HTTP surface): `/health`, bearer-guarded `/mcp`,
/// the proxy engine mounted at `state.config.mount_path`, the explicit
/// `/session/{id}` entry route, and a catch-all fallback that either
/// tunnels into the sandbox (cookie present) or serves the informational
/// index (spec §6's "default path without session cookie").
pub fn router(state: Arc<AppState>) -> Router {
    let mcp_router = Router::new()
        .route("/mcp", post(mcp::handle))
        .route("/mcp/*rest", post(mcp::handle))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_bearer))
        .with_state(state.clone());

    let proxy_registry = scp_proxy::default_registry("https://api.anthropic.com", "https://github.com");
    let proxy_engine = scp_proxy::ProxyEngine {
        registry: proxy_registry,
        jwt_secret: state.config.proxy_jwt_secret.clone(),
        mount_path: state.config.mount_path.clone(),
        client: state.http_client.clone(),
    };

    let app_router = Router::new()
        .route("/health", get(health))
        .route("/session/:session_id", get(session_routes::entry))
        .fallback(session_routes::tunnel_or_index)
        .with_state(state);

    mcp_router.merge(proxy_engine.router()).merge(app_router).layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use state::test_support::test_state;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mcp_without_bearer_is_unauthorized() {
        let app = router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn fallback_without_session_cookie_returns_index() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn session_entry_for_unknown_session_is_not_found() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/session/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
