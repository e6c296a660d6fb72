// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer auth for `/mcp` (spec §6: "Requires `Authorization: Bearer
//! {AUTH_TOKEN}`; 401 on missing/mismatch"). Implemented as one
//! `axum::middleware::from_fn_with_state` guard mounted in front of the
//! `/mcp` route only — the proxy surface and the session routes are
//! unauthenticated by design (the per-service token and the session
//! cookie are each their own credential).

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let expected = format!("Bearer {}", state.config.auth_token);
    match header {
        Some(value) if value == expected => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/guarded", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_bearer))
            .with_state(state)
    }

    #[tokio::test]
    async fn rejects_missing_bearer() {
        let state = test_state();
        let app = router(state);
        let resp = app
            .oneshot(Request::builder().uri("/guarded").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_matching_bearer() {
        let state = test_state();
        let token = state.config.auth_token.clone();
        let app = router(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/guarded")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
