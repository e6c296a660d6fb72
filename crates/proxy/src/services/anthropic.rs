// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `anthropic` service policy (spec §4.1): token in `x-api-key`; transform
//! replaces that header value with the configured upstream API key.

use crate::registry::{ForwardRequest, ProxyContext, ProxyService};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

pub const API_KEY_HEADER: &str = "x-api-key";

pub struct AnthropicService {
    target: String,
}

impl AnthropicService {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }
}

#[async_trait]
impl ProxyService for AnthropicService {
    fn target(&self) -> &str {
        &self.target
    }

    fn validate(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    async fn transform(
        &self,
        mut req: ForwardRequest,
        ctx: &ProxyContext,
    ) -> Result<ForwardRequest, Response> {
        let Some(key) = &ctx.anthropic_api_key else {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Missing ANTHROPIC_API_KEY",
            )
                .into_response());
        };
        let value = http::HeaderValue::from_str(key)
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Invalid ANTHROPIC_API_KEY").into_response())?;
        req.headers.insert(API_KEY_HEADER, value);
        Ok(req)
    }
}
