// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scp-proxy: Token Service (HS256 JWT) and Proxy Engine (spec §4.1/B, E).

pub mod engine;
pub mod error;
pub mod host_rewrite;
pub mod path;
pub mod registry;
pub mod services;
pub mod token_service;

pub use engine::{sandbox_facing_proxy_url, ProxyEngine};
pub use error::ProxyError;
pub use host_rewrite::rewrite_for_sandbox;
pub use path::{build_target_url, parse_proxy_path, ParsedProxyPath, PathInvalid};
pub use registry::{ForwardRequest, ProxyContext, ProxyService, ServiceRegistry};
pub use services::anthropic::AnthropicService;
pub use services::github::GithubService;
pub use token_service::{create as create_token, verify as verify_token, CreateTokenParams, TokenCreateError, TokenVerifyError};

/// Build the default service registry (anthropic + github), matching the
/// two named service policies in spec §4.1.
pub fn default_registry(anthropic_target: impl Into<String>, github_target: impl Into<String>) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry.register("anthropic", std::sync::Arc::new(AnthropicService::new(anthropic_target)));
    registry.register("github", std::sync::Arc::new(GithubService::new(github_target)));
    registry
}
