// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service registry: `{target, validate, transform}` keyed by service name
//! (spec §4.1). Grounded on `crates/daemon/src/adapters/credential.rs`'s
//! env-var-driven credential resolution for the "secret absent → 500
//! naming the variable" behavior.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;

/// Credentials resolved from the environment per request (spec §5:
/// "read from environment per request, not cached, so an operator swap
/// takes effect without restart").
pub struct ProxyContext {
    pub anthropic_api_key: Option<String>,
    pub github_token: Option<String>,
}

pub struct ForwardRequest {
    pub method: Method,
    /// Fully resolved upstream URL (built before `transform` runs).
    pub target_url: String,
    /// The target path fragment, used by services that allow-list paths.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait ProxyService: Send + Sync {
    /// Upstream base URL.
    fn target(&self) -> &str;

    /// Extract the proxy token, or `None` if absent.
    fn validate(&self, headers: &HeaderMap) -> Option<String>;

    /// Inject the real upstream credential and any other transport
    /// requirements. May short-circuit with a response (misconfiguration
    /// or a rejected path).
    async fn transform(
        &self,
        req: ForwardRequest,
        ctx: &ProxyContext,
    ) -> Result<ForwardRequest, Response>;
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn ProxyService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, service: Arc<dyn ProxyService>) {
        self.services.insert(name.into(), service);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ProxyService>> {
        self.services.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }
}
