// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `github` service policy (spec §4.1): token in `Authorization: Bearer`;
//! path must match git's smart-HTTP transport; transform swaps in Basic
//! auth scoped to `x-access-token` plus a fixed `User-Agent`, restricting
//! the credential to git's smart-HTTP transport only.

use crate::registry::{ForwardRequest, ProxyContext, ProxyService};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::StatusCode;
use regex::Regex;
use std::sync::OnceLock;

pub const USER_AGENT: &str = "Sandbox-Git-Proxy";

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
fn git_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/.+/.+(\.git)?/(info/refs|git-upload-pack|git-receive-pack)$")
            .expect("static regex is valid")
    })
}

pub struct GithubService {
    target: String,
}

impl GithubService {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }
}

#[async_trait]
impl ProxyService for GithubService {
    fn target(&self) -> &str {
        &self.target
    }

    fn validate(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    }

    async fn transform(
        &self,
        mut req: ForwardRequest,
        ctx: &ProxyContext,
    ) -> Result<ForwardRequest, Response> {
        if !git_path_regex().is_match(&req.path) {
            return Err((StatusCode::BAD_REQUEST, "Invalid git path").into_response());
        }
        let Some(token) = &ctx.github_token else {
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Missing GITHUB_TOKEN").into_response());
        };

        let basic = BASE64.encode(format!("x-access-token:{token}"));
        let auth_value = http::HeaderValue::from_str(&format!("Basic {basic}"))
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Invalid GITHUB_TOKEN").into_response())?;
        req.headers.insert(http::header::AUTHORIZATION, auth_value);
        req.headers.insert(
            http::header::USER_AGENT,
            http::HeaderValue::from_static(USER_AGENT),
        );
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_info_refs_and_pack_paths() {
        let re = git_path_regex();
        assert!(re.is_match("/u/r.git/info/refs"));
        assert!(re.is_match("/u/r/git-upload-pack"));
        assert!(re.is_match("/u/r.git/git-receive-pack"));
    }

    #[test]
    fn rejects_non_git_paths() {
        assert!(!git_path_regex().is_match("/owner/repo/releases"));
    }

    proptest! {
        #[test]
        fn any_path_not_matching_the_allow_list_is_rejected(p in "/[a-z]{1,5}/[a-z]{1,5}/other") {
            prop_assert!(!git_path_regex().is_match(&p));
        }
    }
}
