// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable daemon configuration, resolved once from the environment at
//! startup (SPEC_FULL.md §2/§6). Unlike the teacher's `daemon/env.rs`
//! (each accessor reads its own variable lazily, independently), this
//! collects every missing required variable up front: the daemon has no
//! later opportunity to report a second missing variable after it has
//! already started serving traffic.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable(s): {}", .0.join(", "))]
pub struct ConfigError(pub Vec<String>);

/// Centralized, immutable daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token required on `/mcp`.
    pub auth_token: String,
    /// HS256 signing secret for proxy tokens.
    pub proxy_jwt_secret: String,
    /// Mount path for the proxy, e.g. `/proxy`.
    pub mount_path: String,
    /// Public origin the daemon is reachable at, e.g. `https://host`.
    pub public_base_url: String,
    /// Upstream Anthropic API key injected by the `anthropic` proxy transform.
    pub anthropic_api_key: Option<String>,
    /// Upstream GitHub token injected by the `github` proxy transform.
    pub github_token: Option<String>,
    /// Object-store bucket/namespace prefix for session and run data.
    pub sessions_bucket: String,
    /// Default model used when a tool call does not specify one.
    pub default_model: String,
    /// Default timeout for sandbox `exec` calls.
    pub sandbox_exec_timeout: Duration,
    /// `pretty` (default) or `json` — selects the ambient log formatter.
    pub log_format: LogFormat,
    /// Base URL of the external sandbox runtime RPC (spec §1: "treated as a
    /// remote opaque RPC"). Defaults to a local dev binding; a real
    /// deployment overrides it with the runtime's service address.
    pub sandbox_runtime_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables, collecting every
    /// missing required variable into a single `ConfigError` rather than
    /// failing on the first one encountered.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|k| std::env::var(k).ok())
    }

    /// Testable entry point: `reader` stands in for `std::env::var`.
    pub fn from_reader(reader: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut require = |key: &str| -> String {
            match reader(key).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(key.to_string());
                    String::new()
                }
            }
        };

        let auth_token = require("SCP_AUTH_TOKEN");
        let proxy_jwt_secret = require("SCP_PROXY_JWT_SECRET");
        let public_base_url = require("SCP_BASE_URL");

        if !missing.is_empty() {
            return Err(ConfigError(missing));
        }

        let mount_path = reader("SCP_MOUNT_PATH").unwrap_or_else(|| "/proxy".to_string());
        let anthropic_api_key = reader("ANTHROPIC_API_KEY").filter(|v| !v.is_empty());
        let github_token = reader("GITHUB_TOKEN").filter(|v| !v.is_empty());
        let sessions_bucket =
            reader("SCP_SESSIONS_BUCKET").unwrap_or_else(|| "sessions".to_string());
        let default_model =
            reader("SCP_DEFAULT_MODEL").unwrap_or_else(|| "claude-sonnet-4-5".to_string());
        let sandbox_exec_timeout = reader("SCP_SANDBOX_EXEC_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(30));
        let log_format = match reader("SCP_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let sandbox_runtime_url =
            reader("SCP_SANDBOX_RUNTIME_URL").unwrap_or_else(|| "http://localhost:7000".to_string());

        Ok(Self {
            auth_token,
            proxy_jwt_secret,
            mount_path,
            public_base_url,
            anthropic_api_key,
            github_token,
            sessions_bucket,
            default_model,
            sandbox_exec_timeout,
            log_format,
            sandbox_runtime_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn collects_all_missing_vars_at_once() {
        let err = Config::from_reader(env(&[])).unwrap_err();
        assert_eq!(
            err.0,
            vec!["SCP_AUTH_TOKEN", "SCP_PROXY_JWT_SECRET", "SCP_BASE_URL"]
        );
    }

    #[test]
    fn applies_defaults_when_optional_vars_absent() {
        let cfg = Config::from_reader(env(&[
            ("SCP_AUTH_TOKEN", "t"),
            ("SCP_PROXY_JWT_SECRET", "s"),
            ("SCP_BASE_URL", "https://host"),
        ]))
        .unwrap();
        assert_eq!(cfg.mount_path, "/proxy");
        assert_eq!(cfg.default_model, "claude-sonnet-4-5");
        assert_eq!(cfg.sandbox_exec_timeout, Duration::from_secs(30));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }
}
