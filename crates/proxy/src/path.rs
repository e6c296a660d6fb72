// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path grammar and relative URL resolution for the proxy (spec §4.1).
//! No teacher or example counterpart — written directly from the spec's
//! parsing rules and exercised against §8 properties 3/4.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProxyPath {
    pub service: String,
    pub path: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("proxy path invalid")]
pub struct PathInvalid;

/// Normalize `mount_path` to `/seg` (strip trailing slash, ensure leading).
fn normalize_mount(mount_path: &str) -> String {
    let trimmed = mount_path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Parse `{mountPath}/{service}/{targetPath?}`. Anything else is
/// `PROXY_PATH_INVALID` (spec §4.1).
pub fn parse_proxy_path(mount_path: &str, request_path: &str) -> Result<ParsedProxyPath, PathInvalid> {
    let mount = normalize_mount(mount_path);
    let remainder = if mount == "/" {
        request_path
    } else {
        request_path.strip_prefix(&mount).ok_or(PathInvalid)?
    };

    if !remainder.starts_with('/') {
        return Err(PathInvalid);
    }
    let remainder = &remainder[1..]; // drop the leading '/'
    let (service, rest) = match remainder.split_once('/') {
        Some((s, r)) => (s, format!("/{r}")),
        None => (remainder, "/".to_string()),
    };
    if service.is_empty() {
        return Err(PathInvalid);
    }

    Ok(ParsedProxyPath { service: service.to_string(), path: rest })
}

/// Resolve `path` and `query` against `target` by relative resolution so
/// the upstream base path survives (spec §8 property 4).
pub fn build_target_url(target: &str, path: &str, query: &str) -> String {
    let base = if target.ends_with('/') { target.to_string() } else { format!("{target}/") };
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut url = format!("{base}{path}");
    if !query.is_empty() {
        if query.starts_with('?') {
            url.push_str(query);
        } else {
            url.push('?');
            url.push_str(query);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_service_and_target_path() {
        let parsed = parse_proxy_path("/proxy", "/proxy/github/owner/repo.git/info/refs").unwrap();
        assert_eq!(parsed.service, "github");
        assert_eq!(parsed.path, "/owner/repo.git/info/refs");
    }

    #[test]
    fn service_with_no_target_path_defaults_to_slash() {
        let parsed = parse_proxy_path("/proxy", "/proxy/anthropic").unwrap();
        assert_eq!(parsed.service, "anthropic");
        assert_eq!(parsed.path, "/");
    }

    #[test]
    fn rejects_missing_mount_or_empty_service() {
        assert!(parse_proxy_path("/proxy", "/other/x").is_err());
        assert!(parse_proxy_path("/proxy", "/proxy/").is_err());
        assert!(parse_proxy_path("/proxy", "/proxy").is_err());
    }

    #[test]
    fn normalizes_trailing_slash_on_mount() {
        let parsed = parse_proxy_path("/proxy/", "/proxy/github/x").unwrap();
        assert_eq!(parsed.service, "github");
    }

    #[test]
    fn build_target_url_preserves_base_path_and_query() {
        assert_eq!(
            build_target_url("https://h/api", "/v1/x", "?q=1"),
            "https://h/api/v1/x?q=1"
        );
        assert_eq!(build_target_url("https://h/api/", "/v1/x", ""), "https://h/api/v1/x");
    }

    proptest! {
        #[test]
        fn parse_proxy_path_is_total(s in ".{0,200}") {
            match parse_proxy_path("/proxy", &s) {
                Ok(parsed) => {
                    prop_assert!(!parsed.service.is_empty());
                    prop_assert!(parsed.path.starts_with('/'));
                }
                Err(_) => {}
            }
        }
    }
}
