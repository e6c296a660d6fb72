// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HS256 proxy token claims and the `{n}m|{n}h|{n}d`/bare-seconds expiry
//! parser shared by the token service (`scp-proxy`).

use serde::{Deserialize, Serialize};

/// `{sandboxId, sessionId?, exp, iat}` — the only credential a sandbox ever
/// sees (see spec GLOSSARY "Proxy token").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sandboxId")]
    pub sandbox_id: String,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub exp: u64,
    pub iat: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpiryParseError {
    #[error("expiry string {0:?} is empty")]
    Empty(String),
    #[error("expiry string {0:?} is not a valid duration")]
    Invalid(String),
}

/// Parse `{n}m|{n}h|{n}d` or a bare integer (seconds) into a seconds count.
pub fn parse_expires_in(raw: &str) -> Result<u64, ExpiryParseError> {
    if raw.is_empty() {
        return Err(ExpiryParseError::Empty(raw.to_string()));
    }
    let (num_part, multiplier) = match raw.chars().last() {
        Some('m') => (&raw[..raw.len() - 1], 60),
        Some('h') => (&raw[..raw.len() - 1], 3600),
        Some('d') => (&raw[..raw.len() - 1], 86_400),
        _ => (raw, 1),
    };
    let n: u64 = num_part
        .parse()
        .map_err(|_| ExpiryParseError::Invalid(raw.to_string()))?;
    Ok(n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_hours_days_and_bare_seconds() {
        assert_eq!(parse_expires_in("30m").unwrap(), 1800);
        assert_eq!(parse_expires_in("2h").unwrap(), 7200);
        assert_eq!(parse_expires_in("1d").unwrap(), 86_400);
        assert_eq!(parse_expires_in("45").unwrap(), 45);
        assert_eq!(parse_expires_in("0").unwrap(), 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_expires_in("").is_err());
        assert!(parse_expires_in("abc").is_err());
        assert!(parse_expires_in("3x").is_err());
    }
}
