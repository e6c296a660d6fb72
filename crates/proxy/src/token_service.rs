// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HS256 JWT issue/verify for proxy tokens (spec §4.1/B). Grounded on
//! `openSVM-larp/sidecar/src/auth/mod.rs`'s `encode`/`decode` shape; this
//! workspace's claims require `sandboxId` (not `sub`) per spec §3.
//!
//! Expiry is checked against an explicit `now_epoch_s` rather than
//! `jsonwebtoken`'s own wall-clock validation, so callers can drive it with
//! a [`scp_core::FakeClock`] in tests (spec §8 property 6).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use scp_core::{parse_expires_in, TokenClaims};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenCreateError {
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("sandboxId must not be empty")]
    EmptySandboxId,
    #[error("invalid expiresIn: {0}")]
    InvalidExpiry(String),
    #[error("failed to sign token: {0}")]
    Sign(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenVerifyError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

pub struct CreateTokenParams<'a> {
    pub secret: &'a str,
    pub sandbox_id: &'a str,
    pub session_id: Option<&'a str>,
    /// `{n}m|{n}h|{n}d` or bare seconds. Defaults to `"2h"` if absent.
    pub expires_in: Option<&'a str>,
}

pub fn create(params: CreateTokenParams<'_>, now_epoch_s: u64) -> Result<String, TokenCreateError> {
    if params.secret.is_empty() {
        return Err(TokenCreateError::EmptySecret);
    }
    if params.sandbox_id.is_empty() {
        return Err(TokenCreateError::EmptySandboxId);
    }
    let ttl_secs = parse_expires_in(params.expires_in.unwrap_or("2h"))
        .map_err(|e| TokenCreateError::InvalidExpiry(e.to_string()))?;

    let claims = TokenClaims {
        sandbox_id: params.sandbox_id.to_string(),
        session_id: params.session_id.map(|s| s.to_string()),
        iat: now_epoch_s,
        exp: now_epoch_s + ttl_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(params.secret.as_bytes()),
    )
    .map_err(|e| TokenCreateError::Sign(e.to_string()))
}

/// Decode and verify `token`'s signature and claim shape, then classify
/// expiry against `now_epoch_s` explicitly (never the host wall clock).
pub fn verify(secret: &str, token: &str, now_epoch_s: u64) -> Result<TokenClaims, TokenVerifyError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["sandboxId", "exp", "iat"]);

    let claims = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| TokenVerifyError::Invalid(e.to_string()))?
        .claims;

    if claims.exp <= now_epoch_s {
        return Err(TokenVerifyError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_claims() {
        let token = create(
            CreateTokenParams {
                secret: "s3cret",
                sandbox_id: "sandbox-1",
                session_id: Some("session-1"),
                expires_in: Some("1h"),
            },
            1_000,
        )
        .unwrap();

        let claims = verify("s3cret", &token, 1_500).unwrap();
        assert_eq!(claims.sandbox_id, "sandbox-1");
        assert_eq!(claims.session_id.as_deref(), Some("session-1"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let token = create(
            CreateTokenParams {
                secret: "s3cret",
                sandbox_id: "sandbox-1",
                session_id: None,
                expires_in: Some("0"),
            },
            1_000,
        )
        .unwrap();
        let err = verify("s3cret", &token, 1_000).unwrap_err();
        assert_eq!(err, TokenVerifyError::Expired);
    }

    #[test]
    fn manipulated_clock_past_ttl_expires_not_invalid() {
        let token = create(
            CreateTokenParams { secret: "s3cret", sandbox_id: "s", session_id: None, expires_in: Some("1h") },
            1_000,
        )
        .unwrap();
        let err = verify("s3cret", &token, 1_000 + 3_601).unwrap_err();
        assert_eq!(err, TokenVerifyError::Expired);
    }

    #[test]
    fn rejects_empty_secret_or_sandbox_id() {
        assert_eq!(
            create(
                CreateTokenParams { secret: "", sandbox_id: "s", session_id: None, expires_in: None },
                0
            )
            .unwrap_err(),
            TokenCreateError::EmptySecret
        );
        assert_eq!(
            create(
                CreateTokenParams { secret: "s", sandbox_id: "", session_id: None, expires_in: None },
                0
            )
            .unwrap_err(),
            TokenCreateError::EmptySandboxId
        );
    }

    #[test]
    fn bad_signature_is_invalid_not_expired() {
        let token = create(
            CreateTokenParams { secret: "a", sandbox_id: "s", session_id: None, expires_in: Some("1h") },
            0,
        )
        .unwrap();
        let err = verify("b", &token, 0).unwrap_err();
        assert!(matches!(err, TokenVerifyError::Invalid(_)));
    }
}
