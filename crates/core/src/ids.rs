// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SessionId` and `RunId` newtypes.
//!
//! Unlike the prefixed-nanoid IDs elsewhere in this workspace, these two
//! follow caller-supplied formats: a session id is a lowercase slug
//! matching [`SESSION_ID_PATTERN`], a run id is `run-{8 lowercase hex}`.
//! Both are validated on construction rather than generated from a single
//! macro shape.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;

/// `^[a-z0-9]+(-[a-z0-9]+)*$`, max length 64.
pub const SESSION_ID_PATTERN: &str = r"^[a-z0-9]+(-[a-z0-9]+)*$";
pub const SESSION_ID_MAX_LEN: usize = 64;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
fn session_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SESSION_ID_PATTERN).expect("static regex is valid"))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session id must not be empty")]
    Empty,
    #[error("session id exceeds {SESSION_ID_MAX_LEN} characters")]
    TooLong,
    #[error("session id {0:?} does not match {SESSION_ID_PATTERN}")]
    InvalidFormat(String),
}

/// A validated session identifier: lowercase alphanumeric segments joined by
/// single hyphens, no leading/trailing/consecutive hyphens, max 64 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(s: impl Into<String>) -> Result<Self, SessionIdError> {
        let s = s.into();
        if s.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if s.len() > SESSION_ID_MAX_LEN {
            return Err(SessionIdError::TooLong);
        }
        if !session_id_regex().is_match(&s) {
            return Err(SessionIdError::InvalidFormat(s));
        }
        Ok(Self(s))
    }

    /// Generate a fresh id: the first 8 hex characters of a v4 UUID.
    ///
    /// UUID v4's hex representation is always lowercase, so the result
    /// always satisfies [`SESSION_ID_PATTERN`] — but callers must still
    /// validate through [`SessionId::parse`] rather than assume it, per the
    /// spec's open question about preserving both the regex and the
    /// generator rather than relaxing either.
    // Allow expect here as a uuid v4 hex slice always satisfies the regex
    #[allow(clippy::expect_used)]
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        let short = &raw[..8];
        Self::parse(short).expect("uuid-derived hex slice always satisfies the session id regex")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunIdError {
    #[error("run id {0:?} does not match run-{{8 lowercase hex}}")]
    InvalidFormat(String),
}

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
fn run_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^run-[0-9a-f]{8}$").expect("static regex is valid"))
}

/// A run identifier. Free-form per the spec, but this workspace always
/// generates and validates the conventional `run-{8 hex}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn parse(s: impl Into<String>) -> Result<Self, RunIdError> {
        let s = s.into();
        if !run_id_regex().is_match(&s) {
            return Err(RunIdError::InvalidFormat(s));
        }
        Ok(Self(s))
    }

    /// Accept any caller-supplied string without the `run-` format check —
    /// the spec calls `RunId` "free-form outside the system"; `generate`
    /// and internal code still only ever produce the conventional shape.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("run-{}", &raw[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RunId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_slug() {
        assert!(SessionId::parse("abc123").is_ok());
        assert!(SessionId::parse("ab-cd-12").is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        assert_eq!(SessionId::parse("AbC").unwrap_err(), SessionIdError::InvalidFormat("AbC".into()));
    }

    #[test]
    fn rejects_leading_trailing_consecutive_hyphens() {
        assert!(SessionId::parse("-abc").is_err());
        assert!(SessionId::parse("abc-").is_err());
        assert!(SessionId::parse("ab--c").is_err());
    }

    #[test]
    fn rejects_too_long() {
        let s = "a".repeat(65);
        assert_eq!(SessionId::parse(s).unwrap_err(), SessionIdError::TooLong);
    }

    #[test]
    fn generated_ids_satisfy_the_regex() {
        for _ in 0..50 {
            let id = SessionId::generate();
            assert!(Regex::new(SESSION_ID_PATTERN).unwrap().is_match(id.as_str()));
            assert_eq!(id.as_str().len(), 8);
        }
    }

    #[test]
    fn run_id_format() {
        let id = RunId::generate();
        assert!(id.as_str().starts_with("run-"));
        assert_eq!(id.as_str().len(), 12);
        assert!(RunId::parse(id.as_str()).is_ok());
        assert!(RunId::parse("bogus").is_err());
    }
}
