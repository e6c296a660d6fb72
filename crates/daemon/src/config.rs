// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration is just `scp-core`'s `Config` — there is nothing
//! daemon-specific to add, so this module is a thin re-export rather than
//! a second config type.

pub use scp_core::config::{Config, ConfigError, LogFormat};
