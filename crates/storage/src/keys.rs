// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical object-store key layout (spec §3/§4.2 component A).

use scp_core::{RunId, SessionId};

pub const SESSION_INDEX_KEY: &str = "sessions/_index.json";
pub const RUN_INDEX_KEY: &str = "runs/_index.json";

pub fn session_key(id: &SessionId) -> String {
    format!("sessions/{id}.json")
}

pub fn run_key(id: &RunId) -> String {
    format!("runs/{id}.json")
}

pub fn session_backup_key(id: &SessionId) -> String {
    format!("sessions/{id}/opencode-storage.tar.gz")
}

pub fn workflow_step_key(workflow_id: &str, step_name: &str) -> String {
    format!("workflows/{workflow_id}/steps/{step_name}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_spec() {
        let id = SessionId::parse("abc-123").unwrap();
        assert_eq!(session_key(&id), "sessions/abc-123.json");
        assert_eq!(
            session_backup_key(&id),
            "sessions/abc-123/opencode-storage.tar.gz"
        );
        let run = RunId::from_raw("run-deadbeef");
        assert_eq!(run_key(&run), "runs/run-deadbeef.json");
    }
}
