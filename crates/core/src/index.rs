// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lightweight index projections persisted as single objects
//! (`sessions/_index.json`, `runs/_index.json`) so listing never iterates
//! the bucket.

use crate::ids::{RunId, SessionId};
use crate::run::{Run, RunStatus};
use crate::session::{Session, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIndexEntry {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub created_at: u64,
    pub last_activity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&Session> for SessionIndexEntry {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.session_id.clone(),
            status: s.status,
            created_at: s.created_at,
            last_activity: s.last_activity,
            title: s.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndex {
    pub version: u32,
    pub sessions: BTreeMap<String, SessionIndexEntry>,
    pub updated_at: u64,
}

impl SessionIndex {
    pub fn empty(now_ms: u64) -> Self {
        Self {
            version: 1,
            sessions: BTreeMap::new(),
            updated_at: now_ms,
        }
    }

    pub fn upsert(&mut self, entry: SessionIndexEntry, now_ms: u64) {
        self.sessions.insert(entry.session_id.as_str().to_string(), entry);
        self.updated_at = now_ms;
    }

    pub fn remove(&mut self, id: &SessionId, now_ms: u64) {
        self.sessions.remove(id.as_str());
        self.updated_at = now_ms;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIndexEntry {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub status: RunStatus,
    pub title: String,
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl From<&Run> for RunIndexEntry {
    fn from(r: &Run) -> Self {
        Self {
            run_id: r.run_id.clone(),
            session_id: r.session_id.clone(),
            status: r.status,
            title: r.title.clone(),
            started_at: r.started_at,
            completed_at: r.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIndex {
    pub version: u32,
    pub runs: BTreeMap<String, RunIndexEntry>,
    pub updated_at: u64,
}

impl RunIndex {
    pub fn empty(now_ms: u64) -> Self {
        Self {
            version: 1,
            runs: BTreeMap::new(),
            updated_at: now_ms,
        }
    }

    pub fn upsert(&mut self, entry: RunIndexEntry, now_ms: u64) {
        self.runs.insert(entry.run_id.as_str().to_string(), entry);
        self.updated_at = now_ms;
    }

    pub fn remove(&mut self, id: &RunId, now_ms: u64) {
        self.runs.remove(id.as_str());
        self.updated_at = now_ms;
    }

    pub fn remove_for_session(&mut self, session_id: &SessionId, now_ms: u64) -> Vec<RunId> {
        let removed: Vec<RunId> = self
            .runs
            .values()
            .filter(|e| &e.session_id == session_id)
            .map(|e| e.run_id.clone())
            .collect();
        for id in &removed {
            self.runs.remove(id.as_str());
        }
        if !removed.is_empty() {
            self.updated_at = now_ms;
        }
        removed
    }
}
