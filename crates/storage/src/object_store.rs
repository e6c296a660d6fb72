// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ObjectStore` — the external collaborator contract (spec §4.2): a
//! simple get/put/delete/list surface with ETag compare-and-swap as the
//! only concurrency primitive. This workspace ships one production-shaped
//! implementation, `InMemoryObjectStore`; a real deployment wires a
//! different backend (e.g. S3-compatible) at the same trait boundary.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store io error: {0}")]
    Io(String),
}

#[derive(Debug, Clone)]
pub struct GetResult {
    pub body: Vec<u8>,
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Only succeed if the current etag matches (CAS). `None` means
    /// "create if absent" semantics are the caller's responsibility —
    /// this workspace always supplies a concrete etag or a sentinel empty
    /// one when synthesizing a missing index (spec §4.2 step 1).
    pub if_match_etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: String,
}

/// A full list of keys sharing `prefix`, paginated by `cursor`.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<GetResult>, ObjectStoreError>;

    /// Returns `Ok(None)` when `options.if_match_etag` does not match the
    /// stored etag (precondition failed) — callers treat this as a
    /// conflict and retry, never as an error.
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        options: PutOptions,
    ) -> Result<Option<PutResult>, ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<ListPage, ObjectStoreError>;
}

#[derive(Clone)]
struct Entry {
    body: Vec<u8>,
    etag: String,
}

/// `Arc<Mutex<HashMap<..>>>`-backed store with real ETag semantics, used
/// both as the daemon's default wiring and across the storage/workflow
/// test suite.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    etag_seq: Arc<AtomicU64>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_etag(&self) -> String {
        let n = self.etag_seq.fetch_add(1, Ordering::SeqCst);
        format!("etag-{n}")
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<GetResult>, ObjectStoreError> {
        let guard = self.inner.lock();
        Ok(guard.get(key).map(|e| GetResult {
            body: e.body.clone(),
            etag: e.etag.clone(),
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        options: PutOptions,
    ) -> Result<Option<PutResult>, ObjectStoreError> {
        let mut guard = self.inner.lock();
        if let Some(expected) = &options.if_match_etag {
            let current = guard.get(key).map(|e| e.etag.as_str());
            let matches = if expected.is_empty() {
                current.is_none()
            } else {
                current == Some(expected.as_str())
            };
            if !matches {
                return Ok(None);
            }
        }
        let etag = self.next_etag();
        guard.insert(
            key.to_string(),
            Entry { body, etag: etag.clone() },
        );
        Ok(Some(PutResult { etag }))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<ListPage, ObjectStoreError> {
        let guard = self.inner.lock();
        let mut keys: Vec<String> = guard
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        let start = match &cursor {
            Some(c) => keys.iter().position(|k| k > c).unwrap_or(keys.len()),
            None => 0,
        };
        let page: Vec<String> = keys[start..].iter().take(limit).cloned().collect();
        let next_cursor = if start + page.len() < keys.len() {
            page.last().cloned()
        } else {
            None
        };
        Ok(ListPage { keys: page, next_cursor })
    }
}
