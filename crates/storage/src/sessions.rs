// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SessionStore` — CRUD over session records plus the session index
//! (spec §4.2/C). Grounded on `storage/state/sessions.rs`'s
//! update-derived-state pattern, adapted to direct object-store CRUD
//! since there is no WAL in this design.

use crate::keys::{session_key, SESSION_INDEX_KEY};
use crate::object_store::{ObjectStore, PutOptions};
use crate::retry::{retry_with_backoff, RetryError};
use scp_core::{CoreError, Session, SessionIndex, SessionIndexEntry, SessionId};
use std::sync::Arc;

pub struct ListSessionsParams {
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListSessionsParams {
    fn default() -> Self {
        Self { limit: 100, offset: 0 }
    }
}

pub struct ListSessionsResult {
    pub entries: Vec<SessionIndexEntry>,
    pub total: usize,
}

pub struct SessionStore {
    store: Arc<dyn ObjectStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, CoreError> {
        let Some(result) = self
            .store
            .get(&session_key(id))
            .await
            .map_err(|e| CoreError::StorageRead(e.to_string()))?
        else {
            return Ok(None);
        };
        let session: Session = serde_json::from_slice(&result.body)
            .map_err(|e| CoreError::StorageRead(format!("session {id}: {e}")))?;
        Ok(Some(session))
    }

    /// Write the record first, then upsert the index (spec §4.2: a crash
    /// between the two leaves an orphan record, never a stale index
    /// pointer).
    pub async fn put_session(&self, session: &Session) -> Result<(), CoreError> {
        let body = serde_json::to_vec(session)?;
        self.store
            .put(&session_key(&session.session_id), body, PutOptions::default())
            .await
            .map_err(|e| CoreError::StorageWrite(format!("session {}: {e}", session.session_id)))?;

        let entry = SessionIndexEntry::from(session);
        self.upsert_index_entry(entry).await
    }

    /// Delete the record, then remove the index entry. Callers must cascade
    /// run deletion first; this store does not couple the two domains.
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), CoreError> {
        self.store
            .delete(&session_key(id))
            .await
            .map_err(|e| CoreError::StorageWrite(format!("session {id}: {e}")))?;
        self.remove_index_entry(id).await
    }

    pub async fn list_sessions(
        &self,
        params: ListSessionsParams,
    ) -> Result<ListSessionsResult, CoreError> {
        let index = self.read_index().await?;
        let mut entries: Vec<SessionIndexEntry> = index.sessions.into_values().collect();
        entries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        let total = entries.len();
        let page = entries
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .collect();
        Ok(ListSessionsResult { entries: page, total })
    }

    async fn read_index(&self) -> Result<SessionIndex, CoreError> {
        match self
            .store
            .get(SESSION_INDEX_KEY)
            .await
            .map_err(|e| CoreError::StorageRead(e.to_string()))?
        {
            Some(result) => serde_json::from_slice(&result.body)
                .map_err(|e| CoreError::StorageRead(format!("session index: {e}"))),
            None => Ok(SessionIndex::empty(0)),
        }
    }

    async fn upsert_index_entry(&self, entry: SessionIndexEntry) -> Result<(), CoreError> {
        let now = entry.last_activity;
        self.update_index(move |index| index.upsert(entry.clone(), now))
            .await
    }

    async fn remove_index_entry(&self, id: &SessionId) -> Result<(), CoreError> {
        let id = id.clone();
        self.update_index(move |index| index.remove(&id, index.updated_at))
            .await
    }

    async fn update_index(
        &self,
        patch: impl Fn(&mut SessionIndex) + Send + Sync,
    ) -> Result<(), CoreError> {
        let result: Result<(), RetryError<CoreError>> = retry_with_backoff(|| async {
            let (mut index, etag) = match self
                .store
                .get(SESSION_INDEX_KEY)
                .await
                .map_err(|e| CoreError::StorageWrite(e.to_string()))?
            {
                Some(r) => {
                    let index: SessionIndex = serde_json::from_slice(&r.body)
                        .map_err(|e| CoreError::StorageRead(format!("session index: {e}")))?;
                    (index, r.etag)
                }
                None => (SessionIndex::empty(0), String::new()),
            };
            patch(&mut index);
            let body = serde_json::to_vec(&index)?;
            let put = self
                .store
                .put(
                    SESSION_INDEX_KEY,
                    body,
                    PutOptions { if_match_etag: Some(etag) },
                )
                .await
                .map_err(|e| CoreError::StorageWrite(e.to_string()))?;
            Ok(put.map(|_| ()))
        })
        .await;

        result.map_err(|e| match e {
            RetryError::Exhausted => CoreError::StorageWrite("_index".to_string()),
            RetryError::Op(inner) => inner,
        })
    }
}
