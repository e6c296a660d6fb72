// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `RunStore` — CRUD over run records plus the *global* run index (spec
//! §4.2/D). Same grounding as `sessions.rs`.

use crate::keys::{run_key, RUN_INDEX_KEY};
use crate::object_store::{ObjectStore, PutOptions};
use crate::retry::{retry_with_backoff, RetryError};
use scp_core::{CoreError, Run, RunId, RunIndex, RunIndexEntry, RunResult, RunStatus, SessionId};
use std::sync::Arc;

#[derive(Default)]
pub struct ListRunsParams {
    pub session_id: Option<SessionId>,
    pub status: Option<RunStatus>,
    pub before: Option<u64>,
    pub limit: usize,
}

impl ListRunsParams {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, ..Default::default() }
    }
}

pub struct ListRunsResult {
    pub entries: Vec<RunIndexEntry>,
    /// Filtered count before `limit` is applied.
    pub total: usize,
}

pub struct CompleteRunParams {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub title: Option<String>,
}

pub struct RunStore {
    store: Arc<dyn ObjectStore>,
}

impl RunStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn get_run(&self, id: &RunId) -> Result<Option<Run>, CoreError> {
        let Some(result) = self
            .store
            .get(&run_key(id))
            .await
            .map_err(|e| CoreError::StorageRead(e.to_string()))?
        else {
            return Ok(None);
        };
        let run: Run = serde_json::from_slice(&result.body)
            .map_err(|e| CoreError::StorageRead(format!("run {id}: {e}")))?;
        Ok(Some(run))
    }

    pub async fn put_run(&self, run: &Run) -> Result<(), CoreError> {
        let body = serde_json::to_vec(run)?;
        self.store
            .put(&run_key(&run.run_id), body, PutOptions::default())
            .await
            .map_err(|e| CoreError::StorageWrite(format!("run {}: {e}", run.run_id)))?;

        let entry = RunIndexEntry::from(run);
        self.upsert_index_entry(entry).await
    }

    /// Spec §4.2: read existing run (fail if absent), set terminal status,
    /// stamp `completedAt`, keep the existing title unless overridden,
    /// write the record, update the index.
    pub async fn complete_run(
        &self,
        id: &RunId,
        params: CompleteRunParams,
        now_ms: u64,
    ) -> Result<Run, CoreError> {
        let mut run = self
            .get_run(id)
            .await?
            .ok_or_else(|| CoreError::StorageRead("Run not found".to_string()))?;

        run.status = if params.success { RunStatus::Completed } else { RunStatus::Failed };
        run.completed_at = Some(now_ms);
        if let Some(title) = params.title {
            run.title = title;
        }
        run.result = Some(RunResult {
            success: params.success,
            output: params.output.unwrap_or_default(),
            error: params.error,
        });

        self.put_run(&run).await?;
        Ok(run)
    }

    pub async fn delete_run(&self, id: &RunId) -> Result<(), CoreError> {
        self.store
            .delete(&run_key(id))
            .await
            .map_err(|e| CoreError::StorageWrite(format!("run {id}: {e}")))?;
        self.remove_index_entry(id).await
    }

    /// Cascade delete: update the index first (make rows invisible to
    /// listings), then best-effort delete the underlying records. The
    /// affected ids are read up front rather than smuggled out of the
    /// retried patch closure, so there is no shared mutable state between
    /// the two phases.
    pub async fn delete_runs_for_session(&self, session_id: &SessionId) -> Result<(), CoreError> {
        let ids: Vec<RunId> = self
            .read_index()
            .await?
            .runs
            .into_values()
            .filter(|e| &e.session_id == session_id)
            .map(|e| e.run_id)
            .collect();

        let session_id_owned = session_id.clone();
        self.update_index(move |index| {
            index.remove_for_session(&session_id_owned, index.updated_at);
        })
        .await?;

        for id in ids {
            // Best-effort: index already made these invisible.
            let _ = self.store.delete(&run_key(&id)).await;
        }
        Ok(())
    }

    pub async fn list_runs(&self, params: ListRunsParams) -> Result<ListRunsResult, CoreError> {
        let index = self.read_index().await?;
        let mut entries: Vec<RunIndexEntry> = index
            .runs
            .into_values()
            .filter(|e| params.session_id.as_ref().map_or(true, |s| &e.session_id == s))
            .filter(|e| params.status.map_or(true, |s| e.status == s))
            .filter(|e| params.before.map_or(true, |b| e.started_at < b))
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total = entries.len();
        let limit = if params.limit == 0 { total } else { params.limit };
        let page = entries.into_iter().take(limit).collect();
        Ok(ListRunsResult { entries: page, total })
    }

    async fn read_index(&self) -> Result<RunIndex, CoreError> {
        match self
            .store
            .get(RUN_INDEX_KEY)
            .await
            .map_err(|e| CoreError::StorageRead(e.to_string()))?
        {
            Some(result) => serde_json::from_slice(&result.body)
                .map_err(|e| CoreError::StorageRead(format!("run index: {e}"))),
            None => Ok(RunIndex::empty(0)),
        }
    }

    async fn upsert_index_entry(&self, entry: RunIndexEntry) -> Result<(), CoreError> {
        let now = entry.started_at;
        self.update_index(move |index| index.upsert(entry.clone(), now))
            .await
    }

    async fn remove_index_entry(&self, id: &RunId) -> Result<(), CoreError> {
        let id = id.clone();
        self.update_index(move |index| index.remove(&id, index.updated_at))
            .await
    }

    async fn update_index(
        &self,
        patch: impl Fn(&mut RunIndex) + Send + Sync,
    ) -> Result<(), CoreError> {
        let result: Result<(), RetryError<CoreError>> = retry_with_backoff(|| async {
            let (mut index, etag) = match self
                .store
                .get(RUN_INDEX_KEY)
                .await
                .map_err(|e| CoreError::StorageWrite(e.to_string()))?
            {
                Some(r) => {
                    let index: RunIndex = serde_json::from_slice(&r.body)
                        .map_err(|e| CoreError::StorageRead(format!("run index: {e}")))?;
                    (index, r.etag)
                }
                None => (RunIndex::empty(0), String::new()),
            };
            patch(&mut index);
            let body = serde_json::to_vec(&index)?;
            let put = self
                .store
                .put(RUN_INDEX_KEY, body, PutOptions { if_match_etag: Some(etag) })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::InMemoryObjectStore;
    use scp_core::test_support::RunBuilder;

    fn run(id: &str, session: &str, status: RunStatus, started_at: u64) -> Run {
        RunBuilder::default()
            .run_id(id)
            .session_id(session)
            .status(status)
            .started_at(started_at)
            .build()
    }

    #[tokio::test]
    async fn complete_run_sets_terminal_status_and_result() {
        let store = RunStore::new(Arc::new(InMemoryObjectStore::new()));
        let r = run("run-aaaaaaaa", "s1", RunStatus::Started, 100);
        store.put_run(&r).await.unwrap();

        let completed = store
            .complete_run(
                &r.run_id,
                CompleteRunParams {
                    success: true,
                    output: Some("done".into()),
                    error: None,
                    title: None,
                },
                200,
            )
            .await
            .unwrap();

        assert_eq!(completed.status, RunStatus::Completed);
        assert_eq!(completed.completed_at, Some(200));
        assert_eq!(completed.result.unwrap().output, "done");
        assert_eq!(completed.title, r.title);
    }

    #[tokio::test]
    async fn complete_run_missing_fails() {
        let store = RunStore::new(Arc::new(InMemoryObjectStore::new()));
        let err = store
            .complete_run(
                &RunId::from_raw("run-ffffffff"),
                CompleteRunParams { success: true, output: None, error: None, title: None },
                1,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StorageRead(_)));
    }

    #[tokio::test]
    async fn list_runs_filters_by_session_status_and_before() {
        let store = RunStore::new(Arc::new(InMemoryObjectStore::new()));
        store.put_run(&run("run-a0000000", "x", RunStatus::Completed, 100)).await.unwrap();
        store.put_run(&run("run-b0000000", "x", RunStatus::Failed, 200)).await.unwrap();
        store.put_run(&run("run-c0000000", "x", RunStatus::Completed, 300)).await.unwrap();
        store.put_run(&run("run-d0000000", "y", RunStatus::Completed, 400)).await.unwrap();

        let result = store
            .list_runs(ListRunsParams {
                session_id: Some(SessionId::parse("x").unwrap()),
                status: Some(RunStatus::Completed),
                before: None,
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.entries[0].run_id.as_str(), "run-c0000000");

        let before = store
            .list_runs(ListRunsParams {
                session_id: Some(SessionId::parse("x").unwrap()),
                status: Some(RunStatus::Completed),
                before: Some(300),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(before.total, 1);
        assert_eq!(before.entries[0].run_id.as_str(), "run-a0000000");
    }

    #[tokio::test]
    async fn cascade_delete_removes_only_target_session_runs() {
        let store = RunStore::new(Arc::new(InMemoryObjectStore::new()));
        store.put_run(&run("run-a0000000", "x", RunStatus::Completed, 100)).await.unwrap();
        store.put_run(&run("run-b0000000", "x", RunStatus::Completed, 200)).await.unwrap();
        store.put_run(&run("run-c0000000", "y", RunStatus::Completed, 300)).await.unwrap();

        store.delete_runs_for_session(&SessionId::parse("x").unwrap()).await.unwrap();

        let x = store
            .list_runs(ListRunsParams { session_id: Some(SessionId::parse("x").unwrap()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(x.total, 0);

        let y = store
            .list_runs(ListRunsParams { session_id: Some(SessionId::parse("y").unwrap()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(y.total, 1);
    }
}
