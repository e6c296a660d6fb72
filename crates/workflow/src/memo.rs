// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step output memoization: each named step's result is persisted to the
//! object store under `workflows/{id}/steps/{name}.json` so that replaying
//! the same workflow id short-circuits completed steps instead of
//! re-running their side effects (spec §4.3: "each step's output is
//! memoized by the workflow engine, and on replay steps with existing
//! outputs are skipped").
//!
//! No teacher counterpart for durable replay specifically — the teacher's
//! WAL replay is the nearest relative, generalized here to persist through
//! the `ObjectStore` trait rather than a local WAL file.

use scp_core::CoreError;
use scp_storage::{ObjectStore, PutOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

fn step_key(workflow_id: &str, step: &str) -> String {
    format!("workflows/{workflow_id}/steps/{step}.json")
}

/// Memoizes step outputs for one workflow instance.
pub struct StepMemo<'a> {
    object_store: &'a dyn ObjectStore,
    workflow_id: &'a str,
}

impl<'a> StepMemo<'a> {
    pub fn new(object_store: &'a dyn ObjectStore, workflow_id: &'a str) -> Self {
        Self { object_store, workflow_id }
    }

    async fn read_cached<T: DeserializeOwned>(&self, step: &str) -> Option<T> {
        let key = step_key(self.workflow_id, step);
        let result = self.object_store.get(&key).await.ok()??;
        serde_json::from_slice(&result.body).ok()
    }

    async fn store<T: Serialize>(&self, step: &str, value: &T) {
        let key = step_key(self.workflow_id, step);
        if let Ok(body) = serde_json::to_vec(value) {
            let _ = self.object_store.put(&key, body, PutOptions::default()).await;
        }
    }

    /// Run a fallible step. A cached output short-circuits the closure
    /// entirely — its side effects never re-run on replay.
    pub async fn run<T, F, Fut>(&self, step: &str, f: F) -> Result<T, CoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if let Some(cached) = self.read_cached::<T>(step).await {
            tracing::info!(workflow_id = self.workflow_id, step, "replaying memoized step output");
            return Ok(cached);
        }

        let start = Instant::now();
        tracing::info!(workflow_id = self.workflow_id, step, "step started");
        let result = f().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(value) => {
                self.store(step, value).await;
                tracing::info!(workflow_id = self.workflow_id, step, elapsed_ms, "step completed");
            }
            Err(e) => {
                tracing::error!(workflow_id = self.workflow_id, step, elapsed_ms, error = %e, "step failed");
            }
        }
        result
    }

    /// Run a step that never fails (spec §4.3 step 3: `execute-task` never
    /// throws to the workflow engine). Still memoized for replay.
    pub async fn run_always<T, F, Fut>(&self, step: &str, f: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(cached) = self.read_cached::<T>(step).await {
            tracing::info!(workflow_id = self.workflow_id, step, "replaying memoized step output");
            return cached;
        }

        let start = Instant::now();
        tracing::info!(workflow_id = self.workflow_id, step, "step started");
        let value = f().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.store(step, &value).await;
        tracing::info!(workflow_id = self.workflow_id, step, elapsed_ms, "step completed");
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp_storage::InMemoryObjectStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn replays_cached_step_without_rerunning_the_closure() {
        let store = InMemoryObjectStore::new();
        let memo = StepMemo::new(&store, "run-aaaaaaaa");
        let calls = AtomicU32::new(0);

        let first: Result<u32, CoreError> = memo
            .run("prepare-sandbox", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7u32) }
            })
            .await;
        assert_eq!(first.unwrap(), 7);

        let second: Result<u32, CoreError> = memo
            .run("prepare-sandbox", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(99u32) }
            })
            .await;
        assert_eq!(second.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_steps_are_not_memoized() {
        let store = InMemoryObjectStore::new();
        let memo = StepMemo::new(&store, "run-bbbbbbbb");

        let first: Result<u32, CoreError> =
            memo.run("create-run", || async { Err(CoreError::Validation("boom".into())) }).await;
        assert!(first.is_err());

        let second: Result<u32, CoreError> = memo.run("create-run", || async { Ok(1) }).await;
        assert_eq!(second.unwrap(), 1);
    }
}
