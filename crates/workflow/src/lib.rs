// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! scp-workflow: the five-step task-execution workflow (spec §4.3,
//! component I) plus a minimal durable-step-engine abstraction with
//! memoized replay. Grounded on the teacher's `engine::executor` (timed,
//! traced, per-effect execution) for the step-call shape, and on
//! `daemon::adapters::credential`'s idempotent check-then-act pattern for
//! `prepare_sandbox`'s "is it already configured" checks.

pub mod engine;
pub mod memo;
pub mod steps;

pub use engine::{LocalWorkflowEngine, WorkflowDeps, WorkflowEngine, WorkflowError};
pub use memo::StepMemo;
pub use steps::{run_task_workflow, PrepareResult, TaskParams, TaskResult, OPENCODE_STORAGE_DIR};
