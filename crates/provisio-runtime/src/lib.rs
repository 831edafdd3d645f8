//! # Provisio Runtime
//!
//! The orchestrator: task lifecycle state machine and workflow coordinator.
//! Wires the planner, safety manager, executor, verifier, and stores into the
//! task-execution pipeline:
//!
//! `Task → Planner → safety gate → approval gate → Executor → Verifier →
//! post-execution review → result`

mod orchestrator;

pub use orchestrator::{
    Orchestrator, OrchestratorError, Statistics, TaskFilter, TaskResume, TaskRun,
};
