//! Objective planning and execution engine.
//!
//! An objective is decomposed by a text-generation collaborator into a task
//! graph, executed by a task-execution collaborator under one of four
//! strategies (sequential, bounded-parallel, hierarchical, adaptive), and
//! summarized. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic over plan snapshots (queries,
//!   readiness, state updates, invariants, rendering). No I/O.
//! - **[`parse`]**: Pure text grammars turning collaborator output into tasks.
//! - **[`io`]**: Side-effecting operations (config files, child processes,
//!   prompt rendering, progress broadcast).
//!
//! Orchestration modules ([`strategy`], [`exec`], [`replan`], [`summary`],
//! [`engine`]) combine core logic with collaborators.

pub mod core;
pub mod engine;
pub mod exec;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod parse;
pub mod plan;
pub mod replan;
pub mod strategy;
pub mod summary;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
