//! Deterministic, pure logic shared by the planner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! plan snapshots and return deterministic outputs suitable for tests.

pub mod invariants;
pub mod query;
pub mod render;
pub mod selector;
pub mod state_update;
pub mod types;
