//! One-way reconciliation of a replica tree against a source tree.

mod action_log;
mod sync_engine;

#[cfg(test)]
pub use action_log::MemoryLog;
pub use action_log::{ActionLog, RunLog};
pub use sync_engine::SyncEngine;
