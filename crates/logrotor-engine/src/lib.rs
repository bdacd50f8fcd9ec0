//! logrotor Engine - rotation policy evaluation and execution
//!
//! [`Engine::run`] takes the configured groups and the current state table,
//! rotates whatever is due and hands back the updated table together with a
//! [`RunReport`]. Persisting the table is the caller's job.

pub mod compress;
mod executor;
pub mod history;
pub mod metadata;
pub mod policy;
mod report;
mod rotation;

pub use policy::{evaluate, Decision, FileStat, SkipReason, Trigger};
pub use report::{FileOutcome, Outcome, RunReport};
pub use rotation::{Engine, PlanEntry};
