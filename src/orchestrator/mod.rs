//! Workflow orchestration modules.
//!
//! Covers the resumable research state machine, the session registry, and
//! per-session in-flight tracking.

pub mod guard;
pub mod registry;
pub mod workflow;

pub use workflow::{SessionSnapshot, Workflow};
