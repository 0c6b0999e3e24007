#![forbid(unsafe_code)]

//! `nexus-research`: human-in-the-loop research report workflow.
//!
//! A checkpointed orchestrator drives each session from plan generation
//! through reviewer feedback to a final report, behind a small HTTP API
//! with transcription and PDF helpers.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod render;
pub mod stages;
pub mod transcribe;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
