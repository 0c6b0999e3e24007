//! HTTP handlers grouped by concern.

pub mod health;
pub mod media;
pub mod research;
