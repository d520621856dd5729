//! Infrastructure adapters: telemetry and workspace document parsing.

pub mod error;
pub mod telemetry;
pub mod workspace;
