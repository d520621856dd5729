//! Parallel export of C4 workspace views into a single image archive.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
