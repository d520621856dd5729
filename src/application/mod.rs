//! Application services layer.

pub mod catalog;
pub mod error;
pub mod export;
pub mod render;
