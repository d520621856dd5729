//! Domain layer types and invariants.

pub mod error;
pub mod format;
pub mod views;

pub use error::DomainError;
pub use format::{ImageFormat, UnsupportedFormat};
pub use views::{ViewCatalog, ViewCategory, ViewDefinition};
