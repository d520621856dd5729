//! Port for turning a workspace document into a view catalog.

use thiserror::Error;

use crate::domain::{DomainError, ViewCatalog};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("workspace document is empty")]
    Empty,
    #[error("workspace document is malformed: {message}")]
    Malformed { message: String },
    #[error("workspace document is missing `{field}`")]
    MissingField { field: &'static str },
    #[error("workspace document field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

impl CatalogError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Extracts categorised views from a source document. Extraction runs before
/// any render task is scheduled, so an error here aborts the export cheaply.
pub trait CatalogExtractor: Send + Sync {
    fn extract(&self, document: &str) -> Result<ViewCatalog, CatalogError>;
}
