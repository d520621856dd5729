use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{catalog::CatalogError, export::ExportError},
    infra::error::InfraError,
};

/// Flattened view of an error and its source chain, outermost first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    /// Innermost message, usually the most specific one.
    pub fn root_cause(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<CatalogError> for AppError {
    fn from(error: CatalogError) -> Self {
        Self::Export(ExportError::InvalidDocument(error))
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code: `2` for input the user can fix, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Export(ExportError::InvalidDocument(_)) | AppError::Validation(_) => 2,
            AppError::Export(_) | AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}
