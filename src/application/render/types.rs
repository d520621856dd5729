use thiserror::Error;

use crate::domain::ImageFormat;

/// Structured errors surfaced by a renderer. They end up as the diagnostic
/// message of a failed render outcome, so they should read well on their own.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("malformed diagram definition: {message}")]
    Malformed { message: String },
    #[error("renderer unavailable: {message}")]
    Unavailable { message: String },
    #[error("renderer failed: {message}")]
    Failed { message: String },
}

impl RenderError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Turns one view definition into image bytes.
///
/// Implementations are invoked concurrently from pool workers and must not
/// rely on call ordering.
pub trait DiagramRenderer: Send + Sync {
    fn render(&self, definition: &str, format: ImageFormat) -> Result<Vec<u8>, RenderError>;
}

impl<F> DiagramRenderer for F
where
    F: Fn(&str, ImageFormat) -> Result<Vec<u8>, RenderError> + Send + Sync,
{
    fn render(&self, definition: &str, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
        self(definition, format)
    }
}
