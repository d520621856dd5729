//! Renderer adapter boundary.
//!
//! The export pipeline treats rendering as an opaque, thread-safe and
//! potentially slow function from a view definition to image bytes. It never
//! retries: one failed call drops exactly one view from the archive.

mod cli;
mod types;

pub use cli::{CliRenderError, CliRenderer};
pub use types::{DiagramRenderer, RenderError};
