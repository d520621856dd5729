use std::time::Duration;

use uuid::Uuid;

use crate::domain::{ImageFormat, ViewCategory};

use super::tasks::RenderTask;

/// Image bytes for one successfully rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub category: ViewCategory,
    pub view_key: String,
    pub archive_path: String,
    pub bytes: Vec<u8>,
}

/// Diagnostic for a view that could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub category: ViewCategory,
    pub view_key: String,
    pub archive_path: String,
    pub message: String,
}

/// Terminal result of one render task. Exactly one is produced per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(RenderedDiagram),
    Failed(RenderFailure),
}

impl RenderOutcome {
    pub fn rendered(task: &RenderTask, archive_path: String, bytes: Vec<u8>) -> Self {
        Self::Rendered(RenderedDiagram {
            category: task.category(),
            view_key: task.view_key().to_string(),
            archive_path,
            bytes,
        })
    }

    pub fn failed(task: &RenderTask, archive_path: String, message: impl Into<String>) -> Self {
        Self::Failed(RenderFailure {
            category: task.category(),
            view_key: task.view_key().to_string(),
            archive_path,
            message: message.into(),
        })
    }

    pub fn archive_path(&self) -> &str {
        match self {
            RenderOutcome::Rendered(diagram) => &diagram.archive_path,
            RenderOutcome::Failed(failure) => &failure.archive_path,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered(_))
    }
}

/// Successful export: the archive plus diagnostics for views that were
/// dropped along the way.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub export_id: Uuid,
    pub workspace_name: String,
    pub format: ImageFormat,
    /// ZIP archive bytes.
    pub archive: Vec<u8>,
    /// Archive entry paths, sorted.
    pub entries: Vec<String>,
    pub failures: Vec<RenderFailure>,
    pub elapsed: Duration,
}

impl ExportReport {
    /// Number of views that made it into the archive.
    pub fn rendered_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
