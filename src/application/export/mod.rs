//! Export pipeline: catalog → render tasks → bounded fan-out → collection →
//! ZIP archive.

mod archive;
mod collector;
mod phase;
mod pool;
mod tasks;
mod types;

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    application::{
        catalog::{CatalogError, CatalogExtractor},
        render::DiagramRenderer,
    },
    domain::{ImageFormat, ViewCatalog},
};

pub use archive::{ArchiveError, build_archive, write_archive};
pub use collector::{CollectedOutcomes, collect};
pub use phase::ExportPhase;
pub use pool::{MIN_WORKERS, PoolError, RenderPool, default_worker_count};
pub use tasks::{RenderTask, flatten};
pub use types::{ExportReport, RenderFailure, RenderOutcome, RenderedDiagram};

pub const METRIC_VIEWS_RENDERED_TOTAL: &str = "c4export_views_rendered_total";
pub const METRIC_VIEWS_FAILED_TOTAL: &str = "c4export_views_failed_total";
pub const METRIC_EXPORT_MS: &str = "c4export_export_ms";
pub const METRIC_ARCHIVE_BYTES: &str = "c4export_archive_bytes";

/// Batch-fatal export failures. Per-view render faults never surface here;
/// they are reported through [`ExportReport::failures`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid workspace document: {0}")]
    InvalidDocument(#[from] CatalogError),
    #[error("no diagrams rendered; all {} views failed", .failures.len())]
    NoDiagramsRendered { failures: Vec<RenderFailure> },
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Drives one export at a time per call; share a single instance (and its
/// pool) across concurrent callers.
#[derive(Clone)]
pub struct ExportService {
    pool: RenderPool,
    renderer: Arc<dyn DiagramRenderer>,
    extractor: Arc<dyn CatalogExtractor>,
}

enum CatalogSource<'a> {
    Document(&'a str),
    Catalog(&'a ViewCatalog),
}

impl ExportService {
    pub fn new(
        pool: RenderPool,
        renderer: Arc<dyn DiagramRenderer>,
        extractor: Arc<dyn CatalogExtractor>,
    ) -> Self {
        Self {
            pool,
            renderer,
            extractor,
        }
    }

    pub fn pool(&self) -> &RenderPool {
        &self.pool
    }

    /// Extract the catalog from `document` and export every view it names.
    pub async fn export(
        &self,
        document: &str,
        format: ImageFormat,
    ) -> Result<ExportReport, ExportError> {
        self.execute(CatalogSource::Document(document), format).await
    }

    /// Export an already-extracted catalog.
    pub async fn export_catalog(
        &self,
        catalog: &ViewCatalog,
        format: ImageFormat,
    ) -> Result<ExportReport, ExportError> {
        self.execute(CatalogSource::Catalog(catalog), format).await
    }

    async fn execute(
        &self,
        source: CatalogSource<'_>,
        format: ImageFormat,
    ) -> Result<ExportReport, ExportError> {
        let export_id = Uuid::new_v4();
        let span = info_span!(
            "export",
            export_id = %export_id,
            format = %format,
            workspace = tracing::field::Empty
        );

        async move {
            let started_at = Instant::now();
            let mut phase = PhaseTracker::new(export_id);

            let result = self
                .run_phases(&mut phase, export_id, source, format, started_at)
                .await;

            match &result {
                Ok(report) => {
                    phase.advance(ExportPhase::Done);
                    let outcome = if report.is_partial() { "partial" } else { "ok" };
                    histogram!(METRIC_EXPORT_MS, "result" => "ok")
                        .record(started_at.elapsed().as_secs_f64() * 1000.0);
                    histogram!(METRIC_ARCHIVE_BYTES).record(report.archive.len() as f64);
                    info!(
                        target = "application::export",
                        op = "export",
                        result = outcome,
                        rendered = report.rendered_count(),
                        failed = report.failures.len(),
                        archive_bytes = report.archive.len(),
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Export completed"
                    );
                }
                Err(err) => {
                    let failed_in = phase.current();
                    phase.advance(ExportPhase::Failed);
                    histogram!(METRIC_EXPORT_MS, "result" => "error")
                        .record(started_at.elapsed().as_secs_f64() * 1000.0);
                    warn!(
                        target = "application::export",
                        op = "export",
                        result = "error",
                        phase = %failed_in,
                        error = %err,
                        elapsed_ms = started_at.elapsed().as_millis() as u64,
                        "Export failed"
                    );
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run_phases(
        &self,
        phase: &mut PhaseTracker,
        export_id: Uuid,
        source: CatalogSource<'_>,
        format: ImageFormat,
        started_at: Instant,
    ) -> Result<ExportReport, ExportError> {
        let extracted;
        let catalog = match source {
            CatalogSource::Document(document) => {
                extracted = self.extractor.extract(document)?;
                &extracted
            }
            CatalogSource::Catalog(catalog) => catalog,
        };
        let workspace_name = catalog.workspace_name();
        tracing::Span::current().record("workspace", workspace_name);

        phase.advance(ExportPhase::FanningOut);
        let tasks = flatten(catalog);
        let submitted = tasks.len();
        debug!(
            target = "application::export",
            op = "flatten",
            tasks = submitted,
            workers = self.pool.workers(),
            "Submitting render tasks"
        );

        phase.advance(ExportPhase::BarrierWait);
        let outcomes = self
            .pool
            .run(tasks, Arc::clone(&self.renderer), workspace_name, format)
            .await?;

        phase.advance(ExportPhase::CollectingResults);
        let CollectedOutcomes { rendered, failures } = collect(outcomes);
        counter!(METRIC_VIEWS_RENDERED_TOTAL, "format" => format.extension())
            .increment(rendered.len() as u64);
        counter!(METRIC_VIEWS_FAILED_TOTAL, "format" => format.extension())
            .increment(failures.len() as u64);

        if rendered.is_empty() && !failures.is_empty() {
            return Err(ExportError::NoDiagramsRendered { failures });
        }

        phase.advance(ExportPhase::Archiving);
        let archive = build_archive(&rendered, format)?;
        let mut entries: Vec<String> = rendered
            .into_iter()
            .map(|diagram| diagram.archive_path)
            .collect();
        entries.sort();

        Ok(ExportReport {
            export_id,
            workspace_name: workspace_name.to_string(),
            format,
            archive,
            entries,
            failures,
            elapsed: started_at.elapsed(),
        })
    }
}

/// Logs every phase transition of one export.
struct PhaseTracker {
    export_id: Uuid,
    current: ExportPhase,
}

impl PhaseTracker {
    fn new(export_id: Uuid) -> Self {
        debug!(
            target = "application::export::phase",
            %export_id,
            phase = %ExportPhase::CollectingCatalog,
            "Export started"
        );
        Self {
            export_id,
            current: ExportPhase::CollectingCatalog,
        }
    }

    fn current(&self) -> ExportPhase {
        self.current
    }

    fn advance(&mut self, next: ExportPhase) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal export transition {} -> {}",
            self.current,
            next
        );
        debug!(
            target = "application::export::phase",
            export_id = %self.export_id,
            from = %self.current,
            to = %next,
            "Export phase changed"
        );
        self.current = next;
    }
}
