//! Bounded render pool shared by every export in the process.

use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use futures::stream::{FuturesUnordered, TryStreamExt};
use thiserror::Error;
use tokio::{sync::Semaphore, task::spawn_blocking, time};
use tracing::{debug, warn};

use crate::{
    application::render::DiagramRenderer,
    domain::{ImageFormat, ViewCategory},
};

use super::{tasks::RenderTask, types::RenderOutcome};

/// Lower bound on pool size, regardless of host parallelism.
pub const MIN_WORKERS: usize = 2;

/// `max(2, available_parallelism - 1)`: leaves one core for the rest of the
/// process.
pub fn default_worker_count() -> NonZeroUsize {
    let available = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    NonZeroUsize::new(available.saturating_sub(1).max(MIN_WORKERS)).unwrap_or(NonZeroUsize::MIN)
}

/// Failures of the scheduling mechanism itself. Any of these fails the whole
/// batch because the completion barrier can no longer be satisfied.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("render pool is closed")]
    Closed,
    #[error("render worker for `{view_key}` in `{category}` was lost: {message}")]
    WorkerLost {
        category: ViewCategory,
        view_key: String,
        message: String,
    },
}

/// Process-wide render capacity.
///
/// Create one at startup and hand clones to every export; clones share the
/// same permits, so concurrent exports interleave on the same bounded
/// capacity. Each task holds a permit for as long as its render call runs.
#[derive(Debug, Clone)]
pub struct RenderPool {
    permits: Arc<Semaphore>,
    workers: NonZeroUsize,
    task_timeout: Option<Duration>,
}

impl RenderPool {
    pub fn new(workers: NonZeroUsize, task_timeout: Option<Duration>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.get())),
            workers,
            task_timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Stop admitting work. Batches submitted afterwards fail with
    /// [`PoolError::Closed`]; renders already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Fork-join over `tasks`: every task is submitted at once and the call
    /// returns only after each one has produced an outcome.
    ///
    /// Outcomes arrive in completion order, not submission order.
    pub async fn run(
        &self,
        tasks: Vec<RenderTask>,
        renderer: Arc<dyn DiagramRenderer>,
        workspace_name: &str,
        format: ImageFormat,
    ) -> Result<Vec<RenderOutcome>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        tasks
            .into_iter()
            .map(|task| {
                let archive_path = task.archive_path(workspace_name, format);
                self.run_task(task, archive_path, Arc::clone(&renderer), format)
            })
            .collect::<FuturesUnordered<_>>()
            .try_collect()
            .await
    }

    async fn run_task(
        &self,
        task: RenderTask,
        archive_path: String,
        renderer: Arc<dyn DiagramRenderer>,
        format: ImageFormat,
    ) -> Result<RenderOutcome, PoolError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let started_at = Instant::now();
        let view = Arc::clone(task.view());
        let handle = spawn_blocking(move || {
            let _permit = permit;
            panic::catch_unwind(AssertUnwindSafe(|| {
                renderer.render(view.definition(), format)
            }))
        });

        let joined = match self.task_timeout {
            Some(limit) => match time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        target = "application::export::pool",
                        op = "pool::run_task",
                        result = "timeout",
                        category = %task.category(),
                        view_key = task.view_key(),
                        timeout_ms = limit.as_millis() as u64,
                        "Render exceeded timeout; view will be dropped"
                    );
                    let message = format!("render timed out after {} ms", limit.as_millis());
                    return Ok(RenderOutcome::failed(&task, archive_path, message));
                }
            },
            None => handle.await,
        };

        let outcome = match joined {
            Ok(Ok(Ok(bytes))) if !bytes.is_empty() => {
                RenderOutcome::rendered(&task, archive_path, bytes)
            }
            Ok(Ok(Ok(_))) => RenderOutcome::failed(&task, archive_path, "renderer returned no bytes"),
            Ok(Ok(Err(err))) => RenderOutcome::failed(&task, archive_path, err.to_string()),
            Ok(Err(payload)) => RenderOutcome::failed(
                &task,
                archive_path,
                format!("renderer panicked: {}", panic_message(payload.as_ref())),
            ),
            Err(err) => {
                return Err(PoolError::WorkerLost {
                    category: task.category(),
                    view_key: task.view_key().to_string(),
                    message: err.to_string(),
                });
            }
        };

        let result = if outcome.is_rendered() {
            "rendered"
        } else {
            "failed"
        };
        debug!(
            target = "application::export::pool",
            op = "pool::run_task",
            result,
            category = %task.category(),
            view_key = task.view_key(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Render task finished"
        );

        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
