use std::{
    fs,
    io::{self, ErrorKind, Write},
    path::PathBuf,
    process::{Command, Stdio},
    time::Instant,
};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{DiagramRenderer, RenderError};
use crate::domain::ImageFormat;

#[derive(Debug, Error)]
pub enum CliRenderError {
    #[error("failed to prepare cache directory: {0}")]
    CacheInit(io::Error),
    #[error("failed to write temporary file: {0}")]
    Io(io::Error),
    #[error("diagram CLI invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("diagram CLI unavailable: {0}")]
    NotFound(io::Error),
    #[error("failed to read rendered diagram: {0}")]
    Read(io::Error),
    #[error("diagram CLI produced no output")]
    EmptyOutput,
}

impl From<CliRenderError> for RenderError {
    fn from(err: CliRenderError) -> Self {
        match err {
            CliRenderError::NotFound(_) | CliRenderError::CacheInit(_) => RenderError::Unavailable {
                message: err.to_string(),
            },
            CliRenderError::Cli { .. } => RenderError::malformed(err.to_string()),
            CliRenderError::Io(_) | CliRenderError::Read(_) | CliRenderError::EmptyOutput => {
                RenderError::failed(err.to_string())
            }
        }
    }
}

/// Renders diagrams by shelling out to a Mermaid-compatible CLI
/// (`--input`, `--output`, `--outputFormat`, `--quiet`).
///
/// Output is cached on disk keyed by the SHA-256 of format and source, so
/// re-exporting an unchanged workspace skips the CLI entirely.
#[derive(Debug, Clone)]
pub struct CliRenderer {
    cli_path: PathBuf,
    cache_dir: PathBuf,
}

impl CliRenderer {
    pub fn new(cli_path: PathBuf, cache_dir: PathBuf) -> Result<Self, CliRenderError> {
        fs::create_dir_all(&cache_dir).map_err(CliRenderError::CacheInit)?;
        Ok(Self {
            cli_path,
            cache_dir,
        })
    }

    pub fn render_bytes(
        &self,
        source: &str,
        format: ImageFormat,
    ) -> Result<Vec<u8>, CliRenderError> {
        let started_at = Instant::now();
        let cache_key = hash_source(source, format);
        let cache_path = self
            .cache_dir
            .join(format!("{cache_key}.{}", format.extension()));
        match fs::read(&cache_path) {
            Ok(bytes) if !bytes.is_empty() => {
                debug!(
                    target = "application::render::cli",
                    op = "cli::render_bytes",
                    result = "cache_hit",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    cache_path = %cache_path.display(),
                    output_bytes = bytes.len(),
                    "Diagram served from cache"
                );
                return Ok(bytes);
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(
                    target = "application::render::cli",
                    op = "cli::render_bytes",
                    result = "cache_read_error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    cache_path = %cache_path.display(),
                    error = %err,
                    "Failed to read cached diagram; re-rendering"
                );
            }
        }

        let mut input_file = NamedTempFile::new().map_err(CliRenderError::Io)?;
        input_file
            .write_all(source.as_bytes())
            .map_err(CliRenderError::Io)?;
        input_file.flush().map_err(CliRenderError::Io)?;

        let output_file = tempfile::Builder::new()
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(&self.cache_dir)
            .map_err(CliRenderError::Io)?;
        let output_path = output_file.path().to_path_buf();

        let cli_started_at = Instant::now();
        let output = Command::new(&self.cli_path)
            .arg("--input")
            .arg(input_file.path())
            .arg("--output")
            .arg(&output_path)
            .arg("--outputFormat")
            .arg(format.extension())
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                warn!(
                    target = "application::render::cli",
                    op = "cli::render_bytes",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    error = %err,
                    "Failed to spawn diagram CLI"
                );
                if err.kind() == ErrorKind::NotFound {
                    CliRenderError::NotFound(err)
                } else {
                    CliRenderError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "application::render::cli",
                op = "cli::render_bytes",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "diagram_cli",
                stderr = %stderr,
                "Diagram CLI invocation failed"
            );
            return Err(CliRenderError::Cli { exit_code, stderr });
        }

        let produced = output_file
            .as_file()
            .metadata()
            .map_err(CliRenderError::Read)?
            .len();
        if produced == 0 {
            return Err(CliRenderError::EmptyOutput);
        }

        match output_file.persist(&cache_path) {
            Ok(_) => {}
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                // A concurrent export rendered the same diagram first.
            }
            Err(err) => return Err(CliRenderError::Io(err.error)),
        }

        let bytes = fs::read(&cache_path).map_err(CliRenderError::Read)?;

        debug!(
            target = "application::render::cli",
            op = "cli::render_bytes",
            result = "cache_miss",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
            cache_path = %cache_path.display(),
            output_bytes = bytes.len(),
            "Diagram rendered via CLI"
        );

        Ok(bytes)
    }
}

impl DiagramRenderer for CliRenderer {
    fn render(&self, definition: &str, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
        self.render_bytes(definition, format).map_err(RenderError::from)
    }
}

fn hash_source(source: &str, format: ImageFormat) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format.extension().as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}
