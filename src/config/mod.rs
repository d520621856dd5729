//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::ImageFormat;

pub use cli::{CliArgs, Command, ExportArgs, InspectArgs, LoggingOverrides, RenderOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "c4-image-export";
const ENV_PREFIX: &str = "C4EXPORT";
pub(crate) const DEFAULT_CLI_PATH: &str = "mmdc";
pub(crate) const DEFAULT_CACHE_DIR: &str = "/tmp/c4-image-export-cache";
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub render: RenderSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub cli_path: PathBuf,
    pub cache_dir: PathBuf,
    /// `None` sizes the pool from host parallelism.
    pub workers: Option<NonZeroUsize>,
    /// `None` lets a render run for as long as it takes.
    pub task_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub default_format: ImageFormat,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_logging_overrides(&cli.logging);
    match &cli.command {
        Command::Export(args) => raw.apply_render_overrides(&args.render),
        Command::Inspect(_) => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    export: RawExportSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(path) = overrides.cli_path.as_ref() {
            self.render.cli_path = Some(path.clone());
        }
        if let Some(dir) = overrides.cache_dir.as_ref() {
            self.render.cache_dir = Some(dir.clone());
        }
        if let Some(workers) = overrides.workers {
            self.render.workers = Some(workers);
        }
        if let Some(seconds) = overrides.task_timeout_seconds {
            self.render.task_timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            render,
            export,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;
        let export = build_export_settings(export)?;

        Ok(Self {
            logging,
            render,
            export,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let cli_path = render
        .cli_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CLI_PATH));
    if cli_path.as_os_str().is_empty() {
        return Err(LoadError::invalid("render.cli_path", "path must not be empty"));
    }

    let cache_dir = render
        .cache_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    if cache_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.cache_dir",
            "path must not be empty",
        ));
    }

    let workers = render
        .workers
        .map(|value| non_zero_usize(value, "render.workers"))
        .transpose()?;

    let timeout_seconds = render
        .task_timeout_seconds
        .unwrap_or(DEFAULT_TASK_TIMEOUT_SECS);
    let task_timeout = (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds));

    Ok(RenderSettings {
        cli_path,
        cache_dir,
        workers,
        task_timeout,
    })
}

fn build_export_settings(export: RawExportSettings) -> Result<ExportSettings, LoadError> {
    let default_format = match export.default_format {
        Some(value) => ImageFormat::from_str(&value)
            .map_err(|err| LoadError::invalid("export.default_format", err.to_string()))?,
        None => ImageFormat::Png,
    };

    Ok(ExportSettings { default_format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    cli_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    workers: Option<u64>,
    task_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawExportSettings {
    default_format: Option<String>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
