use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::ImageFormat;

/// Command-line arguments for the c4-image-export binary.
#[derive(Debug, Parser)]
#[command(
    name = "c4-image-export",
    version,
    about = "Render every view of a C4 workspace and package the images into a ZIP archive"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "C4EXPORT_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render all views of a workspace into a ZIP archive.
    Export(ExportArgs),
    /// Validate a workspace document and list its views without rendering.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the diagram CLI executable used for rendering.
    #[arg(long = "render-cli-path", value_name = "PATH")]
    pub cli_path: Option<PathBuf>,

    /// Override the directory used to cache rendered diagrams.
    #[arg(long = "render-cache-dir", value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Override the number of concurrent render workers.
    #[arg(long = "render-workers", value_name = "COUNT")]
    pub workers: Option<u64>,

    /// Override the per-view render timeout; 0 disables it.
    #[arg(long = "render-task-timeout-seconds", value_name = "SECONDS")]
    pub task_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Image format for every view (png|svg|pdf); defaults to `export.default_format`.
    #[arg(long, short = 'f', value_name = "FORMAT")]
    pub format: Option<ImageFormat>,

    /// Path of the ZIP archive to write.
    #[arg(long, short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Workspace JSON document.
    #[arg(value_name = "WORKSPACE", value_hint = ValueHint::FilePath)]
    pub workspace: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Workspace JSON document.
    #[arg(value_name = "WORKSPACE", value_hint = ValueHint::FilePath)]
    pub workspace: PathBuf,
}
