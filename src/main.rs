use std::{
    io::Write,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use c4_image_export::{
    application::{
        catalog::CatalogExtractor,
        error::AppError,
        export::{ExportReport, ExportService, RenderPool, default_worker_count},
        render::CliRenderer,
    },
    config,
    infra::{error::InfraError, telemetry, workspace::JsonWorkspaceExtractor},
};
use tempfile::NamedTempFile;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(load_error)?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Export(args) => run_export(settings, args).await,
        config::Command::Inspect(args) => run_inspect(args).await,
    }
}

/// Rejected values are the user's to fix; a configuration source that cannot
/// be read or parsed is not.
fn load_error(err: config::LoadError) -> AppError {
    match err {
        config::LoadError::Invalid { .. } => AppError::validation(err.to_string()),
        config::LoadError::Build(_) => {
            AppError::unexpected(format!("failed to load configuration: {err}"))
        }
    }
}

async fn run_export(settings: config::Settings, args: config::ExportArgs) -> Result<(), AppError> {
    let format = args.format.unwrap_or(settings.export.default_format);
    let document = read_workspace(&args.workspace).await?;

    let renderer = CliRenderer::new(
        settings.render.cli_path.clone(),
        settings.render.cache_dir.clone(),
    )
    .map_err(|err| AppError::unexpected(err.to_string()))?;
    let pool = RenderPool::new(
        settings.render.workers.unwrap_or_else(default_worker_count),
        settings.render.task_timeout,
    );
    let service = ExportService::new(
        pool,
        Arc::new(renderer),
        Arc::new(JsonWorkspaceExtractor::new()),
    );

    info!(
        target = "c4_image_export::export",
        workspace = %args.workspace.display(),
        output = %args.output.display(),
        format = %format,
        workers = service.pool().workers(),
        "Starting export"
    );

    let report = service.export(&document, format).await?;
    write_atomically(&args.output, &report.archive)?;
    print_summary(&report, &args.output);
    Ok(())
}

async fn run_inspect(args: config::InspectArgs) -> Result<(), AppError> {
    let document = read_workspace(&args.workspace).await?;
    let catalog = JsonWorkspaceExtractor::new().extract(&document)?;

    println!("workspace: {}", catalog.workspace_name());
    for (category, views) in catalog.iter() {
        println!("  {category}: {}", views.len());
        for view in views {
            println!("    - {}", view.key());
        }
    }
    println!("total views: {}", catalog.len());
    Ok(())
}

async fn read_workspace(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::read_workspace(path, err)))
}

/// Write through a temp file in the destination directory so readers never
/// observe a half-written archive.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut file = NamedTempFile::new_in(&parent).map_err(InfraError::from)?;
    file.write_all(bytes).map_err(InfraError::from)?;
    file.as_file().sync_all().map_err(InfraError::from)?;
    file.persist(path)
        .map_err(|err| InfraError::from(err.error))?;
    Ok(())
}

fn print_summary(report: &ExportReport, output: &Path) {
    println!(
        "wrote {} diagram(s) for `{}` to {} ({} bytes)",
        report.rendered_count(),
        report.workspace_name,
        output.display(),
        report.archive.len()
    );

    for failure in &report.failures {
        eprintln!(
            "warning: skipped {}/{}: {}",
            failure.category, failure.view_key, failure.message
        );
    }
}
