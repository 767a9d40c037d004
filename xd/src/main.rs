//! exportdesk - export job tracker
//!
//! CLI entry point for creating, watching and downloading exports.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use exportdesk::cli::{Cli, Command, FilterArgs, OutputFormat, get_log_path};
use exportdesk::config::Config;
use exportdesk::{
    ConsoleSink, ExportActions, ExportApi, ExportJob, ExportKind, HttpExportApi, JobListView, JobStore, Notifier,
    Poller, RetryTracker, spawn_emitter,
};

/// How often the CLI re-renders the job list while waiting
const RENDER_INTERVAL: Duration = Duration::from_millis(500);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    info!(base_url = %config.api.base_url, "exportdesk loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Export {
            kind,
            filters,
            no_wait,
            download,
        } => cmd_export(&config, kind, &filters, no_wait, download).await,
        Command::Status { id, format } => cmd_status(&config, &id, format).await,
        Command::Download { id, dir } => cmd_download(&config, &id, dir).await,
        Command::Config => cmd_config(&config),
    }
}

/// Everything a session needs, wired from config
struct Session {
    store: JobStore,
    actions: ExportActions,
    notifier: Notifier,
    retries: Arc<RetryTracker>,
}

impl Session {
    fn new(config: &Config, download_dir: PathBuf) -> Result<Self> {
        let api: Arc<dyn ExportApi> =
            Arc::new(HttpExportApi::from_config(&config.api).context("Failed to create export API client")?);
        let store = JobStore::spawn(api);
        let retries = Arc::new(RetryTracker::new(config.retry.max_attempts));
        let notifier = Notifier::new(Arc::new(ConsoleSink::new()), config.notifications.duration());
        let actions = ExportActions::new(store.clone(), retries.clone(), notifier.clone(), download_dir);
        Ok(Self {
            store,
            actions,
            notifier,
            retries,
        })
    }
}

/// Start an export and follow it
async fn cmd_export(config: &Config, kind: ExportKind, args: &FilterArgs, no_wait: bool, download: bool) -> Result<()> {
    debug!(%kind, no_wait, download, "cmd_export: called");
    let filters = args.to_filters().context("Invalid filters")?;
    filters.validate(kind).context("Invalid filters")?;

    let session = Session::new(config, config.download_dir.clone())?;
    let emitter = spawn_emitter(&session.store, session.notifier.clone());

    let Some(job) = session.actions.create(kind, filters.to_payload()).await else {
        return Err(eyre!("Export could not be created"));
    };

    if no_wait {
        println!("{} {}", "Export ID:".bold(), job.id.cyan());
        return Ok(());
    }

    let poller = Poller::new(
        session.store.clone(),
        session.retries.clone(),
        session.notifier.clone(),
        config.polling.interval(),
    )
    .spawn();

    let finished = wait_for_terminal(&session.store, &job.id).await?;
    poller.stop().await;

    // Let the emitter drain the final transition before rendering
    tokio::time::sleep(Duration::from_millis(50)).await;
    render_jobs(&session.store, config).await?;

    if download {
        match session.actions.download(&finished.id).await {
            Some(path) => println!("{} {}", "Saved:".bold(), path.display()),
            None => return Err(eyre!("Download failed")),
        }
    }

    emitter.abort();
    session.store.shutdown().await;
    Ok(())
}

/// Poll the store until `job_id` leaves processing
async fn wait_for_terminal(store: &JobStore, job_id: &str) -> Result<ExportJob> {
    let mut last_progress = None;
    loop {
        let job = store
            .get(job_id)
            .await?
            .ok_or_else(|| eyre!("Export {} is no longer tracked", job_id))?;

        if job.status.is_terminal() {
            return Ok(job);
        }

        let progress = job.display_progress().map(|p| p.round() as u32);
        if progress != last_progress {
            println!("{}", JobListView::format_row(&job).dimmed());
            last_progress = progress;
        }

        tokio::time::sleep(RENDER_INTERVAL).await;
    }
}

async fn render_jobs(store: &JobStore, config: &Config) -> Result<()> {
    let view = JobListView::new(store.jobs().await?, config.view.virtualization_threshold);
    if view.is_empty() {
        println!("No exports");
        return Ok(());
    }

    for job in view.window(0, config.view.virtualization_threshold) {
        println!("{}", JobListView::format_row(job));
    }
    if let Some(label) = view.clear_completed_label() {
        println!("{}", label.dimmed());
    }
    Ok(())
}

/// Show the server-side record for an export
async fn cmd_status(config: &Config, id: &str, format: OutputFormat) -> Result<()> {
    debug!(%id, ?format, "cmd_status: called");
    let api = HttpExportApi::from_config(&config.api).context("Failed to create export API client")?;
    let job = api
        .export_status(id)
        .await
        .context(format!("Failed to fetch status for {}", id))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&job)?),
        OutputFormat::Text => {
            println!("{}", JobListView::format_row(&job));
            if let Some(error) = &job.error {
                println!("  {} {}", "error:".red(), error);
            }
            if let Some(expires_at) = job.expires_at {
                println!("  expires: {}", expires_at.format("%Y-%m-%d %H:%M"));
            }
        }
    }
    Ok(())
}

/// Download an export tracked only on the server
async fn cmd_download(config: &Config, id: &str, dir: Option<PathBuf>) -> Result<()> {
    debug!(%id, ?dir, "cmd_download: called");
    let session = Session::new(config, dir.unwrap_or_else(|| config.download_dir.clone()))?;

    // Track the server record so the usual download checks apply
    let job = session
        .store
        .api()
        .export_status(id)
        .await
        .context(format!("Failed to fetch status for {}", id))?;
    session.store.track(job).await?;

    match session.actions.download(id).await {
        Some(path) => {
            println!("{} {}", "Saved:".bold(), path.display());
            Ok(())
        }
        None => Err(eyre!("Download failed")),
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
