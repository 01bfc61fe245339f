//! MirrorSync - one-way directory mirroring
//!
//! Keeps a replica directory identical to a source directory by re-running a
//! synchronization pass on a fixed interval, appending every change to a log
//! file.

mod display;

use anyhow::{Context, Result};
use clap::Parser;
use display::{display_error, display_info, ConsoleReporter};
use mirrorsync_config::{ConfigLoader, LoggingConfig};
use mirrorsync_sync::{PeriodicSync, SyncEngine, SyncOptions, SyncRequest, TracingReporter};
use mirrorsync_types::SyncReporter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// MirrorSync - one-way directory mirroring
#[derive(Parser, Debug)]
#[command(
    name = "mirrorsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "One-way directory mirroring",
    long_about = "MirrorSync makes REPLICA an exact copy of SOURCE and keeps it that way.\n\
                  Every INTERVAL seconds, new files are copied, modified files are\n\
                  overwritten and files missing from SOURCE are deleted from REPLICA.\n\
                  Each change is appended to LOG_FILE."
)]
struct Cli {
    /// Source directory
    source: PathBuf,

    /// Replica directory
    replica: PathBuf,

    /// Seconds between synchronization passes
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Sync log file (appended to)
    log_file: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            println!("{}", e.render());
            return Ok(ExitCode::from(2));
        }
        Err(e) => e.exit(),
    };

    let config =
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = init_logging(&cli, &config.logging)?;
    if !config.logging.colored_output {
        console::set_colors_enabled(false);
    }

    info!("MirrorSync v{} starting", env!("CARGO_PKG_VERSION"));

    let reporter: Arc<dyn SyncReporter> = if config.logging.json_format {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ConsoleReporter::new(cli.quiet))
    };
    let engine =
        Arc::new(SyncEngine::new(SyncOptions::from(&config.sync)).with_reporter(reporter));
    let request = sync_request(&cli).context("Failed to resolve paths")?;

    if cli.once {
        let outcome = tokio::task::spawn_blocking(move || engine.synchronize(&request))
            .await
            .context("Sync pass panicked")?;
        return Ok(if outcome.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let scheduler = PeriodicSync::new(engine, request, Duration::from_secs(cli.interval))?;
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.shutdown(),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    if !cli.quiet {
        display_info(&format!(
            "Syncing every {}s, press Ctrl-C to stop",
            cli.interval
        ));
    }

    let summary = match scheduler.run().await {
        Ok(summary) => summary,
        Err(e) => {
            display_error(&e.to_string());
            return Err(e.into());
        }
    };
    info!(
        "Stopped after {} passes ({} aborted, {} failures)",
        summary.passes, summary.aborted, summary.failures
    );
    println!("Done");

    Ok(ExitCode::SUCCESS)
}

/// The request for `cli`'s paths, made absolute against the working directory
fn sync_request(cli: &Cli) -> std::io::Result<SyncRequest> {
    Ok(SyncRequest::new(
        std::path::absolute(&cli.source)?,
        std::path::absolute(&cli.replica)?,
        std::path::absolute(&cli.log_file)?,
    ))
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let (file_layer, guard) = match &logging.diagnostics_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .context("Diagnostics file path has no file name")?;
            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let initialized = if logging.json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_ansi(logging.colored_output),
            )
            .try_init()
    };
    initialized.context("Failed to initialize logging")?;

    Ok(guard)
}
