//! Lipdub - Lip-Synchronized Video Dubbing
//!
//! Command-line entry point: loads configuration, sets up logging and runs
//! one dubbing job with a progress bar. Ctrl-C asks the run to stop at the
//! next stage boundary.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use lipdub::artifact::sweep_stale;
use lipdub::cli::{Args, Commands};
use lipdub::config::Config;
use lipdub::pipeline::{DubbingPipeline, RunStatus};
use lipdub::progress::ProgressBarReporter;
use lipdub::request::PipelineRequest;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    let _log_guard = setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Dub { video, reference_audio, output, source, target } => {
            sweep_stale(&config.pipeline.temp_root)?;

            let pipeline = DubbingPipeline::dubbing(&config)?;
            let request = PipelineRequest::new(video, reference_audio, output, source, target);
            let handle = pipeline.start(request, Arc::new(ProgressBarReporter::new()))?;

            let cancel = handle.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current stage");
                    cancel.cancel();
                }
            });

            let outcome = handle.wait().await;
            match outcome.status {
                RunStatus::Completed { output } => {
                    println!("Dubbed video written to {}", output.display());
                }
                RunStatus::Failed(failure) => {
                    anyhow::bail!(
                        "Dubbing failed at stage '{}' ({}): {}",
                        failure.stage,
                        failure.kind,
                        failure.message
                    );
                }
                RunStatus::Cancelled { after_stage } => {
                    anyhow::bail!(
                        "Dubbing cancelled after {}",
                        after_stage.as_deref().unwrap_or("setup")
                    );
                }
            }
        }
        Commands::Languages => {
            println!("{:<6} {:<20}", "Code", "Language");
            println!("{}", "-".repeat(26));
            for (code, name) in &config.pipeline.supported_languages {
                println!("{:<6} {:<20}", code, name);
            }
        }
        Commands::Clean => {
            let removed = sweep_stale(&config.pipeline.temp_root)?;
            println!(
                "Removed {} stale files from {}",
                removed,
                config.pipeline.temp_root.display()
            );
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".lipdub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "lipdub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console stays terse so it does not fight with the progress bar
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("lipdub.log").display()
    );

    Ok(guard)
}
