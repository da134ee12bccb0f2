//! Capsync - Multi-File Caption Editing for Image Datasets
//!
//! This is the main entry point for the capsync application, which loads the
//! captions of many images, presents them as one merged tag view, and
//! propagates edits of that view back to every file.

use anyhow::Result;
use clap::Parser;
use std::io::Read;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use capsync::cli::{Args, Commands};
use capsync::config::Config;
use capsync::error::CapsyncError;
use capsync::session::TagPresence;
use capsync::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    if let Some(separator) = &args.separator {
        config.caption.separator = separator.clone();
    }

    let workflow = Workflow::new(config);

    // Execute command
    match args.command {
        Commands::Merge { files, dir } => {
            let inputs = workflow.collect_inputs(files, dir)?;
            let merged = workflow.merged_view(&inputs).await?;
            println!("{}", merged);
        }
        Commands::Apply {
            files,
            dir,
            text,
            text_file,
            dry_run,
        } => {
            let inputs = workflow.collect_inputs(files, dir)?;
            let edited = read_edited_text(text, text_file)?;

            let captions = workflow.apply_edit(&inputs, &edited, dry_run).await?;
            if dry_run {
                println!("Dry run, no captions written:");
            }
            for (path, caption) in captions {
                println!("{}: {}", path.display(), caption);
            }
        }
        Commands::Ensure { tag, files, dir } => {
            let inputs = workflow.collect_inputs(files, dir)?;
            let before = workflow.ensure_tag(&inputs, &tag).await?;
            match before {
                TagPresence::Full => println!("'{}' was already present in every file", tag),
                _ => println!("'{}' is now present in all {} files", tag, inputs.len()),
            }
        }
        Commands::Presence { tag, files, dir } => {
            let inputs = workflow.collect_inputs(files, dir)?;
            let presence = workflow.presence_report(&inputs, &tag).await?;
            let label = match presence {
                TagPresence::NotPresent => "not present",
                TagPresence::Partial => "partially present",
                TagPresence::Full => "present in every file",
            };
            println!("'{}' is {} ({} files)", tag, label, inputs.len());
        }
        Commands::Stats { dir, top } => {
            let frequencies = workflow.dataset_stats(dir, top).await?;
            if frequencies.is_empty() {
                println!("No tags found.");
            } else {
                println!("{:<40} {:<8}", "Tag", "Count");
                println!("{}", "-".repeat(48));
                for (tag, count) in frequencies {
                    println!("{:<40} {:<8}", tag, count);
                }
            }
        }
    }

    Ok(())
}

/// Resolve the edited merged text: flag, file, or stdin.
fn read_edited_text(
    text: Option<String>,
    text_file: Option<std::path::PathBuf>,
) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = text_file {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CapsyncError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        return Ok(content.trim_end_matches(['\r', '\n']).to_string());
    }
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let capsync_dir = std::env::current_dir()?.join(".capsync");
    let log_dir = capsync_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "capsync.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
