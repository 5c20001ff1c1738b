//! capsearch - search a folder of images by their AI-generated descriptions.
//!
//! Each file is described once by a vision model (Ollama by default). The
//! descriptions are kept in a durable JSON cache, fetched concurrently with
//! bounded retries, and searched with a case-insensitive substring match.
//!
//! The library entry point is [`pipeline::Pipeline::resolve_and_search`];
//! the command-line binary goes through [`run_app`].

pub mod cache;
pub mod caption;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod signal;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::cache::DescriptionStore;
use crate::cli::{CacheAction, CacheArgs, Cli, Commands, DescribeArgs, OutputFormat, SearchArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::output::{JsonDescribeOutput, JsonSearchOutput, TextOutput};
use crate::pipeline::{Pipeline, PipelineError};
use crate::progress::{Progress, ProgressCallback};
use crate::signal::ShutdownHandler;

/// Run the command described by `cli` and return the process exit code.
///
/// # Errors
///
/// Returns an error for failures that stop the whole run: a missing data
/// folder, an unusable cache path, or an HTTP client that cannot be built.
/// Per-file captioning failures are not errors; they show up as
/// [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    let config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)
        }
        None => Config::load(),
    };
    log::debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Search(args) => run_search(config, args, cli.quiet, cli.verbose > 0),
        Commands::Describe(args) => run_describe(config, args, cli.quiet),
        Commands::Cache(args) => run_cache(config, args),
    }
}

fn run_search(
    config: Config,
    args: SearchArgs,
    quiet: bool,
    show_descriptions: bool,
) -> anyhow::Result<ExitCode> {
    let mut overrides = args.fetch.overrides();
    overrides.order = args.order;
    let config = config.apply_overrides(overrides);

    let keys = scanner::collect_inputs(&config.data_dir, &config.scan())?;
    log::info!(
        "Found {} input files in {}",
        keys.len(),
        config.data_dir.display()
    );

    let shutdown = shutdown_handler();
    let pipeline = build_pipeline(&config, &shutdown, quiet)?;
    if shutdown.is_shutdown_requested() {
        return Err(PipelineError::Interrupted.into());
    }

    let outcome = pipeline.resolve_and_search(keys, &args.query);
    let exit_code = ExitCode::for_batch(&outcome.stats, !outcome.matches.is_empty());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Text => TextOutput::new()
            .with_descriptions(show_descriptions)
            .write_search(&outcome, &mut out)
            .context("Failed to write results")?,
        OutputFormat::Json => JsonSearchOutput::new(&outcome, exit_code)
            .write_to(&mut out, true)
            .context("Failed to write results")?,
    }
    out.flush().context("Failed to write results")?;

    Ok(exit_code)
}

fn run_describe(config: Config, args: DescribeArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let config = config.apply_overrides(args.fetch.overrides());
    let keys = scanner::collect_inputs(&config.data_dir, &config.scan())?;

    let shutdown = shutdown_handler();
    let pipeline = build_pipeline(&config, &shutdown, quiet)?;
    if shutdown.is_shutdown_requested() {
        return Err(PipelineError::Interrupted.into());
    }

    let coordinator = pipeline.coordinator();
    let batch = if args.refetch {
        log::info!("Refetching descriptions for {} files", keys.len());
        coordinator.refetch(keys)
    } else {
        coordinator.resolve(keys)
    };
    let exit_code = ExitCode::for_batch(&batch.stats, true);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Text => TextOutput::new()
            .write_describe(&batch, &mut out)
            .context("Failed to write descriptions")?,
        OutputFormat::Json => JsonDescribeOutput::new(&batch, exit_code)
            .write_to(&mut out, true)
            .context("Failed to write descriptions")?,
    }
    out.flush().context("Failed to write descriptions")?;

    Ok(exit_code)
}

fn run_cache(config: Config, args: CacheArgs) -> anyhow::Result<ExitCode> {
    let path = args.cache.unwrap_or(config.cache_path);
    let store = DescriptionStore::open(&path);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.action {
        CacheAction::Stats => {
            TextOutput::new()
                .write_cache_stats(&path, store.len(), &mut out)
                .context("Failed to write cache statistics")?;
        }
        CacheAction::Clear => {
            let removed = store.len();
            store
                .clear()
                .with_context(|| format!("Failed to clear cache at {}", path.display()))?;
            log::info!("Cleared {} descriptions from {}", removed, path.display());
            writeln!(out, "Cleared {} descriptions from {}", removed, path.display())
                .context("Failed to write output")?;
        }
    }
    Ok(ExitCode::Success)
}

fn build_pipeline(
    config: &Config,
    shutdown: &ShutdownHandler,
    quiet: bool,
) -> anyhow::Result<Pipeline> {
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(quiet));
    let pipeline =
        Pipeline::from_config_with_progress(config, Some(shutdown.get_flag()), Some(progress))?;
    Ok(pipeline)
}

fn shutdown_handler() -> ShutdownHandler {
    signal::install_handler().unwrap_or_else(|e| {
        log::warn!("{}; Ctrl+C will terminate immediately", e);
        ShutdownHandler::new()
    })
}
