//! mailsift - extract structured records from business email.

use clap::Parser;
use mailsift_cli::cli::BackendArgs;
use mailsift_cli::commands;
use mailsift_cli::logging::init_logging;
use mailsift_cli::{Cli, CliError, Command, Config, Formatter};
use mailsift_extractor::ExtractorConfig;
use mailsift_llm::GeminiProvider;
use std::path::PathBuf;
use std::sync::Arc;

/// Log file used by `batch` when `--log-file` is not given.
const DEFAULT_BATCH_LOG: &str = "processing.log";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> mailsift_cli::Result<()> {
    let cli = Cli::parse();

    // .env fills in variables the process environment lacks
    dotenvy::dotenv().ok();

    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = Config::load_from(&config_path)?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Config(args) => {
            init_logging(cli.verbose, cli.log_file.as_deref())?;
            commands::execute_config(args, &config, &config_path, &formatter)
        }
        Command::Extract(args) => {
            init_logging(cli.verbose, cli.log_file.as_deref())?;
            let (extractor_config, provider) = prepare_backend(&config, &args.backend)?;
            let runtime = build_runtime()?;
            runtime.block_on(commands::execute_extract(
                args,
                Arc::clone(&provider),
                extractor_config,
                &formatter,
            ))
        }
        Command::Batch(args) => {
            let log_file = cli
                .log_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BATCH_LOG));
            init_logging(cli.verbose, Some(log_file.as_path()))?;
            let (extractor_config, provider) = prepare_backend(&config, &args.backend)?;
            let runtime = build_runtime()?;
            runtime
                .block_on(commands::execute_batch(
                    args,
                    Arc::clone(&provider),
                    extractor_config,
                    &formatter,
                ))
                .map(|_| ())
        }
    }
}

/// Resolve settings and build the provider before any document is touched.
///
/// The provider owns a blocking HTTP client, so it is created outside the
/// async runtime and must outlive it.
fn prepare_backend(
    config: &Config,
    args: &BackendArgs,
) -> mailsift_cli::Result<(ExtractorConfig, Arc<GeminiProvider>)> {
    let extractor_config = config.extractor_config(args)?;
    let gemini = config.gemini_config(args, &extractor_config)?;
    let provider = GeminiProvider::new(gemini)?;
    Ok((extractor_config, Arc::new(provider)))
}

fn build_runtime() -> mailsift_cli::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Io)
}
