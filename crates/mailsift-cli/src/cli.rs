//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand};
use mailsift_extractor::ResponseMode;
use std::path::PathBuf;

/// mailsift - Extract structured records from business email with an LLM.
#[derive(Debug, Parser)]
#[command(name = "mailsift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (file names only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract one email into a JSON record
    Extract(ExtractArgs),

    /// Extract every email in a directory into one JSON array
    Batch(BatchArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

/// Backend and extraction overrides shared by extract and batch.
#[derive(Debug, Clone, Default, Args)]
pub struct BackendArgs {
    /// Response shape to request from the backend
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Start from a configuration preset before applying the file and flags
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Model name
    #[arg(long, env = "GEMINI_MODEL")]
    pub model: Option<String>,

    /// Seconds to wait for one generation call
    #[arg(long)]
    pub timeout: Option<u64>,

    /// File whose contents replace the built-in instructions
    #[arg(long)]
    pub instructions: Option<PathBuf>,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Markdown email file
    pub file: PathBuf,

    /// Where to write the record
    #[arg(short, long, default_value = "single_test_result.json")]
    pub output: PathBuf,

    /// Also write an HTML highlight viewer
    #[arg(long)]
    pub html: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Arguments for the batch command.
#[derive(Debug, Parser)]
pub struct BatchArgs {
    /// Directory containing email files
    pub input_dir: PathBuf,

    /// Where to write the results array
    #[arg(short, long, default_value = "extraction_results.json")]
    pub output: PathBuf,

    /// Documents processed at the same time
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// File extensions to pick up (default: md)
    #[arg(short, long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Response mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// One JSON object per email
    Record,
    /// Labeled fragments reconciled locally
    Fragments,
}

/// Configuration preset argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced settings
    Default,
    /// Short timeouts, wide fan-out
    Aggressive,
    /// Long timeouts, one document at a time
    Lenient,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<ModeArg> for ResponseMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Record => ResponseMode::Record,
            ModeArg::Fragments => ResponseMode::Fragments,
        }
    }
}
