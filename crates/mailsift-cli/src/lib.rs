//! mailsift CLI library.
//!
//! Argument parsing, configuration loading, logging setup, output formatting
//! and the command implementations behind the `mailsift` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod viewer;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
