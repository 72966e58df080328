//! Command-line argument surface.
//!
//! # Responsibility
//! - Define the section argument and the `--log-level`/`--config` flags.

use clap::Parser;
use orgnotify_core::config::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "orgnotify",
    version,
    about = "Create organization notification artifacts and email them to points of contact"
)]
pub struct Cli {
    /// Configuration section (environment) to run against.
    pub section: String,
    #[arg(
        long,
        default_value = "warning",
        help = "Log level: debug, info, warning, error, or critical"
    )]
    pub log_level: String,
    #[arg(
        long,
        env = "ORGNOTIFY_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the TOML configuration file"
    )]
    pub config: PathBuf,
}
