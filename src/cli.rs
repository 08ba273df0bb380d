//! Command-line interface for vocore
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voice-assistant audio core
#[derive(Parser, Debug)]
#[command(name = "vocore", version, about = "Voice-assistant audio core")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: vocore debug, -vv: everything debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a WAV file through capture, encode, decode and playback
    Loopback {
        /// WAV file used as the microphone
        #[arg(long, short = 'i', value_name = "WAV")]
        input: PathBuf,

        /// WAV file receiving the speaker output
        #[arg(long, short = 'o', value_name = "WAV")]
        output: PathBuf,

        /// Encoder frame duration in milliseconds
        #[arg(long, value_name = "MS")]
        frame_ms: Option<u32>,

        /// Ask the front end for device echo cancellation
        #[arg(long)]
        device_aec: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
