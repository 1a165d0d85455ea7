use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::keyboard::{DEFAULT_HIGH, DEFAULT_LOW};

#[derive(Parser)]
#[command(name = "etude", about = "Terminal client for the etude piano practice server")]
pub struct Cli {
    /// Server origin, e.g. http://127.0.0.1:8765 (overrides the config file)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Config file (default: ~/.config/etude/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect without the TUI and log every state change
    Monitor(MonitorArgs),
    /// Print the keyboard layout for a note range
    Layout {
        /// Lowest MIDI note
        #[arg(long, default_value_t = DEFAULT_LOW)]
        low: u8,
        /// Highest MIDI note
        #[arg(long, default_value_t = DEFAULT_HIGH)]
        high: u8,
    },
}

#[derive(clap::Args)]
pub struct MonitorArgs {
    /// Select this MIDI device once connected
    #[arg(long)]
    pub device: Option<String>,

    /// Request the next lesson once connected
    #[arg(long)]
    pub next_lesson: bool,

    /// Stop after this many seconds (default: run until the server closes)
    #[arg(long)]
    pub seconds: Option<u64>,
}
