//! Command-line surface, declared with clap derive.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Framelock - trigger-to-frame synchronization pipeline for machine-vision cameras
#[derive(Parser, Debug)]
#[command(
    name = "framelock",
    author,
    version,
    about = "External-trigger frame synchronization pipeline",
    long_about = "A trigger-to-frame synchronization pipeline for machine-vision cameras.\n\n\
                  Opens the camera, bridges the external trigger source into a pulse \n\
                  queue, stamps every frame with the instant of its trigger pulse, and \n\
                  dispatches stamped frames to configured sinks."
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FRAMELOCK_VERBOSE")]
    pub verbose: u8,

    /// Errors only; wins over the blueprint's log settings
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FRAMELOCK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture, stamp and dispatch frames
    Run(RunArgs),

    /// Check a blueprint file and report problems
    Validate(ValidateArgs),

    /// Print a blueprint's effective settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Rig blueprint file (TOML or JSON)
    #[arg(short, long, default_value = "rig.toml", env = "FRAMELOCK_CONFIG")]
    pub config: PathBuf,

    /// Maximum number of stamped frames to produce (0 = unlimited)
    #[arg(long, default_value = "0", env = "FRAMELOCK_MAX_FRAMES")]
    pub max_frames: u64,

    /// Stop the pipeline after this many seconds (0 = run until signaled)
    #[arg(long, default_value = "0", env = "FRAMELOCK_TIMEOUT")]
    pub timeout: u64,

    /// Load and validate the blueprint, then exit without touching hardware
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the external trigger and capture in free-run mode
    #[arg(long)]
    pub free_run: bool,

    /// Replay a recorded capture log instead of driving the live rig
    #[arg(long, env = "FRAMELOCK_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier (1.0 = recorded speed)
    #[arg(long, default_value = "1.0", env = "FRAMELOCK_REPLAY_SPEED")]
    pub replay_speed: f64,

    /// Restart replay from the beginning when the log is exhausted
    #[arg(long)]
    pub replay_loop: bool,

    /// Prometheus exporter port (0 = no exporter)
    #[arg(long, default_value = "9000", env = "FRAMELOCK_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Blueprint file to check
    #[arg(short, long, default_value = "rig.toml")]
    pub config: PathBuf,

    /// Machine-readable JSON verdict instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Blueprint file to describe
    #[arg(short, long, default_value = "rig.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed camera settings
    #[arg(long)]
    pub settings: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// Structured JSON lines
    Json,
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Terse single-line output
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
