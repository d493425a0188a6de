//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ventd", version, about = "Adaptive home ventilation controller")]
pub struct Cli {
    /// Path to config TOML (falls back to built-in defaults when bad/absent)
    #[arg(long, value_name = "FILE", default_value = "etc/ventd.toml")]
    pub config: PathBuf,

    /// Path to the persisted runtime tuning (level maps)
    #[arg(long, value_name = "FILE", default_value = "etc/ventd_tuning.toml")]
    pub tuning: PathBuf,

    /// Emit one JSON snapshot per cycle instead of the human status block
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop
    Run {
        /// Stop after this many cycles (runs forever when absent)
        #[arg(long)]
        cycles: Option<u64>,

        /// Override the config's cycle interval
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Print a human status block every N cycles (ignored with --json)
        #[arg(long, value_name = "N", default_value_t = 10)]
        status_every: u64,
    },
    /// Run one cycle and print the state snapshot
    Status,
    /// Ramp a fan's drive across its range and print `rpm,pwm` rows
    /// suitable for seeding the actuator curve
    Sweep {
        /// Index of the [[fans]] entry to sweep
        #[arg(long, default_value_t = 0)]
        fan: usize,

        /// Number of drive steps between off and full
        #[arg(long, default_value_t = 32)]
        steps: u32,

        /// Settle time at each step before sampling
        #[arg(long, value_name = "MS", default_value_t = 1_000)]
        settle_ms: u64,
    },
}
