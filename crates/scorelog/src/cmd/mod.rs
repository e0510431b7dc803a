use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the telemetry relay worker.
    Run(RunArgs),
    /// Decode a hex-encoded score frame.
    Decode(DecodeArgs),
    /// Encode a score event as a hex frame.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Inherited control socket descriptor connected to the supervisor.
    #[arg(long, env = "SCORELOG_CONTROL_FD", value_name = "FD")]
    pub control_fd: i32,
    /// Lock file serializing registration across sibling workers.
    #[arg(long, env = "SCORELOG_BARRIER_PATH", value_name = "PATH")]
    pub barrier_path: Option<PathBuf>,
    /// Largest frame accepted from the telemetry channel, in bytes.
    #[arg(long, default_value_t = scorelog_frame::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// How often the loop checks for termination (e.g. 250ms, 1s).
    #[arg(long, default_value = "250ms")]
    pub poll_interval: String,
    /// Worker name used in logs and passed to handler commands.
    #[arg(long, default_value = "log_helper")]
    pub name: String,
    /// Print every event to stdout.
    #[arg(long)]
    pub print: bool,
    /// Run a shell command per event with the event as JSON on stdin. Repeatable.
    #[arg(long = "handler-cmd", value_name = "CMD")]
    pub handler_cmds: Vec<String>,
    /// Kill a handler command that runs longer than this (e.g. 5s). Unbounded if unset.
    #[arg(long, value_name = "DURATION")]
    pub handler_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Aggregate message score.
    #[arg(long, allow_negative_numbers = true)]
    pub score: f64,
    /// Score threshold.
    #[arg(long, allow_negative_numbers = true)]
    pub required: f64,
    /// Settings identifier.
    #[arg(long, default_value_t = 0)]
    pub settings_id: u32,
    /// Symbol result as ID:SCORE. Repeatable; order is kept.
    #[arg(long = "symbol", value_name = "ID:SCORE", allow_hyphen_values = true)]
    pub symbols: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
