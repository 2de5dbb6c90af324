use clap::{Args, Subcommand};
use rttbench_frame::DEFAULT_MAX_PAYLOAD;
use rttbench_peer::{DEFAULT_COUNT, DEFAULT_HOST, DEFAULT_MESSAGE, DEFAULT_PORT, DEFAULT_WARMUP};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod run;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an echo server.
    Serve(ServeArgs),
    /// Measure round-trip latency against an echo server.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Run(args) => run::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "RTTBENCH_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Port to bind (0 picks a free port).
    #[arg(long, env = "RTTBENCH_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Largest frame payload accepted, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_frame: usize,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Server host.
    #[arg(long, env = "RTTBENCH_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Server port.
    #[arg(long, env = "RTTBENCH_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Message sent on every round trip.
    #[arg(long, env = "RTTBENCH_MSG", default_value = DEFAULT_MESSAGE)]
    pub msg: String,
    /// Total number of round trips.
    #[arg(long, env = "RTTBENCH_COUNT", default_value_t = DEFAULT_COUNT)]
    pub count: u64,
    /// Leading round trips excluded from the statistics.
    #[arg(long, default_value_t = DEFAULT_WARMUP, conflicts_with = "no_warmup")]
    pub warmup: u64,
    /// Keep every sample.
    #[arg(long)]
    pub no_warmup: bool,
    /// Abort if the server stalls this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Largest frame payload sent or accepted, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_frame: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
