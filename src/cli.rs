//! Command-line arguments for the example drivers: the telemetry emulator
//! (a producer) and the telemetry sink.
//!
//! Both binaries share one `Args` struct; fields that only make sense for
//! one side (e.g. `--rounds` for the emulator, `--recv-hwm` for the sink)
//! are simply ignored by the other.

use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser,
};
use std::time::Duration;

use crate::transport::SocketOptions;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Telemetry recording example drivers.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Transport address, `inproc://name` or `tcp://host:port`.
    #[arg(short = 'a', long, default_value = "inproc://telemetry")]
    pub address: String,

    /// Number of recording rounds the emulator runs before exiting.
    #[arg(short = 'r', long, default_value_t = 10_000)]
    pub rounds: u64,

    /// Number of concurrent producer threads the emulator spawns.
    #[arg(short = 't', long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Print every decoded record as the sink receives it.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// PUSH socket send high-water mark.
    #[arg(long, default_value_t = 16_000)]
    pub send_hwm: usize,

    /// PULL socket receive high-water mark.
    #[arg(long, default_value_t = 16_000)]
    pub recv_hwm: usize,

    /// PUSH socket linger, in milliseconds, applied on close.
    #[arg(long, default_value_t = 3000)]
    pub linger_ms: u64,

    /// PUSH socket send timeout, in milliseconds, before a batch is dropped.
    #[arg(long, default_value_t = 2)]
    pub send_timeout_ms: u64,

    /// Optional control-plane address (`host:port`); omit to run without one.
    #[arg(long)]
    pub control_address: Option<String>,

    /// Write the sink's shutdown summary as JSON to this path.
    #[arg(long)]
    pub summary_json: Option<std::path::PathBuf>,

    /// Directory for a rolling daily log file, in addition to stdout.
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

impl Args {
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            linger: Duration::from_millis(self.linger_ms),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            send_hwm: self.send_hwm,
            recv_hwm: self.recv_hwm,
        }
    }
}
