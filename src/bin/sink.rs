//! Example sink driver (§10.3): binds the configured address, polls until
//! interrupted, and prints a throughput summary on shutdown — the
//! `Ctrl-C`-driven counterpart to `RecorderSink::run`.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telemetry_recorder::cli::Args;
use telemetry_recorder::control::ControlServer;
use telemetry_recorder::transport::AnyPull;
use telemetry_recorder::Sink;
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

fn install_logging(
    verbose: bool,
    log_dir: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let stdout_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .event_format(telemetry_recorder::logging::ColorizedFormatter)
        .with_filter(level);

    let (file_log, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "telemetry-sink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(level);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(file_log)
        .init();
    guard
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = install_logging(args.verbose, args.log_dir.as_deref());

    let control = args.control_address.as_deref().map(ControlServer::start);
    if let Some(control) = &control {
        tracing::info!(address = control.local_addr(), "control plane listening");
    }

    let mut sink = Sink::<AnyPull>::bind(&args.address, args.socket_options(), args.verbose)
        .with_context(|| format!("binding telemetry sink at {}", args.address))?;
    tracing::info!(endpoint = %sink.endpoint(), "telemetry sink running, press ctrl-c to stop");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("installing ctrl-c handler")?;
    }

    let summary = sink.run(&stop).map_err(anyhow::Error::from)?;
    tracing::info!(?summary, "shutdown summary");

    if let Some(path) = &args.summary_json {
        summary
            .write_json(path)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }

    if let Some(control) = control {
        control.shutdown();
    }

    Ok(())
}
