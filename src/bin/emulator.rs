//! Example producer driver (§10.3): spawns `--threads` threads that each
//! build a [`Recorder`] and record a small synthetic sensor for `--rounds`
//! iterations, exercising the edge-detection/doubling state machine with a
//! value that only sometimes changes between rounds.

use anyhow::Result;
use clap::Parser;
use telemetry_recorder::cli::Args;
use telemetry_recorder::{bootstrap, recorder_key};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

recorder_key! {
    /// Keys recorded by the emulator's synthetic sensor.
    pub enum EngineKey {
        Rpm,
        OilTempC,
        ThrottlePct,
    }
}

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
            let appender = tracing_appender::rolling::daily(dir, "telemetry-emulator.log");
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

fn run_producer(thread_index: usize, rounds: u64) {
    let rec = telemetry_recorder::Recorder::<EngineKey>::new(
        format!("engine-emulator-{thread_index}"),
        thread_index as i64,
    );
    rec.setup(EngineKey::Rpm, "rpm", "rpm", "engine speed");
    rec.setup(EngineKey::OilTempC, "oil_temp", "C", "oil temperature");
    rec.setup(
        EngineKey::ThrottlePct,
        "throttle",
        "%",
        "throttle position",
    );

    for round in 0..rounds {
        let rpm = 800 + (round % 50) * 20;
        rec.record(EngineKey::Rpm, rpm as i64);
        // Oil temperature changes slowly: most rounds repeat the same
        // bucketed value, so most record() calls are suppressed (I4).
        let oil_temp = 70.0 + (round / 200) as f64;
        rec.record(EngineKey::OilTempC, oil_temp);
        let throttle = (round % 100) as u64;
        rec.record(EngineKey::ThrottlePct, throttle);
    }
    rec.flush();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = install_logging(args.verbose, args.log_dir.as_deref());

    bootstrap::configure(args.address.clone(), args.socket_options());
    tracing::info!(address = %args.address, threads = args.threads, rounds = args.rounds, "starting telemetry emulator");

    std::thread::scope(|scope| {
        for thread_index in 0..args.threads.max(1) {
            let rounds = args.rounds;
            scope.spawn(move || run_producer(thread_index, rounds));
        }
    });

    tracing::info!(
        dropped_batches = telemetry_recorder::dropped_batches(),
        dropped_bytes = telemetry_recorder::dropped_bytes(),
        "telemetry emulator finished"
    );
    Ok(())
}
