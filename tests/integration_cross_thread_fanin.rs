//! S3 — cross-thread fan-in: several producer threads each hammer a small
//! key set with strictly increasing values (so every `record()` after the
//! first is a guaranteed edge) and the sink's per-recorder counters must
//! sum to the closed-form total the edge-doubling rule predicts.

use std::sync::atomic::AtomicBool;
use telemetry_recorder::recorder_key;
use telemetry_recorder::transport::{inproc::InprocPull, SocketOptions};
use telemetry_recorder::{bootstrap, Recorder, Sink};

recorder_key! {
    enum Channel {
        C0,
        C1,
        C2,
        C3,
        C4,
        C5,
    }
}

const THREADS: u64 = 4;
const ROUNDS: u64 = 50;

fn run_producer(thread_index: u64) {
    let rec = Recorder::<Channel>::new(format!("fanin-{thread_index}"), thread_index as i64);
    for (i, key) in [
        Channel::C0,
        Channel::C1,
        Channel::C2,
        Channel::C3,
        Channel::C4,
        Channel::C5,
    ]
    .into_iter()
    .enumerate()
    {
        rec.setup(key, &format!("ch{i}"), "unit", "desc");
    }
    for round in 0..ROUNDS {
        // Strictly increasing per thread+key so every record after the
        // first registers as a byte-level edge: no accidental suppression.
        let base = thread_index * 1_000_000 + round;
        rec.record(Channel::C0, base as i64);
        rec.record(Channel::C1, base as i64);
        rec.record(Channel::C2, base as i64);
        rec.record(Channel::C3, base as i64);
        rec.record(Channel::C4, base as i64);
        rec.record(Channel::C5, base as i64);
    }
    rec.flush();
}

#[test]
fn four_threads_six_keys_sum_matches_closed_form() {
    let addr = "inproc://fanin-s3";
    bootstrap::configure(addr, SocketOptions::default());
    let mut sink = Sink::<InprocPull>::bind(addr, SocketOptions::default(), false).unwrap();

    std::thread::scope(|scope| {
        for thread_index in 0..THREADS {
            scope.spawn(move || run_producer(thread_index));
        }
    });

    let stop = AtomicBool::new(true);
    let summary = sink.run(&stop).unwrap();

    let expected = THREADS * 6 * (2 * ROUNDS - 1);
    assert_eq!(summary.messages, expected);
    assert_eq!(summary.recorders_seen, THREADS as usize);
}
