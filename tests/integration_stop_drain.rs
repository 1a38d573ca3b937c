//! S5 — stop with drain: producers enqueue a batch of records and exit;
//! `stop()` is requested shortly after while the sink is mid-poll. The
//! sink must keep draining until the transport is empty before it honors
//! the stop flag, so every record is still accounted for in the summary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry_recorder::recorder_key;
use telemetry_recorder::transport::{inproc::InprocPull, SocketOptions};
use telemetry_recorder::{bootstrap, Recorder, Sink};

recorder_key! {
    enum Counter { N }
}

const TOTAL_VALUES: i64 = 10_000;

#[test]
fn all_records_counted_before_sink_honors_stop() {
    let addr = "inproc://stop-drain-s5";
    bootstrap::configure(addr, SocketOptions::default());
    let mut sink = Sink::<InprocPull>::bind(addr, SocketOptions::default(), false).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let sink_thread = {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || sink.run(&stop).unwrap())
    };

    std::thread::spawn(|| {
        let rec = Recorder::<Counter>::new("producer", 1);
        rec.setup(Counter::N, "n", "unit", "desc");
        for v in 0..TOTAL_VALUES {
            rec.record(Counter::N, v);
        }
        rec.flush();
    })
    .join()
    .unwrap();

    std::thread::sleep(Duration::from_millis(10));
    stop.store(true, Ordering::Relaxed);

    let summary = sink_thread.join().unwrap();
    // First value is the init-edge (1 record); each subsequent distinct
    // value is an edge (2 records): 1 + (TOTAL_VALUES - 1) * 2.
    let expected = 1 + (TOTAL_VALUES - 1) * 2;
    assert_eq!(summary.messages, expected as u64);
}
