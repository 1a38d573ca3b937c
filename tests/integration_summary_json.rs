//! The sink's shutdown summary serializes to JSON and round-trips through
//! a real file rather than just `serde_json`'s in-memory (de)serializer.

use std::sync::atomic::AtomicBool;
use telemetry_recorder::recorder_key;
use telemetry_recorder::transport::{inproc::InprocPull, SocketOptions};
use telemetry_recorder::{bootstrap, Recorder, Sink};

recorder_key! {
    enum Gauge { Value }
}

#[test]
fn summary_writes_and_reads_back_as_json() {
    let addr = "inproc://summary-json";
    bootstrap::configure(addr, SocketOptions::default());
    let mut sink = Sink::<InprocPull>::bind(addr, SocketOptions::default(), false).unwrap();

    let rec = Recorder::<Gauge>::new("producer", 1);
    rec.setup(Gauge::Value, "value", "unit", "desc");
    rec.record(Gauge::Value, 1i64);
    rec.record(Gauge::Value, 2i64);
    rec.flush();
    drop(rec);

    let stop = AtomicBool::new(true);
    let summary = sink.run(&stop).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");
    summary.write_json(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["messages"], 2);
    assert_eq!(parsed["recorders_seen"], 1);
}
