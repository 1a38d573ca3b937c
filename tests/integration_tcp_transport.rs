//! The same producer/sink code paths exercised by the other integration
//! tests, but over the `tcp://` backend instead of `inproc://`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use telemetry_recorder::recorder_key;
use telemetry_recorder::transport::{tcp::TcpPull, SocketOptions};
use telemetry_recorder::{bootstrap, Recorder, Sink};

recorder_key! {
    enum Gauge { Value }
}

fn generous_send_timeout() -> SocketOptions {
    // The default 2ms send_timeout (§6) models a real PUSH socket's HWM
    // drop threshold; a test talking to a loopback TCP listener gives
    // itself more slack so a slow CI box doesn't flake on a dropped batch.
    SocketOptions {
        send_timeout: Duration::from_millis(500),
        ..SocketOptions::default()
    }
}

#[test]
fn tcp_backend_round_trip_smoke() {
    let mut sink = Sink::<TcpPull>::bind("127.0.0.1:0", SocketOptions::default(), false).unwrap();
    let endpoint = sink.endpoint();
    bootstrap::configure(format!("tcp://{endpoint}"), generous_send_timeout());

    let rec = Recorder::<Gauge>::new("tcp-producer", 1);
    rec.setup(Gauge::Value, "value", "unit", "desc");
    rec.record(Gauge::Value, 1i64);
    rec.record(Gauge::Value, 2i64);
    rec.flush();
    drop(rec);

    let stop = AtomicBool::new(false);
    std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(150));
            stop.store(true, Ordering::Relaxed);
        });
        let summary = sink.run(&stop).unwrap();
        assert_eq!(summary.messages, 2);
        assert_eq!(summary.recorders_seen, 1);
    });
}
