//! S4 — buffer rollover: one thread emits enough distinct values for a
//! single key to roll the 1024-capacity `SendBuffer` over twice. The
//! buffer flushes implicitly every time it fills to capacity, so the wire
//! shows two full 1024-record `DATA` frames followed by a final frame
//! holding whatever didn't reach capacity, flushed explicitly by
//! `flush()`.

use std::time::Duration;
use telemetry_recorder::recorder_key;
use telemetry_recorder::transport::{inproc::InprocPull, PollOutcome, PullSocket, SocketOptions};
use telemetry_recorder::wire::{FrameType, ItemRecord};
use telemetry_recorder::{bootstrap, Recorder};

recorder_key! {
    enum Gauge { Value }
}

fn next_data_frame(pull: &mut InprocPull) -> Vec<ItemRecord> {
    loop {
        assert_eq!(
            pull.poll(Duration::from_secs(2)).unwrap(),
            PollOutcome::Ready
        );
        let parts = pull.recv_parts().unwrap();
        let frame: [u8; 4] = parts[0].as_slice().try_into().unwrap();
        match FrameType::from_bytes(frame) {
            Some(FrameType::Data) => return ItemRecord::decode_batch(&parts[2]),
            Some(_) => continue,
            None => panic!("unrecognized frame type on the wire"),
        }
    }
}

#[test]
fn buffer_fills_at_1024_and_carries_remainder() {
    let addr = "inproc://buffer-rollover-s4";
    bootstrap::configure(addr, SocketOptions::default());
    let mut pull = InprocPull::bind(addr, SocketOptions::default()).unwrap();

    let rec = Recorder::<Gauge>::new("rollover", 1);
    rec.setup(Gauge::Value, "value", "unit", "desc");

    // First record is the init-edge (1 record); each of the following 1024
    // distinct values is a change from the previous one (2 records each):
    // 1 + 1024*2 = 2049 records total. A buffer that implicitly flushes at
    // capacity 1024 therefore emits two full 1024-record frames before the
    // explicit flush() sends the trailing 1.
    for v in 0..1025i64 {
        rec.record(Gauge::Value, v);
    }
    rec.flush();

    let first = next_data_frame(&mut pull);
    assert_eq!(first.len(), 1024);

    let second = next_data_frame(&mut pull);
    assert_eq!(second.len(), 1024);

    let third = next_data_frame(&mut pull);
    assert_eq!(third.len(), 1);

    assert_eq!(first.len() + second.len() + third.len(), 2049);
}
