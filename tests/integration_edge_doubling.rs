//! Exercises the edge-doubling state machine end to end over the in-process
//! transport: a sequence of `record()` calls on one key should arrive at a
//! raw PULL socket as the exact run of samples the change-detection rule
//! predicts, not merely the right *count* of them.

use std::time::Duration;
use telemetry_recorder::recorder_key;
use telemetry_recorder::transport::{inproc::InprocPull, PollOutcome, PullSocket, SocketOptions};
use telemetry_recorder::wire::{FrameType, ItemRecord};
use telemetry_recorder::{bootstrap, Recorder};

recorder_key! {
    enum Sensor { A }
}

/// Pull frames until a `DATA` frame shows up, skipping the one-time
/// `InitRecorder`/`InitItem` metadata frames emitted by construction/setup.
fn next_data_frame(pull: &mut InprocPull) -> Vec<ItemRecord> {
    loop {
        assert_eq!(
            pull.poll(Duration::from_secs(1)).unwrap(),
            PollOutcome::Ready,
            "expected another frame before timing out"
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

/// S1: 1.1, 1.1, 1.2, 1.2, 1.0 yields three DATA frames grouped as
/// `[1.1]`, `[1.1, 1.2]`, `[1.2, 1.0]` — five records total.
#[test]
fn float_sequence_matches_expected_edges() {
    let addr = "inproc://edge-doubling-s1";
    bootstrap::configure(addr, SocketOptions::default());
    let mut pull = InprocPull::bind(addr, SocketOptions::default()).unwrap();

    let rec = Recorder::<Sensor>::new("edge-doubling", 1);
    rec.setup(Sensor::A, "a", "unit", "desc");

    // Flush after each logical step below so the scenario's three groups
    // land as three distinct DATA frames on the wire, rather than being
    // coalesced into whatever the 1024-capacity buffer would otherwise
    // batch together.
    rec.record(Sensor::A, 1.1f64);
    rec.flush();

    rec.record(Sensor::A, 1.1f64); // unchanged, suppressed
    rec.record(Sensor::A, 1.2f64);
    rec.flush();

    rec.record(Sensor::A, 1.2f64); // unchanged, suppressed
    rec.record(Sensor::A, 1.0f64);
    rec.flush();

    let first = next_data_frame(&mut pull);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].data.as_f64(), 1.1);

    let second = next_data_frame(&mut pull);
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].data.as_f64(), 1.1);
    assert_eq!(second[1].data.as_f64(), 1.2);
    assert_eq!(second[0].time, second[1].time, "I4: old value re-timestamped to the new time");

    let third = next_data_frame(&mut pull);
    assert_eq!(third.len(), 2);
    assert_eq!(third[0].data.as_f64(), 1.2);
    assert_eq!(third[1].data.as_f64(), 1.0);
}
