//! The polling sink (§5). Grounded on `RecorderSink::run`: bind a `PULL`
//! socket, poll it on a fixed interval, dispatch frames by `FrameType`, and
//! print a throughput summary when the loop stops.

use crate::error::RecorderError;
use crate::transport::{PollOutcome, PullSocket, SocketOptions};
use crate::wire::{FrameType, InitItem, InitRecorder, ItemRecord, ScalarKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// `zmq_poll`'s 100ms timeout in the original; how often the sink checks
/// the stop flag between messages when the transport is otherwise idle.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct ItemMeta {
    name: String,
    unit: String,
    #[allow(dead_code)]
    desc: String,
}

#[derive(Debug, Default)]
struct RecorderMeta {
    #[allow(dead_code)]
    external_id: i64,
    #[allow(dead_code)]
    name: String,
    items: HashMap<i16, ItemMeta>,
}

/// End-of-run throughput report (§5 "prints a summary on shutdown"),
/// `Serialize` so a driver can export it as JSON alongside the printed
/// log line.
#[derive(Debug, Serialize)]
pub struct SinkSummary {
    pub generated_at: String,
    pub recorders_seen: usize,
    pub messages: u64,
    pub bytes: u64,
    pub elapsed_secs: f64,
    pub messages_per_sec: f64,
    pub mib_per_sec: f64,
}

impl SinkSummary {
    pub fn write_json(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let rendered = serde_json::to_string_pretty(self).expect("SinkSummary always serializes");
        std::fs::write(path, rendered)
    }
}

/// Owns the `PULL` socket and per-key counters (§5). Generic over the
/// transport backend so tests can run it over [`crate::transport::inproc`]
/// without a real network.
pub struct Sink<P: PullSocket> {
    socket: P,
    verbose: bool,
    recorders: HashMap<i16, RecorderMeta>,
    counters: HashMap<(i16, i16), u64>,
    messages: u64,
    bytes: u64,
    started: Instant,
}

impl<P: PullSocket> Sink<P> {
    pub fn bind(address: &str, opts: SocketOptions, verbose: bool) -> Result<Self, RecorderError> {
        let socket = P::bind(address, opts)?;
        tracing::info!(endpoint = %socket.last_endpoint(), "telemetry sink bound");
        Ok(Sink {
            socket,
            verbose,
            recorders: HashMap::new(),
            counters: HashMap::new(),
            messages: 0,
            bytes: 0,
            started: Instant::now(),
        })
    }

    pub fn endpoint(&self) -> String {
        self.socket.last_endpoint()
    }

    /// Run the poll loop until `stop` is observed set *and* the transport
    /// has nothing left to deliver — draining any backlog rather than
    /// cutting off mid-batch.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<SinkSummary, RecorderError> {
        loop {
            match self.socket.poll(POLL_INTERVAL)? {
                PollOutcome::Ready => {
                    let parts = self.socket.recv_parts()?;
                    self.dispatch(parts);
                }
                PollOutcome::Timeout => {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }
        }
        let summary = self.summary();
        tracing::info!(
            messages = summary.messages,
            messages_per_sec = summary.messages_per_sec,
            mib_per_sec = summary.mib_per_sec,
            "telemetry sink shutting down"
        );
        Ok(summary)
    }

    fn dispatch(&mut self, parts: Vec<Vec<u8>>) {
        let Some(frame_bytes) = parts.first() else {
            tracing::warn!("telemetry sink received an empty message");
            return;
        };
        let Ok(frame_array) = frame_bytes.as_slice().try_into() else {
            tracing::warn!("telemetry sink received a malformed frame discriminator");
            return;
        };
        match FrameType::from_bytes(frame_array) {
            Some(FrameType::InitRecorder) => self.handle_init_recorder(&parts),
            Some(FrameType::InitItem) => self.handle_init_item(&parts),
            Some(FrameType::Data) => self.handle_data(&parts),
            None => tracing::warn!("telemetry sink received an unknown frame type"),
        }
    }

    fn handle_init_recorder(&mut self, parts: &[Vec<u8>]) {
        let Some(body) = parts.get(1).and_then(|b| b.as_slice().try_into().ok()) else {
            tracing::warn!("malformed InitRecorder frame");
            return;
        };
        let init = InitRecorder::from_bytes(body);
        tracing::debug!(
            recorder_id = init.recorder_id,
            name = %init.name,
            num_items = init.num_items,
            "recorder registered"
        );
        self.recorders.insert(
            init.recorder_id,
            RecorderMeta {
                external_id: init.external_id,
                name: init.name,
                items: HashMap::new(),
            },
        );
    }

    fn handle_init_item(&mut self, parts: &[Vec<u8>]) {
        let Some(body) = parts.get(1).and_then(|b| b.as_slice().try_into().ok()) else {
            tracing::warn!("malformed InitItem frame");
            return;
        };
        let init = InitItem::from_bytes(body);
        tracing::debug!(
            recorder_id = init.recorder_id,
            key = init.key,
            name = %init.name,
            unit = %init.unit,
            "item registered"
        );
        self.recorders
            .entry(init.recorder_id)
            .or_default()
            .items
            .insert(
                init.key,
                ItemMeta {
                    name: init.name,
                    unit: init.unit,
                    desc: init.desc,
                },
            );
    }

    fn handle_data(&mut self, parts: &[Vec<u8>]) {
        let (Some(id_bytes), Some(payload)) = (parts.get(1), parts.get(2)) else {
            tracing::warn!("malformed DATA frame");
            return;
        };
        let Ok(id_array): Result<[u8; 2], _> = id_bytes.as_slice().try_into() else {
            tracing::warn!("malformed DATA frame recorder id");
            return;
        };
        let recorder_id = i16::from_le_bytes(id_array);
        let records = ItemRecord::decode_batch(payload);

        self.messages += records.len() as u64;
        self.bytes += payload.len() as u64;

        for record in &records {
            *self
                .counters
                .entry((recorder_id, record.key))
                .or_insert(0) += 1;
            if self.verbose {
                tracing::info!("{}", self.format_record(recorder_id, record));
            }
        }
    }

    fn format_record(&self, recorder_id: i16, record: &ItemRecord) -> String {
        let default_name = format!("key{}", record.key);
        let (name, unit) = self
            .recorders
            .get(&recorder_id)
            .and_then(|r| r.items.get(&record.key))
            .map(|item| (item.name.as_str(), item.unit.as_str()))
            .unwrap_or((default_name.as_str(), ""));
        let value = match record.kind {
            ScalarKind::Char => (record.data.as_char() as char).to_string(),
            ScalarKind::Int => record.data.as_i64().to_string(),
            ScalarKind::Uint => record.data.as_u64().to_string(),
            ScalarKind::Float => record.data.as_f64().to_string(),
            _ => format!("{:?}", record.data.0),
        };
        format!(
            "[{recorder_id}] {} {:>10}:{:<6} = {value}",
            record.time,
            name,
            format!("[{unit}]")
        )
    }

    fn summary(&self) -> SinkSummary {
        let elapsed = self.started.elapsed().as_secs_f64().max(f64::EPSILON);
        SinkSummary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            recorders_seen: self.recorders.len(),
            messages: self.messages,
            bytes: self.bytes,
            elapsed_secs: elapsed,
            messages_per_sec: self.messages as f64 / elapsed,
            mib_per_sec: (self.bytes as f64 / 1_048_576.0) / elapsed,
        }
    }
}

/// Drain and discard whatever is currently buffered without touching the
/// summary counters. Used only by unit tests that share one process-wide
/// in-process address (`bootstrap::configure` is a one-shot global, §4.4)
/// to clear their own traffic off the shared channel before another test's
/// `run()` call sees it.
#[cfg(test)]
impl<P: PullSocket> Sink<P> {
    pub(crate) fn drain_pending(&mut self) {
        loop {
            match self.socket.poll(Duration::from_millis(20)) {
                Ok(PollOutcome::Ready) => {
                    let _ = self.socket.recv_parts();
                }
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::RecorderKey;
    use crate::recorder::Recorder;
    use crate::recorder_key;
    use crate::test_support;

    recorder_key! {
        enum Gauge { Value }
    }

    #[test]
    fn drains_buffered_records_after_stop_is_requested() {
        let mut sink = test_support::locked_sink();
        sink.drain_pending();

        let rec = Recorder::<Gauge>::new("producer", 7);
        rec.setup(Gauge::Value, "value", "unit", "desc");
        rec.record(Gauge::Value, 1i64); // init edge: 1 record
        rec.record(Gauge::Value, 2i64); // changed: edge-doubled, 2 records
        rec.flush();
        drop(rec);

        let stop = AtomicBool::new(true);
        let summary = sink.run(&stop).unwrap();

        assert_eq!(summary.recorders_seen, 1);
        assert_eq!(summary.messages, 3);
        assert_eq!(sink.counters.values().sum::<u64>(), 3);
        assert!(sink
            .counters
            .keys()
            .all(|(_, key)| *key == Gauge::Value.wire_key()));
    }
}
