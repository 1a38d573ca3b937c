//! Producer-side recording.
//!
//! `Recorder<K>` is the typed facade a caller holds; `RecorderCommon` does
//! the untyped work it shares with every key set: a recorder id reserved
//! once at construction, an `InitRecorder` frame sent immediately
//! (`num_items` is known up front since `K::COUNT` is a compile-time
//! constant), and a fixed-capacity send buffer that batches `record()`
//! calls into `DATA` frames.
//!
//! The send buffer is owned by the `Recorder` instance rather than shared
//! thread-locally across every recorder live on a thread: a `DATA` frame
//! tags the whole batch with one `recorder_id` (see [`crate::wire`]), so
//! batches from different recorders can't be interleaved in the same
//! frame. The PUSH socket itself stays thread-local and shared
//! (`bootstrap::with_push_socket`), which is the part of "one socket per
//! thread" that actually matters for connection count.

use crate::bootstrap;
use crate::error::{fatal, RecorderError};
use crate::key::RecorderKey;
use crate::wire::{FrameType, InitItem, InitRecorder, ItemRecord, ScalarKind, ScalarValue};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

const SEND_BUFFER_CAPACITY: usize = 1 << 10;

/// Process-wide tally of bytes and batches dropped on a transient transport
/// failure (§7 "increment a dropped-bytes counter"). Global rather than
/// per-recorder: a dropped batch is a transport-level event, not specific
/// to the recorder whose buffer happened to be flushing at the time, and a
/// single counter is cheap to expose from a metrics/health endpoint.
static DROPPED_BATCHES: AtomicU64 = AtomicU64::new(0);
static DROPPED_BYTES: AtomicU64 = AtomicU64::new(0);

/// Total bytes dropped across every recorder in this process because a send
/// hit the transport's send-timeout or high-water mark (§7 transient
/// transport errors).
pub fn dropped_bytes() -> u64 {
    DROPPED_BYTES.load(Ordering::Relaxed)
}

/// Total batches (DATA/INIT_* frames) dropped for the same reason as
/// [`dropped_bytes`].
pub fn dropped_batches() -> u64 {
    DROPPED_BATCHES.load(Ordering::Relaxed)
}

/// A value `record()` can accept. Implemented for the four scalar kinds
/// the wire format distinguishes: integer, unsigned integer, float, and
/// single-byte char.
pub trait Recordable: Copy {
    fn scalar_kind() -> ScalarKind;
    fn to_scalar(self) -> ScalarValue;
}

impl Recordable for i64 {
    fn scalar_kind() -> ScalarKind {
        ScalarKind::Int
    }
    fn to_scalar(self) -> ScalarValue {
        ScalarValue::from_i64(self)
    }
}

impl Recordable for u64 {
    fn scalar_kind() -> ScalarKind {
        ScalarKind::Uint
    }
    fn to_scalar(self) -> ScalarValue {
        ScalarValue::from_u64(self)
    }
}

impl Recordable for f64 {
    fn scalar_kind() -> ScalarKind {
        ScalarKind::Float
    }
    fn to_scalar(self) -> ScalarValue {
        ScalarValue::from_f64(self)
    }
}

impl Recordable for u8 {
    fn scalar_kind() -> ScalarKind {
        ScalarKind::Char
    }
    fn to_scalar(self) -> ScalarValue {
        ScalarValue::from_char(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct TableSlot {
    kind: ScalarKind,
    data: ScalarValue,
}

/// Untyped base shared by every `Recorder<K>`.
pub struct RecorderCommon {
    recorder_id: i16,
    buffer: RefCell<Vec<ItemRecord>>,
    table: RefCell<Vec<Option<TableSlot>>>,
}

impl RecorderCommon {
    fn new(name: &str, external_id: i64, num_items: usize) -> Self {
        let recorder_id = bootstrap::next_recorder_id();
        let common = RecorderCommon {
            recorder_id,
            buffer: RefCell::new(Vec::with_capacity(SEND_BUFFER_CAPACITY)),
            table: RefCell::new(vec![None; num_items]),
        };
        common.send_init_recorder(external_id, name, num_items as i16);
        common
    }

    fn send_init_recorder(&self, external_id: i64, name: &str, num_items: i16) {
        let init = InitRecorder {
            external_id,
            recorder_id: self.recorder_id,
            num_items,
            name: name.to_string(),
        };
        let parts = vec![
            FrameType::InitRecorder.to_bytes().to_vec(),
            init.to_bytes().to_vec(),
        ];
        self.send(parts);
    }

    fn send_init_item(&self, key: i16, name: &str, unit: &str, desc: &str) {
        let init = InitItem {
            recorder_id: self.recorder_id,
            key,
            name: name.to_string(),
            unit: unit.to_string(),
            desc: desc.to_string(),
        };
        let parts = vec![
            FrameType::InitItem.to_bytes().to_vec(),
            init.to_bytes().to_vec(),
        ];
        self.send(parts);
    }

    /// `setup()` is a no-op the second time a key is set up.
    fn setup_slot(&self, index: usize, key: i16, name: &str, unit: &str, desc: &str) {
        let mut table = self.table.borrow_mut();
        if table[index].is_some() {
            return;
        }
        table[index] = Some(TableSlot {
            kind: ScalarKind::Init,
            data: ScalarValue::ZERO,
        });
        drop(table);
        self.send_init_item(key, name, unit, desc);
    }

    /// A key's kind freezes on first assignment and never changes again.
    /// A later value of a different kind is coerced (its raw bytes are
    /// reinterpreted under the frozen kind) rather than rejected or used
    /// to widen the slot. On a genuine change this also edge-doubles: the
    /// stale record is re-timestamped at the new time and emitted first,
    /// then the new record, so a step plotted from the stream never looks
    /// like it changed value before it changed time.
    fn record_slot(&self, index: usize, key: i16, kind: ScalarKind, data: ScalarValue) {
        let time = bootstrap::now_millis();
        let mut table = self.table.borrow_mut();
        let slot = table[index].unwrap_or_else(|| {
            fatal(RecorderError::KeyNotSetUp(key as i32));
        });

        match slot.kind {
            ScalarKind::Init => {
                table[index] = Some(TableSlot { kind, data });
                drop(table);
                self.push(ItemRecord {
                    key,
                    kind,
                    length: 1,
                    time,
                    data,
                });
            }
            frozen => {
                // Kind mismatch: reinterpret the incoming value's raw
                // bytes under the already-frozen kind rather than reject
                // it or widen the slot.
                if data.0 != slot.data.0 {
                    let stale = ItemRecord {
                        key,
                        kind: frozen,
                        length: 1,
                        time,
                        data: slot.data,
                    };
                    table[index] = Some(TableSlot { kind: frozen, data });
                    drop(table);
                    self.push(stale);
                    self.push(ItemRecord {
                        key,
                        kind: frozen,
                        length: 1,
                        time,
                        data,
                    });
                }
                // Unchanged value: ignored.
            }
        }
    }

    fn push(&self, item: ItemRecord) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push(item);
        if buffer.len() == SEND_BUFFER_CAPACITY {
            let batch = std::mem::replace(&mut *buffer, Vec::with_capacity(SEND_BUFFER_CAPACITY));
            drop(buffer);
            self.send_batch(batch);
        }
    }

    /// Force the current buffer out as a `DATA` frame. A no-op on an
    /// empty buffer, so shutdown never emits a zero-length `DATA` frame.
    pub fn flush(&self) {
        let mut buffer = self.buffer.borrow_mut();
        if buffer.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut *buffer, Vec::with_capacity(SEND_BUFFER_CAPACITY));
        drop(buffer);
        self.send_batch(batch);
    }

    fn send_batch(&self, batch: Vec<ItemRecord>) {
        let mut payload = Vec::with_capacity(batch.len() * crate::wire::ITEM_RECORD_SIZE);
        for item in &batch {
            payload.extend_from_slice(&item.to_bytes());
        }
        let parts = vec![
            FrameType::Data.to_bytes().to_vec(),
            self.recorder_id.to_le_bytes().to_vec(),
            payload,
        ];
        self.send(parts);
    }

    /// Transient transport failures are logged and swallowed here: a
    /// dropped batch degrades observability, it must never crash or
    /// back-pressure the caller's `record()`.
    fn send(&self, parts: Vec<Vec<u8>>) {
        let byte_len: usize = parts.iter().map(|p| p.len()).sum();
        let result = bootstrap::with_push_socket(|socket| socket.send_parts(&parts));
        if let Err(err) = result {
            DROPPED_BATCHES.fetch_add(1, Ordering::Relaxed);
            DROPPED_BYTES.fetch_add(byte_len as u64, Ordering::Relaxed);
            tracing::warn!(recorder_id = self.recorder_id, error = %err, "dropping telemetry frame");
        }
    }
}

impl Drop for RecorderCommon {
    fn drop(&mut self) {
        self.flush();
    }
}

/// A recorder scoped to a fixed, compile-time-bounded key set `K`.
pub struct Recorder<K: RecorderKey> {
    common: RecorderCommon,
    _keys: PhantomData<K>,
}

impl<K: RecorderKey> Recorder<K> {
    /// Construct a recorder for `name`/`external_id`, sending its
    /// `InitRecorder` frame immediately. Fatal if
    /// [`crate::bootstrap::configure`] has not run yet — context and
    /// address must be set before any `Recorder` exists.
    pub fn new(name: impl Into<String>, external_id: i64) -> Self {
        // Touch bootstrap config now so a missing `configure()` call
        // fails at construction, not on the first `record()`.
        let _ = bootstrap::address();
        Recorder {
            common: RecorderCommon::new(&name.into(), external_id, K::COUNT),
            _keys: PhantomData,
        }
    }

    /// Register `key` for recording. Idempotent: a second `setup()` call
    /// for an already-registered key is ignored.
    pub fn setup(&self, key: K, name: &str, unit: &str, desc: &str) -> &Self {
        self.common
            .setup_slot(key.index(), key.wire_key(), name, unit, desc);
        self
    }

    /// Record `value` for `key`. Fatal if `key` was never `setup()`.
    pub fn record<V: Recordable>(&self, key: K, value: V) -> &Self {
        self.common
            .record_slot(key.index(), key.wire_key(), V::scalar_kind(), value.to_scalar());
        self
    }

    /// Force any buffered, not-yet-sent records out as a `DATA` frame.
    pub fn flush(&self) {
        self.common.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder_key;
    use crate::test_support;

    recorder_key! {
        enum Temp { Celsius }
    }

    #[test]
    fn init_only_emits_once_and_freezes_kind() {
        let mut sink = test_support::locked_sink();

        let rec = Recorder::<Temp>::new("sensor", 1);
        rec.setup(Temp::Celsius, "temp", "C", "cabin temperature");
        rec.record(Temp::Celsius, 20i64);
        rec.record(Temp::Celsius, 20i64); // unchanged: ignored
        rec.record(Temp::Celsius, 21i64); // changed: edge-doubled
        rec.flush();

        let slot = rec.common.table.borrow()[Temp::Celsius.index()].unwrap();
        assert_eq!(slot.kind, ScalarKind::Int);
        assert_eq!(slot.data.as_i64(), 21);

        drop(rec);
        sink.drain_pending();
    }

    /// A kind mismatch is a coercion, not a rejection: the incoming
    /// value's raw bytes are kept and reinterpreted under whatever kind
    /// is already frozen.
    #[test]
    fn kind_mismatch_is_coerced_under_the_frozen_kind() {
        let mut sink = test_support::locked_sink();

        let rec = Recorder::<Temp>::new("sensor", 2);
        rec.setup(Temp::Celsius, "temp", "C", "cabin temperature");
        rec.record(Temp::Celsius, 20i64); // freezes the slot's kind as Int
        rec.record(Temp::Celsius, 20i64); // unchanged: ignored
        rec.record(Temp::Celsius, 9.1f64); // different kind: coerced, not rejected
        rec.flush();

        let slot = rec.common.table.borrow()[Temp::Celsius.index()].unwrap();
        assert_eq!(slot.kind, ScalarKind::Int, "kind stays frozen at Int");
        assert_eq!(
            slot.data.0,
            9.1f64.to_le_bytes(),
            "9.1f64's raw bytes are kept, just relabeled as Int"
        );
        assert_ne!(
            slot.data.as_i64(),
            20,
            "the coerced bytes differ from the frozen 20, so it registers as a change"
        );

        drop(rec);
        sink.drain_pending();
    }
}
