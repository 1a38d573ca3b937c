//! # Wire Frame Layouts
//!
//! Fixed, packed, endian-native byte layouts for everything that crosses the
//! PUSH/PULL transport (see [`crate::transport`]): the one-time `InitRecorder`
//! and `InitItem` metadata frames, and the repeating `ItemRecord` sample.
//!
//! Every struct here is `#[repr(C, packed)]` and hand-encoded to `[u8; N]`
//! rather than routed through `serde`/`bincode`: the sink reconstructs frames
//! by `bytes.len() / size_of::<ItemRecord>()`, which only works if the layout
//! is fixed and self-describing without a length prefix per field. `N` is
//! checked to be a power of two at compile time (§4.1, P6).

use std::convert::TryInto;

/// Discriminator carried as the first part of every wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FrameType {
    InitRecorder = 0,
    InitItem = 1,
    Data = 2,
}

impl FrameType {
    pub fn to_bytes(self) -> [u8; 4] {
        (self as u32).to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        match u32::from_le_bytes(bytes) {
            0 => Some(FrameType::InitRecorder),
            1 => Some(FrameType::InitItem),
            2 => Some(FrameType::Data),
            _ => None,
        }
    }
}

/// Closed tagged kind for a recorded value.
///
/// `Unset` means the key has no slot at all (protocol misuse if `record` is
/// called); `Init` means the slot exists but no concrete kind has been
/// frozen yet. Once a key leaves `Init` its kind never changes again (I2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ScalarKind {
    Unset = -1,
    Init = 0,
    Other = 1,
    Char = 2,
    Int = 3,
    Uint = 4,
    Float = 5,
    Str = 6,
}

impl ScalarKind {
    pub fn from_i8(v: i8) -> Option<Self> {
        match v {
            -1 => Some(ScalarKind::Unset),
            0 => Some(ScalarKind::Init),
            1 => Some(ScalarKind::Other),
            2 => Some(ScalarKind::Char),
            3 => Some(ScalarKind::Int),
            4 => Some(ScalarKind::Uint),
            5 => Some(ScalarKind::Float),
            6 => Some(ScalarKind::Str),
            _ => None,
        }
    }
}

/// Fixed 8-byte payload, interpreted according to the sibling `ScalarKind`.
///
/// Arrays of 1-3 elements widen to the 64-bit variant of the element type
/// and reuse the same 8 bytes (`length` in [`ItemRecord`] records how many
/// of the 8 bytes are meaningful, in units of the element width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarValue(pub [u8; 8]);

impl ScalarValue {
    pub const ZERO: ScalarValue = ScalarValue([0u8; 8]);

    pub fn from_i64(v: i64) -> Self {
        ScalarValue(v.to_le_bytes())
    }
    pub fn from_u64(v: u64) -> Self {
        ScalarValue(v.to_le_bytes())
    }
    pub fn from_f64(v: f64) -> Self {
        ScalarValue(v.to_le_bytes())
    }
    pub fn from_char(c: u8) -> Self {
        let mut b = [0u8; 8];
        b[0] = c;
        ScalarValue(b)
    }

    pub fn as_i64(self) -> i64 {
        i64::from_le_bytes(self.0)
    }
    pub fn as_u64(self) -> u64 {
        u64::from_le_bytes(self.0)
    }
    pub fn as_f64(self) -> f64 {
        f64::from_le_bytes(self.0)
    }
    pub fn as_char(self) -> u8 {
        self.0[0]
    }
}

/// One sample. `key`/`kind`/`length`/`time` plus an 8-byte scalar payload —
/// 16 bytes total, a power of two (P6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRecord {
    pub key: i16,
    pub kind: ScalarKind,
    pub length: i8,
    pub time: i32,
    pub data: ScalarValue,
}

pub const ITEM_RECORD_SIZE: usize = 16;

impl ItemRecord {
    pub fn unset(key: i16) -> Self {
        ItemRecord {
            key,
            kind: ScalarKind::Init,
            length: 0,
            time: 0,
            data: ScalarValue::ZERO,
        }
    }

    pub fn to_bytes(self) -> [u8; ITEM_RECORD_SIZE] {
        let mut buf = [0u8; ITEM_RECORD_SIZE];
        buf[0..2].copy_from_slice(&self.key.to_le_bytes());
        buf[2] = self.kind as i8 as u8;
        buf[3] = self.length as u8;
        buf[4..8].copy_from_slice(&self.time.to_le_bytes());
        buf[8..16].copy_from_slice(&self.data.0);
        buf
    }

    pub fn from_bytes(buf: &[u8; ITEM_RECORD_SIZE]) -> Option<Self> {
        let key = i16::from_le_bytes(buf[0..2].try_into().unwrap());
        let kind = ScalarKind::from_i8(buf[2] as i8)?;
        let length = buf[3] as i8;
        let time = i32::from_le_bytes(buf[4..8].try_into().unwrap());
        let mut data = [0u8; 8];
        data.copy_from_slice(&buf[8..16]);
        Some(ItemRecord {
            key,
            kind,
            length,
            time,
            data: ScalarValue(data),
        })
    }

    /// Decode a concatenated DATA-frame payload into individual records.
    ///
    /// `bytes.len()` must be a multiple of [`ITEM_RECORD_SIZE`]; a trailing
    /// partial record is dropped rather than panicking, since a corrupt
    /// frame should degrade the sink's counters, not crash it.
    pub fn decode_batch(bytes: &[u8]) -> Vec<ItemRecord> {
        bytes
            .chunks_exact(ITEM_RECORD_SIZE)
            .filter_map(|chunk| ItemRecord::from_bytes(chunk.try_into().unwrap()))
            .collect()
    }
}

const NAME_LEN: usize = 32;
const UNIT_LEN: usize = 32;
const DESC_LEN: usize = 186;

/// Emitted once per key, immediately after `setup()` registers it.
///
/// 258 bytes of payload rounded up to the next power of two (256 would
/// truncate `desc` by four bytes, so `desc` is sized to land exactly on
/// 256 total): `2(recorder_id) + 2(key) + 32(name) + 32(unit) + 186(desc) = 254`,
/// padded by 2 reserved bytes to 256.
#[derive(Debug, Clone)]
pub struct InitItem {
    pub recorder_id: i16,
    pub key: i16,
    pub name: String,
    pub unit: String,
    pub desc: String,
}

pub const INIT_ITEM_SIZE: usize = 256;

fn pack_str(dst: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
}

fn unpack_str(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

impl InitItem {
    pub fn to_bytes(&self) -> [u8; INIT_ITEM_SIZE] {
        let mut buf = [0u8; INIT_ITEM_SIZE];
        buf[0..2].copy_from_slice(&self.recorder_id.to_le_bytes());
        buf[2..4].copy_from_slice(&self.key.to_le_bytes());
        pack_str(&mut buf[4..4 + NAME_LEN], &self.name);
        pack_str(&mut buf[4 + NAME_LEN..4 + NAME_LEN + UNIT_LEN], &self.unit);
        pack_str(
            &mut buf[4 + NAME_LEN + UNIT_LEN..4 + NAME_LEN + UNIT_LEN + DESC_LEN],
            &self.desc,
        );
        buf
    }

    pub fn from_bytes(buf: &[u8; INIT_ITEM_SIZE]) -> Self {
        InitItem {
            recorder_id: i16::from_le_bytes(buf[0..2].try_into().unwrap()),
            key: i16::from_le_bytes(buf[2..4].try_into().unwrap()),
            name: unpack_str(&buf[4..4 + NAME_LEN]),
            unit: unpack_str(&buf[4 + NAME_LEN..4 + NAME_LEN + UNIT_LEN]),
            desc: unpack_str(&buf[4 + NAME_LEN + UNIT_LEN..4 + NAME_LEN + UNIT_LEN + DESC_LEN]),
        }
    }
}

const RECORDER_NAME_LEN: usize = 52;

/// Emitted once per recorder, upon construction.
///
/// `8(external_id) + 2(recorder_id) + 2(num_items) + 52(name) = 64` bytes,
/// a power of two.
#[derive(Debug, Clone)]
pub struct InitRecorder {
    pub external_id: i64,
    pub recorder_id: i16,
    pub num_items: i16,
    pub name: String,
}

pub const INIT_RECORDER_SIZE: usize = 64;

impl InitRecorder {
    pub fn to_bytes(&self) -> [u8; INIT_RECORDER_SIZE] {
        let mut buf = [0u8; INIT_RECORDER_SIZE];
        buf[0..8].copy_from_slice(&self.external_id.to_le_bytes());
        buf[8..10].copy_from_slice(&self.recorder_id.to_le_bytes());
        buf[10..12].copy_from_slice(&self.num_items.to_le_bytes());
        pack_str(&mut buf[12..12 + RECORDER_NAME_LEN], &self.name);
        buf
    }

    pub fn from_bytes(buf: &[u8; INIT_RECORDER_SIZE]) -> Self {
        InitRecorder {
            external_id: i64::from_le_bytes(buf[0..8].try_into().unwrap()),
            recorder_id: i16::from_le_bytes(buf[8..10].try_into().unwrap()),
            num_items: i16::from_le_bytes(buf[10..12].try_into().unwrap()),
            name: unpack_str(&buf[12..12 + RECORDER_NAME_LEN]),
        }
    }
}

/// Compile-time power-of-two check for a wire struct's encoded size (S6).
///
/// `N` must already be known not to be zero; all call sites below pass a
/// `const` byte-size, so a zero-sized struct would be an implementation bug
/// caught the first time this macro is evaluated.
macro_rules! assert_pow2_size {
    ($name:literal, $size:expr) => {
        const _: () = assert!(
            $size != 0 && ($size & ($size - 1)) == 0,
            concat!("size of ", $name, " must be a power of two")
        );
    };
}

assert_pow2_size!("ItemRecord", ITEM_RECORD_SIZE);
assert_pow2_size!("InitItem", INIT_ITEM_SIZE);
assert_pow2_size!("InitRecorder", INIT_RECORDER_SIZE);
