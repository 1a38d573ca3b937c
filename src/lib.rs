//! In-process telemetry recording: typed producer keys, edge-detected
//! sampling, and a polling sink over a pluggable PUSH/PULL transport.
//!
//! A producer builds a [`Recorder`](recorder::Recorder) over a
//! [`RecorderKey`](key::RecorderKey) enum (usually declared with
//! [`recorder_key!`]), `setup()`s each key once, then `record()`s values
//! as they change; unchanged values are suppressed and a changed value is
//! emitted as a two-record edge so a consumer can reconstruct a step
//! function. A [`Sink`](sink::Sink) on the other end polls the transport
//! and decodes the same wire frames back into per-key samples.

pub mod bootstrap;
pub mod cli;
pub mod control;
pub mod error;
pub mod key;
pub mod logging;
pub mod recorder;
pub mod sink;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use error::RecorderError;
pub use key::RecorderKey;
pub use recorder::{dropped_batches, dropped_bytes, Recordable, Recorder};
pub use sink::{Sink, SinkSummary};

/// The current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values.
pub mod defaults {
    /// Default `inproc://` address used by the example drivers.
    pub const ADDRESS: &str = "inproc://telemetry";

    /// Default control-plane bind address.
    pub const CONTROL_ADDRESS: &str = "127.0.0.1:10000";
}
