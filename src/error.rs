//! Error taxonomy.
//!
//! Two propagation styles coexist:
//!
//! - *Fatal* variants (missing bootstrap config, protocol misuse) never
//!   reach a caller as a `Result` — they are logged at `error!` and the
//!   process exits via [`fatal`], matching a fail-fast `bind`/`connect`
//!   policy.
//! - *Transient* variants (`TransportSend`, `TransportPoll`) are ordinary
//!   `Result`s; callers inside `RecorderCommon::flush` log and count them
//!   rather than propagate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("transport context/address not configured: {0}")]
    MissingConfig(&'static str),

    #[error("record() called on key {0} before setup()")]
    KeyNotSetUp(i32),

    #[error("transport send failed: {0}")]
    TransportSend(String),

    #[error("transport poll failed: {0}")]
    TransportPoll(String),

    #[error("transport bind failed for {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport connect failed for {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed wire frame: {0}")]
    WireDecode(&'static str),
}

/// Log a fatal configuration/protocol error and terminate the process.
///
/// Used for unrecoverable misuse: missing context/address at `Recorder`
/// construction, and `record()` on an unregistered key. Never call this
/// for transient transport failures — those are counted and swallowed
/// instead (see [`crate::recorder::RecorderCommon::flush`]).
pub fn fatal(err: RecorderError) -> ! {
    tracing::error!(error = %err, "fatal telemetry recorder error, exiting");
    std::process::exit(1)
}
