//! # Transport Adapter
//!
//! A minimal PUSH/PULL wrapper (§4.2): producer sockets only ever send, the
//! sink socket only ever receives, and everything is framed as independent
//! "parts" of one logical message, the way a `zmq::socket_t::send(...,
//! ZMQ_SNDMORE)` multipart send is.
//!
//! Two backends implement [`PushSocket`]/[`PullSocket`]:
//! - [`inproc`] — a process-wide registry of bounded channels, used for the
//!   typical `inproc://name` deployment.
//! - [`tcp`] — length-prefixed framing over `tokio::net::TcpStream`, for
//!   deployments that need the sink on a different host.

pub mod inproc;
pub mod tcp;

use crate::error::RecorderError;
use std::time::Duration;

/// One part of a multipart message. `DATA` frames are three parts
/// (`FrameType`, `recorder_id`, payload bytes); `INIT_*` frames are two.
pub type Part = Vec<u8>;

/// Socket options named in §4.2/§6. Producer (`PUSH`) sockets use
/// `linger`/`send_timeout`/`send_hwm`; the sink's `PULL` socket uses only
/// `recv_hwm`.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub linger: Duration,
    pub send_timeout: Duration,
    pub send_hwm: usize,
    pub recv_hwm: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        SocketOptions {
            linger: Duration::from_millis(3000),
            send_timeout: Duration::from_millis(2),
            send_hwm: 16_000,
            recv_hwm: 16_000,
        }
    }
}

/// Outcome of [`PullSocket::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    Timeout,
}

/// The sending half of the transport (a producer's thread-local handle).
///
/// `connect` is fatal on failure per §4.2's error policy; `send_parts` on an
/// established socket returns a transient [`RecorderError::TransportSend`]
/// that callers are expected to log and drop rather than retry (§7).
pub trait PushSocket: Send {
    fn connect(address: &str, opts: SocketOptions) -> Result<Self, RecorderError>
    where
        Self: Sized;

    /// Send all `parts` as one multipart message. Must either send every
    /// part or none — a transport that fails partway must not leave a
    /// half-written frame for the sink to misinterpret.
    fn send_parts(&mut self, parts: &[Part]) -> Result<(), RecorderError>;
}

/// The receiving half of the transport (the sink's bound socket).
pub trait PullSocket: Send {
    fn bind(address: &str, opts: SocketOptions) -> Result<Self, RecorderError>
    where
        Self: Sized;

    /// Block for up to `timeout` waiting for a message to become
    /// available. Does not consume it — `recv_parts` does.
    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, RecorderError>;

    /// Receive one complete multipart message. Only valid to call after
    /// `poll` returned [`PollOutcome::Ready`].
    fn recv_parts(&mut self) -> Result<Vec<Part>, RecorderError>;

    /// The concrete endpoint this socket ended up bound to (§4.2
    /// `last_endpoint`), e.g. after binding an ephemeral TCP port.
    fn last_endpoint(&self) -> String;
}

/// Picks [`inproc::InprocPull`] or [`tcp::TcpPull`] by address scheme at
/// bind time, so a driver that only knows the address string at runtime
/// (the example binaries' `--address` flag) can still hand
/// [`crate::sink::Sink`] one concrete, `Sized` type.
pub enum AnyPull {
    Inproc(inproc::InprocPull),
    Tcp(tcp::TcpPull),
}

impl PullSocket for AnyPull {
    fn bind(address: &str, opts: SocketOptions) -> Result<Self, RecorderError> {
        match address.strip_prefix("tcp://") {
            Some(rest) => tcp::TcpPull::bind(rest, opts).map(AnyPull::Tcp),
            None => inproc::InprocPull::bind(address, opts).map(AnyPull::Inproc),
        }
    }

    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, RecorderError> {
        match self {
            AnyPull::Inproc(p) => p.poll(timeout),
            AnyPull::Tcp(p) => p.poll(timeout),
        }
    }

    fn recv_parts(&mut self) -> Result<Vec<Part>, RecorderError> {
        match self {
            AnyPull::Inproc(p) => p.recv_parts(),
            AnyPull::Tcp(p) => p.recv_parts(),
        }
    }

    fn last_endpoint(&self) -> String {
        match self {
            AnyPull::Inproc(p) => p.last_endpoint(),
            AnyPull::Tcp(p) => p.last_endpoint(),
        }
    }
}
