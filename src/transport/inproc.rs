//! In-process PUSH/PULL backend.
//!
//! Zero real sockets: a process-wide registry maps an address string to a
//! bounded [`crossbeam::channel`], which plays the role of ZeroMQ's
//! `inproc://` transport (including its well-known quirk that `connect`
//! only succeeds once something has already `bind`-ed the same address —
//! producers are expected to start after the sink, matching the bootstrap
//! ordering §4.4 already requires).
//!
//! The channel's bounded capacity stands in for `recv_hwm`; a full channel
//! makes `send_parts` block for up to `send_timeout` before giving up,
//! exactly like a real PUSH socket hitting its high-water mark.

use super::{Part, PollOutcome, PushSocket, PullSocket, SocketOptions};
use crate::error::RecorderError;
use crossbeam::channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

type Message = Vec<Part>;

fn registry() -> &'static Mutex<HashMap<String, Sender<Message>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Sender<Message>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Sending half bound to an `inproc://`-style address.
pub struct InprocPush {
    address: String,
    sender: Sender<Message>,
    send_timeout: Duration,
}

impl PushSocket for InprocPush {
    fn connect(address: &str, opts: SocketOptions) -> Result<Self, RecorderError> {
        let sender = registry()
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| RecorderError::ConnectFailed {
                address: address.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no sink bound at this address yet",
                ),
            })?;
        Ok(InprocPush {
            address: address.to_string(),
            sender,
            send_timeout: opts.send_timeout,
        })
    }

    fn send_parts(&mut self, parts: &[Part]) -> Result<(), RecorderError> {
        match self
            .sender
            .send_timeout(parts.to_vec(), self.send_timeout)
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(RecorderError::TransportSend(format!(
                "send to {} timed out (hwm reached)",
                self.address
            ))),
            Err(SendTimeoutError::Disconnected(_)) => Err(RecorderError::TransportSend(format!(
                "sink at {} is gone",
                self.address
            ))),
        }
    }
}

/// Receiving half bound to an `inproc://`-style address.
pub struct InprocPull {
    address: String,
    receiver: Receiver<Message>,
    pending: Option<Message>,
}

impl PullSocket for InprocPull {
    fn bind(address: &str, opts: SocketOptions) -> Result<Self, RecorderError> {
        let (tx, rx) = bounded(opts.recv_hwm);
        let mut reg = registry().lock();
        if reg.contains_key(address) {
            return Err(RecorderError::BindFailed {
                address: address.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    "address already bound in-process",
                ),
            });
        }
        reg.insert(address.to_string(), tx);
        Ok(InprocPull {
            address: address.to_string(),
            receiver: rx,
            pending: None,
        })
    }

    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, RecorderError> {
        if self.pending.is_some() {
            return Ok(PollOutcome::Ready);
        }
        // crossbeam::Receiver has no peek; stash the message in `pending`
        // so poll() can report readiness without consuming it, and
        // recv_parts() drains `pending` first.
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => {
                self.pending = Some(msg);
                Ok(PollOutcome::Ready)
            }
            Err(_) => Ok(PollOutcome::Timeout),
        }
    }

    fn recv_parts(&mut self) -> Result<Vec<Part>, RecorderError> {
        if let Some(msg) = self.pending.take() {
            return Ok(msg);
        }
        self.receiver
            .recv()
            .map_err(|_| RecorderError::TransportPoll(format!("sender for {} gone", self.address)))
    }

    fn last_endpoint(&self) -> String {
        self.address.clone()
    }
}
