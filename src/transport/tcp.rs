//! TCP PUSH/PULL backend.
//!
//! Gives producers and the sink a real network transport alongside the
//! in-process one: length-prefixed framing over `tokio::net::TcpStream`,
//! with a dedicated current-thread Tokio runtime per socket so the
//! surrounding [`super::PushSocket`]/[`super::PullSocket`] API stays
//! synchronous — `record()` never suspends, and the sink loop is an
//! ordinary blocking `std::thread`, not an async task.
//!
//! Wire shape per logical multipart message: `u32` part count, then for
//! each part a `u32` length prefix followed by the part's bytes.

use super::{Part, PollOutcome, PushSocket, PullSocket, SocketOptions};
use crate::error::RecorderError;
use crossbeam::channel::{Receiver, Sender};
use socket2::{SockRef, TcpKeepalive};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

fn dedicated_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
}

async fn write_message(stream: &mut TcpStream, parts: &[Part]) -> std::io::Result<()> {
    stream
        .write_all(&(parts.len() as u32).to_le_bytes())
        .await?;
    for part in parts {
        stream.write_all(&(part.len() as u32).to_le_bytes()).await?;
        stream.write_all(part).await?;
    }
    stream.flush().await
}

async fn read_message(stream: &mut TcpStream) -> std::io::Result<Vec<Part>> {
    let mut count_buf = [0u8; 4];
    stream.read_exact(&mut count_buf).await?;
    let count = u32::from_le_bytes(count_buf) as usize;
    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;
        parts.push(buf);
    }
    Ok(parts)
}

/// Sending half: one TCP connection per producer thread, matching the
/// per-thread socket lifetime of §4.4.
pub struct TcpPush {
    runtime: Runtime,
    stream: TcpStream,
    send_timeout: Duration,
}

impl PushSocket for TcpPush {
    fn connect(address: &str, opts: SocketOptions) -> Result<Self, RecorderError> {
        let addr = address.to_string();
        let runtime = dedicated_runtime().map_err(|e| RecorderError::ConnectFailed {
            address: addr.clone(),
            source: e,
        })?;
        let stream = runtime
            .block_on(TcpStream::connect(&addr))
            .map_err(|e| RecorderError::ConnectFailed {
                address: addr.clone(),
                source: e,
            })?;
        let _ = stream.set_nodelay(true);
        Ok(TcpPush {
            runtime,
            stream,
            send_timeout: opts.send_timeout,
        })
    }

    fn send_parts(&mut self, parts: &[Part]) -> Result<(), RecorderError> {
        let fut = write_message(&mut self.stream, parts);
        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(self.send_timeout, fut).await });
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RecorderError::TransportSend(e.to_string())),
            Err(_) => Err(RecorderError::TransportSend(format!(
                "send timed out after {:?} (hwm reached)",
                self.send_timeout
            ))),
        }
    }
}

/// Receiving half: accepts any number of producer connections and
/// multiplexes their decoded messages into one channel, which `poll`/
/// `recv_parts` drain — the TCP analogue of the inproc registry's single
/// shared channel.
///
/// `poll`/`recv_parts` never touch the runtime directly (they block on the
/// plain `crossbeam` channel so the sink thread stays a synchronous
/// `std::thread`, matching §5's "sink loop runs as an ordinary thread").
/// A `current_thread` runtime only drives spawned tasks while something is
/// inside `block_on`, so the accept loop and per-connection readers are
/// kept alive by a dedicated background thread parked in `block_on`
/// forever rather than by `poll`'s caller.
pub struct TcpPull {
    local_addr: String,
    receiver: Receiver<Vec<Part>>,
    pending: Option<Vec<Part>>,
}

impl PullSocket for TcpPull {
    fn bind(address: &str, opts: SocketOptions) -> Result<Self, RecorderError> {
        let addr = address.to_string();
        let runtime = dedicated_runtime().map_err(|e| RecorderError::BindFailed {
            address: addr.clone(),
            source: e,
        })?;
        let listener = runtime
            .block_on(TcpListener::bind(&addr))
            .map_err(|e| RecorderError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;
        let local_addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or(addr.clone());

        let (tx, rx) = crossbeam::channel::bounded::<Vec<Part>>(opts.recv_hwm);
        runtime.spawn(accept_loop(listener, tx));
        std::thread::Builder::new()
            .name(format!("telemetry-tcp-pull-{local_addr}"))
            .spawn(move || runtime.block_on(std::future::pending::<()>()))
            .map_err(|e| RecorderError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        Ok(TcpPull {
            local_addr,
            receiver: rx,
            pending: None,
        })
    }

    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, RecorderError> {
        if self.pending.is_some() {
            return Ok(PollOutcome::Ready);
        }
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
            .map_err(|_| RecorderError::TransportPoll("all producer connections closed".into()))
    }

    fn last_endpoint(&self) -> String {
        self.local_addr.clone()
    }
}

async fn accept_loop(listener: TcpListener, tx: Sender<Vec<Part>>) {
    loop {
        let (stream, _peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "tcp sink accept failed");
                continue;
            }
        };
        apply_keepalive(&stream);
        let tx = tx.clone();
        tokio::spawn(connection_loop(stream, tx));
    }
}

fn apply_keepalive(stream: &TcpStream) {
    let sock = SockRef::from(stream);
    let _ = sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(30)));
}

async fn connection_loop(mut stream: TcpStream, tx: Sender<Vec<Part>>) {
    loop {
        match read_message(&mut stream).await {
            Ok(parts) => {
                if tx.send(parts).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return,
            Err(e) => {
                tracing::warn!(error = %e, "tcp sink connection read failed");
                return;
            }
        }
    }
}
