//! Optional control plane: a text-command registry ("connect",
//! "disconnect", "freq") guarding a client list, and an updater thread
//! that ticks on a fixed period and pushes a synthetic payload to
//! whichever clients are due this tick.
//!
//! A request/reply exchange here is nothing more than "read one request,
//! write one reply, repeat", so it's implemented directly over a blocking
//! `std::net::TcpListener` rather than stretching the PUSH/PULL-only
//! [`crate::transport`] adapter to cover it. Per-client *data* delivery
//! does go through that adapter ([`bootstrap::open_push_socket_to`]), so a
//! registered client can be anywhere the transport already knows how to
//! reach (`inproc://` or `tcp://`).

use crate::bootstrap;
use crate::transport::{PushSocket, SocketOptions};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Tick period for the updater thread.
const UPDATE_PERIOD: Duration = Duration::from_millis(250);

struct ClientState {
    id: i32,
    address: String,
    freq: u32,
    socket: Option<Box<dyn PushSocket>>,
}

#[derive(Default)]
struct Registry {
    clients: Vec<ClientState>,
}

impl Registry {
    fn connect(&mut self, next_id: &AtomicI32, address: String) -> String {
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.push(ClientState {
            id,
            address,
            freq: 1,
            socket: None,
        });
        format!("{id} connected")
    }

    fn disconnect(&mut self, id: i32) -> String {
        let before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        if self.clients.len() == before {
            "N/A".to_string()
        } else {
            format!("disconnect {id}")
        }
    }

    fn set_frequency(&mut self, id: i32, freq: u32) -> String {
        match self.clients.iter_mut().find(|c| c.id == id) {
            Some(client) => {
                client.freq = freq.max(1);
                format!("frequency {id} = {freq}Hz")
            }
            None => "N/A".to_string(),
        }
    }
}

fn handle_command(registry: &Mutex<Registry>, next_id: &AtomicI32, line: &str) -> String {
    let mut parts = line.trim().split_whitespace();
    match parts.next() {
        Some("connect") => match parts.next() {
            Some(addr) => registry.lock().connect(next_id, addr.to_string()),
            None => "connect requires an address argument".to_string(),
        },
        Some("disconnect") => match parts.next().and_then(|s| s.parse::<i32>().ok()) {
            Some(id) => registry.lock().disconnect(id),
            None => "disconnect requires a client id argument".to_string(),
        },
        Some("freq") => {
            let id = parts.next().and_then(|s| s.parse::<i32>().ok());
            let freq = parts.next().and_then(|s| s.parse::<u32>().ok());
            match (id, freq) {
                (Some(id), Some(freq)) => registry.lock().set_frequency(id, freq),
                _ => "freq requires <id> <hz>".to_string(),
            }
        }
        Some(other) => format!("unknown command: {other}"),
        None => String::new(),
    }
}

fn serve_connection(stream: TcpStream, registry: &Mutex<Registry>, next_id: &AtomicI32) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone control stream"));
    let mut writer = stream;
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap_or(0) == 0 {
        return;
    }
    let reply = handle_command(registry, next_id, &line);
    tracing::debug!(request = line.trim(), reply = %reply, "control command handled");
    let _ = writeln!(writer, "{reply}");
}

fn run_updater(registry: Arc<Mutex<Registry>>, running: Arc<AtomicBool>) {
    let mut loop_count: u64 = 0;
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(UPDATE_PERIOD);
        let mut reg = registry.lock();
        for client in reg.clients.iter_mut() {
            if loop_count % client.freq as u64 != 0 {
                continue;
            }
            if client.socket.is_none() {
                match bootstrap::open_push_socket_to(&client.address, SocketOptions::default()) {
                    Ok(socket) => client.socket = Some(socket),
                    Err(err) => {
                        tracing::warn!(client_id = client.id, error = %err, "could not reach control client");
                        continue;
                    }
                }
            }
            let payload = format!("data:{loop_count}").into_bytes();
            if let Some(socket) = client.socket.as_mut() {
                if let Err(err) = socket.send_parts(&[payload]) {
                    tracing::warn!(client_id = client.id, error = %err, "control push failed");
                    client.socket = None;
                }
            }
        }
        loop_count += 1;
    }
}

/// A running control plane. Dropping this joins both threads.
pub struct ControlServer {
    running: Arc<AtomicBool>,
    control_thread: Option<JoinHandle<()>>,
    updater_thread: Option<JoinHandle<()>>,
    local_addr: String,
}

impl ControlServer {
    /// Bind `control_address` and start the control-command and updater
    /// threads. Binding is fatal on failure, matching every other
    /// transport bind in this crate.
    pub fn start(control_address: &str) -> Self {
        let listener = TcpListener::bind(control_address).unwrap_or_else(|e| {
            crate::error::fatal(crate::error::RecorderError::BindFailed {
                address: control_address.to_string(),
                source: e,
            })
        });
        let local_addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| control_address.to_string());

        let registry = Arc::new(Mutex::new(Registry::default()));
        let next_id = Arc::new(AtomicI32::new(1000));
        let running = Arc::new(AtomicBool::new(true));

        let control_thread = {
            let registry = Arc::clone(&registry);
            let next_id = Arc::clone(&next_id);
            let running = Arc::clone(&running);
            listener
                .set_nonblocking(true)
                .expect("control listener nonblocking");
            std::thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    match listener.accept() {
                        Ok((stream, _)) => serve_connection(stream, &registry, &next_id),
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(20));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "control accept failed");
                        }
                    }
                }
            })
        };

        let updater_thread = {
            let registry = Arc::clone(&registry);
            let running = Arc::clone(&running);
            std::thread::spawn(move || run_updater(registry, running))
        };

        ControlServer {
            running,
            control_thread: Some(control_thread),
            updater_thread: Some(updater_thread),
            local_addr,
        }
    }

    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(t) = self.control_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.updater_thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
