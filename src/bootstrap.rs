//! Process-wide bootstrap state.
//!
//! A `Recorder` cannot be constructed until [`configure`] has run once,
//! and every `Recorder` after that shares the same address and socket
//! options but opens its own thread-local PUSH socket lazily, on first
//! use.

use crate::error::{fatal, RecorderError};
use crate::transport::{inproc::InprocPush, tcp::TcpPush, PushSocket, SocketOptions};
use std::cell::RefCell;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

struct Config {
    address: String,
    opts: SocketOptions,
}

static CONFIG: OnceLock<Config> = OnceLock::new();
static NEXT_RECORDER_ID: AtomicI32 = AtomicI32::new(0);
static WRAP_WARNED: AtomicU32 = AtomicU32::new(0);
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Set the process-wide PUSH/PULL address and socket options once.
///
/// Must run before any [`crate::recorder::Recorder`] is constructed. A
/// second call with a different address is a programming error and is
/// fatal; a second call with the *same* address is accepted as a no-op so
/// tests and examples that call `configure` defensively don't need to
/// track whether it already ran.
pub fn configure(address: impl Into<String>, opts: SocketOptions) {
    let address = address.into();
    match CONFIG.get() {
        Some(existing) if existing.address == address => {}
        Some(_) => fatal(RecorderError::MissingConfig(
            "telemetry already configured with a different address; configure() must be called with the same address every time",
        )),
        None => {
            let _ = CONFIG.set(Config { address, opts });
        }
    }
}

fn config() -> &'static Config {
    CONFIG
        .get()
        .unwrap_or_else(|| fatal(RecorderError::MissingConfig("call bootstrap::configure first")))
}

pub fn address() -> &'static str {
    &config().address
}

pub fn socket_options() -> SocketOptions {
    config().opts
}

/// Elapsed milliseconds since the first call in this process, truncated to
/// `i32`: a monotonically increasing, comparable timestamp that doesn't
/// depend on wall-clock time jumping around. Wraps after ~24 days of
/// uptime.
pub fn now_millis() -> i32 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as i32
}

/// Reserve the next recorder id.
///
/// Wraps silently once the counter exceeds `i16::MAX`, reusing ids rather
/// than panicking or refusing further recorders; the first wrap is logged
/// once at `warn!` so a long-running process doesn't lose visibility into
/// id reuse entirely.
pub fn next_recorder_id() -> i16 {
    let raw = NEXT_RECORDER_ID.fetch_add(1, Ordering::Relaxed);
    let wrapped = (raw % (i16::MAX as i32 + 1)) as i16;
    if raw > i16::MAX as i32 && WRAP_WARNED.swap(1, Ordering::Relaxed) == 0 {
        tracing::warn!(
            "recorder id counter wrapped past i16::MAX; ids are reused (unguarded by design)"
        );
    }
    wrapped
}

enum Backend {
    Inproc,
    Tcp,
}

fn backend_for(address: &str) -> Backend {
    if address.starts_with("tcp://") {
        Backend::Tcp
    } else {
        Backend::Inproc
    }
}

fn strip_scheme(address: &str) -> &str {
    address.strip_prefix("tcp://").unwrap_or(address)
}

/// Open a PUSH socket to `address` using whichever backend its scheme
/// selects. Shared by the per-thread handle below and by
/// [`crate::control`]'s updater thread, which opens short-lived sockets to
/// addresses outside the process-wide `configure()` target.
pub(crate) fn open_push_socket_to(
    address: &str,
    opts: SocketOptions,
) -> Result<Box<dyn PushSocket>, RecorderError> {
    match backend_for(address) {
        Backend::Inproc => {
            InprocPush::connect(address, opts).map(|s| Box::new(s) as Box<dyn PushSocket>)
        }
        Backend::Tcp => TcpPush::connect(strip_scheme(address), opts)
            .map(|s| Box::new(s) as Box<dyn PushSocket>),
    }
}

fn open_push_socket() -> Result<Box<dyn PushSocket>, RecorderError> {
    let cfg = config();
    open_push_socket_to(&cfg.address, cfg.opts)
}

thread_local! {
    static PUSH_SOCKET: RefCell<Option<Box<dyn PushSocket>>> = RefCell::new(None);
}

/// Run `f` against this thread's lazily-opened PUSH socket, opening it on
/// first use. Each thread gets its own socket — sockets are never shared
/// across threads.
pub fn with_push_socket<F, R>(f: F) -> Result<R, RecorderError>
where
    F: FnOnce(&mut dyn PushSocket) -> Result<R, RecorderError>,
{
    PUSH_SOCKET.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            // A socket that fails to open has no way to report a failed
            // send later, so this is fatal immediately instead.
            *slot = Some(open_push_socket().unwrap_or_else(|e| fatal(e)));
        }
        f(slot.as_mut().unwrap().as_mut())
    })
}
