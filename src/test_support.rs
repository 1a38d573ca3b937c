//! Shared harness for `#[cfg(test)]` modules scattered across this crate.
//!
//! `bootstrap::configure` is a process-wide `OnceLock` (§4.4): the first
//! call wins and every later call with a *different* address is fatal
//! (`std::process::exit`). Every `#[cfg(test)] mod tests` in this crate's
//! `src/` tree compiles into the *same* lib test binary, so any two test
//! functions that each called `bootstrap::configure` with their own unique
//! address would race to be "first" and the loser would abort the whole
//! test run. This module gives every such test one shared address and one
//! shared, mutex-guarded `InprocPull` instead: acquiring [`locked_sink`]
//! both configures bootstrap (idempotently, same address every time) and
//! serializes against every other test using this harness for as long as
//! the guard is held, so concurrently-running tests never interleave
//! frames on the same in-process channel.

use crate::bootstrap;
use crate::sink::Sink;
use crate::transport::inproc::InprocPull;
use crate::transport::SocketOptions;
use std::sync::{Mutex, MutexGuard, OnceLock};

const SHARED_ADDRESS: &str = "inproc://telemetry-recorder-lib-tests";

static SHARED_SINK: OnceLock<Mutex<Sink<InprocPull>>> = OnceLock::new();

/// Configure bootstrap (once, idempotently) and lock the one process-wide
/// sink for the caller's exclusive use. Hold the guard for the entire body
/// of a test that constructs a `Recorder`, and call
/// [`Sink::drain_pending`](crate::sink::Sink::drain_pending) before
/// releasing it unless the test itself is the one consuming via `run()` —
/// otherwise stray frames sit in the channel and inflate the next test's
/// counts.
pub(crate) fn locked_sink() -> MutexGuard<'static, Sink<InprocPull>> {
    bootstrap::configure(SHARED_ADDRESS, SocketOptions::default());
    SHARED_SINK
        .get_or_init(|| {
            Mutex::new(Sink::bind(SHARED_ADDRESS, SocketOptions::default(), false).unwrap())
        })
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
