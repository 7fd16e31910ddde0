//! Shutdown coordination: termination signals → one finalization.
//!
//! [`SessionWriter::close`](super::writer::SessionWriter::close) is
//! idempotent, so the coordinator's job is wiring, not deduplication:
//! register one handler for the interrupt and terminate signals, run
//! `close()` once when either fires, and deregister when the guard
//! drops so long-lived test processes constructing many writers don't
//! leak handlers. Normal-exit finalization is covered by the writer's
//! own `Drop`.
//!
//! The handler performs only the finalize rename (plus at most one
//! retried rename), never heavy I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::writer::SharedSessionWriter;

#[cfg(unix)]
use signal_hook::consts::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Registers termination-signal handlers for a shared session writer.
pub struct ShutdownCoordinator;

impl ShutdownCoordinator {
    /// Install a SIGINT/SIGTERM handler that finalizes `writer`.
    ///
    /// Returns a guard; dropping it deregisters the handler and joins
    /// the signal thread. Multiple triggers in one shutdown (interrupt
    /// followed by terminate) finalize only once.
    #[cfg(unix)]
    pub fn install(writer: SharedSessionWriter) -> std::io::Result<ShutdownGuard> {
        let ran = Arc::new(AtomicBool::new(false));
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();

        let thread = std::thread::spawn(move || {
            for _signal in signals.forever() {
                finalize_once(&writer, &ran);
            }
        });

        Ok(ShutdownGuard {
            handle,
            thread: Some(thread),
        })
    }

    /// Signal-based finalization is a unix feature; elsewhere the guard
    /// is inert and finalization rides on the writer's `Drop`.
    #[cfg(not(unix))]
    pub fn install(_writer: SharedSessionWriter) -> std::io::Result<ShutdownGuard> {
        Ok(ShutdownGuard {})
    }
}

fn finalize_once(writer: &SharedSessionWriter, ran: &AtomicBool) {
    if ran.swap(true, Ordering::SeqCst) {
        return;
    }
    match writer.lock() {
        Ok(mut writer) => {
            if let Err(error) = writer.close() {
                warn!(%error, "failed to finalize session log on shutdown signal");
            }
        }
        // A writer thread panicked mid-append; skip the rename rather
        // than panic inside the signal thread.
        Err(_) => warn!("session writer lock poisoned; skipping finalize"),
    }
}

/// Deregisters the signal handler when dropped.
pub struct ShutdownGuard {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
