//! Critical-section signal shared by the apply loop and shutdown.
//!
//! The apply loop holds a [`BusyGuard`] from its first transaction until
//! its last one returns. Shutdown calls [`BusySignal::close_and_wait`],
//! which refuses new sections and blocks until the current one ends, so
//! the process never exits between two batches of the same run.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct BusyState {
    active: bool,
    closed: bool,
}

/// Single-slot "write in progress" signal.
#[derive(Debug, Default)]
pub struct BusySignal {
    state: Mutex<BusyState>,
    changed: Condvar,
}

impl BusySignal {
    /// Creates an open, idle signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal, waiting for any other holder to finish first.
    ///
    /// Returns [`SyncError::Interrupted`] once shutdown has begun.
    pub fn enter(&self) -> SyncResult<BusyGuard<'_>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(SyncError::Interrupted);
            }
            if !state.active {
                break;
            }
            self.changed.wait(&mut state);
        }
        state.active = true;
        Ok(BusyGuard { signal: self })
    }

    /// Returns true while a critical section is running.
    pub fn is_busy(&self) -> bool {
        self.state.lock().active
    }

    /// Returns true once shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Refuses new sections and waits for the running one to end.
    pub fn close_and_wait(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        while state.active {
            self.changed.wait(&mut state);
        }
    }

    fn leave(&self) {
        let mut state = self.state.lock();
        state.active = false;
        self.changed.notify_all();
    }
}

/// Lowers the signal when dropped, including on early error returns.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    signal: &'a BusySignal,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.signal.leave();
    }
}
