//! Guarded cursor handle shared by the reading thread and closers.
//!
//! The reader checks the handle out, reads without holding the lock and
//! checks it back in. A close that lands while the handle is checked out only
//! marks the slot closed; the reader closes the handle at check-in. Either way
//! the handle is closed exactly once and close never waits on a read.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cursors::CursorStats;

pub(crate) trait Handle: Send {
    fn close(&mut self);

    fn stats(&self) -> CursorStats;
}

struct SlotState<C> {
    handle: Option<C>,
    closed: bool,
    last_stats: CursorStats,
}

pub(crate) struct CursorSlot<C: Handle> {
    state: Mutex<SlotState<C>>,
}

impl<C: Handle> CursorSlot<C> {
    pub(crate) fn new(handle: C) -> Self {
        Self {
            state: Mutex::new(SlotState {
                last_stats: handle.stats(),
                handle: Some(handle),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the handle for reading. `None` once closed.
    pub(crate) fn checkout(&self) -> Option<C> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.handle.take()
    }

    /// Returns a handle taken with [`CursorSlot::checkout`]. Returns false,
    /// after closing the handle, if the slot was closed in the meantime.
    pub(crate) fn checkin(&self, mut handle: C) -> bool {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            handle.close();
            return false;
        }
        state.last_stats = handle.stats();
        state.handle = Some(handle);
        true
    }

    /// Closes the slot. Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.last_stats = CursorStats::default();
        let handle = state.handle.take();
        drop(state);
        if let Some(mut handle) = handle {
            handle.close();
        }
        true
    }

    /// Live stats of the handle, the snapshot taken at the last check-in while
    /// it is checked out, or zero once closed.
    pub(crate) fn stats(&self) -> CursorStats {
        let state = self.lock();
        match state.handle.as_ref() {
            Some(handle) => handle.stats(),
            None => state.last_stats,
        }
    }
}

impl<C: Handle> Drop for CursorSlot<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Probe {
        closes: Arc<AtomicUsize>,
        values: u64,
    }

    impl Handle for Probe {
        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn stats(&self) -> CursorStats {
            CursorStats {
                scanned_values: self.values,
                scanned_bytes: self.values * 8,
            }
        }
    }

    fn slot() -> (CursorSlot<Probe>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let probe = Probe {
            closes: closes.clone(),
            values: 0,
        };
        (CursorSlot::new(probe), closes)
    }

    #[test]
    fn test_close_is_idempotent() {
        let (slot, closes) = slot();
        assert!(slot.close());
        assert!(!slot.close());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(slot.checkout().is_none());
        drop(slot);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_while_checked_out() {
        let (slot, closes) = slot();
        let mut handle = slot.checkout().unwrap();
        handle.values = 3;
        assert_eq!(slot.stats(), CursorStats::default());
        assert!(slot.close());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(!slot.checkin(handle));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(slot.stats(), CursorStats::default());
    }

    #[test]
    fn test_stats_snapshot_while_checked_out() {
        let (slot, _) = slot();
        let mut handle = slot.checkout().unwrap();
        handle.values = 5;
        assert!(slot.checkin(handle));
        assert_eq!(slot.stats().scanned_values, 5);

        let handle = slot.checkout().unwrap();
        assert_eq!(slot.stats().scanned_bytes, 40);
        assert!(slot.checkin(handle));
    }
}
