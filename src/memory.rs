//! Memory accounting for column buffers.
//!
//! Every column array a table builds is charged to an [`Allocator`] through a
//! [`Reservation`], which gives the bytes back when dropped. A
//! [`TrackingAllocator`] can enforce a process-wide ceiling.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Accounting interface for column buffer memory.
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Charges `bytes`. Fails if the charge would exceed a limit.
    fn allocate(&self, bytes: usize) -> Result<()>;

    /// Returns `bytes` previously charged with [`Allocator::allocate`].
    fn free(&self, bytes: usize);
}

/// Allocator that tracks current and peak usage, with an optional limit.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    allocated: AtomicUsize,
    max_allocated: AtomicUsize,
    limit: Option<usize>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn max_allocated(&self) -> usize {
        self.max_allocated.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, bytes: usize) -> Result<()> {
        let mut current = self.allocated.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(bytes);
            if let Some(limit) = self.limit {
                if next > limit {
                    return Err(Error::MemoryLimit {
                        requested: bytes,
                        allocated: current,
                        limit,
                    });
                }
            }
            match self.allocated.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.max_allocated.fetch_max(next, Ordering::AcqRel);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn free(&self, bytes: usize) {
        let prev = self.allocated.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(prev >= bytes, "freed {bytes} bytes with only {prev} allocated");
    }
}

/// Bytes charged to an allocator, released on drop.
#[derive(Debug)]
pub struct Reservation {
    alloc: Arc<dyn Allocator>,
    bytes: usize,
}

impl Reservation {
    pub fn empty(alloc: Arc<dyn Allocator>) -> Self {
        Self { alloc, bytes: 0 }
    }

    pub fn size(&self) -> usize {
        self.bytes
    }

    /// Charges `bytes` more on top of the current reservation.
    pub fn grow(&mut self, bytes: usize) -> Result<()> {
        self.alloc.allocate(bytes)?;
        self.bytes += bytes;
        Ok(())
    }

    /// Returns everything held so far.
    pub fn clear(&mut self) {
        if self.bytes > 0 {
            self.alloc.free(self.bytes);
            self.bytes = 0;
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_allocator_counts() {
        let alloc = TrackingAllocator::new();
        alloc.allocate(100).unwrap();
        alloc.allocate(50).unwrap();
        alloc.free(100);
        assert_eq!(alloc.allocated(), 50);
        assert_eq!(alloc.max_allocated(), 150);
    }

    #[test]
    fn test_tracking_allocator_limit() {
        let alloc = TrackingAllocator::with_limit(64);
        alloc.allocate(60).unwrap();
        let err = alloc.allocate(8).unwrap_err();
        match err {
            Error::MemoryLimit {
                requested,
                allocated,
                limit,
            } => {
                assert_eq!(requested, 8);
                assert_eq!(allocated, 60);
                assert_eq!(limit, 64);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(alloc.allocated(), 60);
    }

    #[test]
    fn test_reservation_releases_on_drop() {
        let alloc = Arc::new(TrackingAllocator::new());
        {
            let mut res = Reservation::empty(alloc.clone());
            res.grow(32).unwrap();
            res.grow(32).unwrap();
            assert_eq!(res.size(), 64);
            assert_eq!(alloc.allocated(), 64);
            res.clear();
            assert_eq!(alloc.allocated(), 0);
            res.grow(16).unwrap();
        }
        assert_eq!(alloc.allocated(), 0);
        assert_eq!(alloc.max_allocated(), 64);
    }
}
