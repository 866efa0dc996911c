//! Cache of replicated constant columns.
//!
//! Tag and bounds columns repeat one value for every row of a batch. The
//! cache keeps one array per distinct value, at least as long as the longest
//! batch seen, and hands out zero-copy slices of it.

use std::collections::{HashMap, VecDeque};
use std::iter::repeat;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arrow::array::{Array, ArrayRef, StringArray, TimestampNanosecondArray};

use crate::error::Result;
use crate::memory::{Allocator, Reservation};
use crate::schema::Bounds;

struct CachedColumn {
    array: ArrayRef,
    _reservation: Reservation,
}

struct CachedBounds {
    bounds: Bounds,
    start: ArrayRef,
    stop: ArrayRef,
    _reservation: Reservation,
}

#[derive(Default)]
struct CacheState {
    tags: HashMap<String, CachedColumn>,
    order: VecDeque<String>,
    bounds: Option<CachedBounds>,
}

/// Shared between every table of a read.
pub struct TagsCache {
    state: Mutex<CacheState>,
    size: usize,
    alloc: Arc<dyn Allocator>,
}

impl TagsCache {
    /// `size` bounds the number of distinct tag values kept; at least one is
    /// always kept.
    pub fn new(size: usize, alloc: Arc<dyn Allocator>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            size: size.max(1),
            alloc,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a string column of `len` rows all equal to `value`.
    pub fn get_tag(&self, value: &str, len: usize) -> Result<ArrayRef> {
        let mut state = self.lock();
        if let Some(cached) = state.tags.get(value) {
            if cached.array.len() >= len {
                return Ok(cached.array.slice(0, len));
            }
        }

        let array: ArrayRef = Arc::new(StringArray::from_iter_values(repeat(value).take(len)));
        let mut reservation = Reservation::empty(Arc::clone(&self.alloc));
        reservation.grow(array.get_array_memory_size())?;

        let column = CachedColumn {
            array: Arc::clone(&array),
            _reservation: reservation,
        };
        if state.tags.insert(value.to_string(), column).is_none() {
            state.order.push_back(value.to_string());
            while state.tags.len() > self.size {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.tags.remove(&oldest);
            }
        }
        Ok(array)
    }

    /// Returns the `_start` and `_stop` columns for `bounds`, `len` rows each.
    pub fn get_bounds(&self, bounds: Bounds, len: usize) -> Result<(ArrayRef, ArrayRef)> {
        let mut state = self.lock();
        if let Some(cached) = state.bounds.as_ref() {
            if cached.bounds == bounds && cached.start.len() >= len {
                return Ok((cached.start.slice(0, len), cached.stop.slice(0, len)));
            }
        }

        let start: ArrayRef = Arc::new(TimestampNanosecondArray::from(vec![bounds.start; len]));
        let stop: ArrayRef = Arc::new(TimestampNanosecondArray::from(vec![bounds.stop; len]));
        let mut reservation = Reservation::empty(Arc::clone(&self.alloc));
        reservation.grow(start.get_array_memory_size() + stop.get_array_memory_size())?;

        state.bounds = Some(CachedBounds {
            bounds,
            start: Arc::clone(&start),
            stop: Arc::clone(&stop),
            _reservation: reservation,
        });
        Ok((start, stop))
    }

    /// Number of distinct tag values currently cached.
    pub fn len(&self) -> usize {
        self.lock().tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TagsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagsCache")
            .field("size", &self.size)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::TrackingAllocator;
    use arrow::array::AsArray;
    use arrow::datatypes::TimestampNanosecondType;

    fn cache(size: usize) -> (TagsCache, Arc<TrackingAllocator>) {
        let alloc = Arc::new(TrackingAllocator::new());
        (TagsCache::new(size, alloc.clone()), alloc)
    }

    #[test]
    fn test_get_tag_replicates_value() {
        let (cache, _) = cache(4);
        let arr = cache.get_tag("west", 3).unwrap();
        let arr = arr.as_string::<i32>();
        assert_eq!(arr.len(), 3);
        assert!(arr.iter().all(|v| v == Some("west")));
    }

    #[test]
    fn test_get_tag_slices_longer_entry() {
        let (cache, alloc) = cache(4);
        let long = cache.get_tag("a", 10).unwrap();
        let allocated = alloc.allocated();
        let short = cache.get_tag("a", 4).unwrap();
        assert_eq!(short.len(), 4);
        assert_eq!(alloc.allocated(), allocated);
        assert_eq!(short.to_data().buffers()[1].as_ptr(), long.to_data().buffers()[1].as_ptr());
    }

    #[test]
    fn test_get_tag_evicts_oldest() {
        let (cache, alloc) = cache(2);
        cache.get_tag("a", 1).unwrap();
        cache.get_tag("b", 1).unwrap();
        cache.get_tag("c", 1).unwrap();
        assert_eq!(cache.len(), 2);
        drop(cache);
        assert_eq!(alloc.allocated(), 0);
    }

    #[test]
    fn test_get_bounds() {
        let (cache, _) = cache(1);
        let (start, stop) = cache.get_bounds(Bounds::new(10, 20), 2).unwrap();
        let start = start.as_primitive::<TimestampNanosecondType>();
        let stop = stop.as_primitive::<TimestampNanosecondType>();
        assert_eq!(start.values().to_vec(), vec![10, 10]);
        assert_eq!(stop.values().to_vec(), vec![20, 20]);

        let (start, _) = cache.get_bounds(Bounds::new(30, 40), 1).unwrap();
        assert_eq!(start.as_primitive::<TimestampNanosecondType>().value(0), 30);
    }

    #[test]
    fn test_limit_surfaces_error() {
        let alloc = Arc::new(TrackingAllocator::with_limit(16));
        let cache = TagsCache::new(4, alloc);
        assert!(cache.get_tag("west", 1024).is_err());
    }
}
