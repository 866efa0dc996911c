//! Tables over storage cursors.
//!
//! A table turns one cursor (a [`SeriesTable`]) or a group of per-series
//! cursors (a [`GroupTable`]) into a stream of [`ColumnBatch`]es, delivered
//! through [`Table::for_each_batch`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use storageflux::cursors::memory::MemoryCursor;
//! use storageflux::schema::{Bounds, ColMeta, ColType, GroupKey};
//! use storageflux::table::{new_series_table, TableParams};
//! use storageflux::ScanConfig;
//!
//! let config = ScanConfig::default();
//! let alloc = config.allocator();
//! let cache = config.tags_cache(alloc.clone());
//! let params = TableParams::new(
//!     GroupKey::default(),
//!     ColMeta::table_columns(ColType::Float, ["host"]),
//!     Bounds::new(0, 100),
//!     cache,
//!     alloc,
//! );
//! let cursor = MemoryCursor::from_points(vec![(10, 1.0), (20, 2.0)], 1000);
//! let table = new_series_table(cursor.into_series(), &[("host", "a")].into(), params)?;
//! table.for_each_batch(&mut |batch| {
//!     println!("{} rows", batch.len());
//!     Ok(())
//! })?;
//! # Ok::<(), storageflux::Error>(())
//! ```

mod base;
mod factory;
mod group;
mod series;
mod slot;
mod tags_cache;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use arrow::array::{new_empty_array, Array, ArrayRef, AsArray, TimestampNanosecondArray};
use arrow::datatypes::{SchemaRef, TimestampNanosecondType};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::cursors::CursorStats;
use crate::error::Result;
use crate::memory::{Allocator, Reservation};
use crate::schema::{Bounds, ColMeta, GroupKey, TIME_COL_IDX, VALUE_COL_IDX};

pub use factory::{new_group_table, new_series_table};
pub use group::{
    BooleanGroupTable, FloatGroupTable, GroupTable, IntegerGroupTable, StringGroupTable,
    UnsignedGroupTable,
};
pub use series::{
    BooleanTable, FloatTable, IntegerTable, SeriesTable, StringTable, UnsignedTable,
};
pub use tags_cache::TagsCache;

/// Callback receiving each batch. Cloning the `Arc` retains the batch past
/// the callback; the table then allocates a fresh buffer for the next one.
pub type Consumer<'a> = dyn FnMut(&Arc<ColumnBatch>) -> anyhow::Result<()> + 'a;

/// A columnar table delivered in batches.
pub trait Table: Send + Sync {
    fn key(&self) -> &GroupKey;

    fn cols(&self) -> &[ColMeta];

    fn schema(&self) -> SchemaRef;

    /// Presents every batch to `f` in order. Returns the fault that ended the
    /// scan, if any. A table can be read once.
    fn for_each_batch(&self, f: &mut Consumer<'_>) -> Result<()>;

    /// True when no batch is pending delivery.
    fn is_empty(&self) -> bool;

    fn statistics(&self) -> CursorStats;

    /// Closes the underlying cursors. Safe to call more than once and from
    /// another thread while a read is in flight.
    fn close(&self);

    /// Stops delivery before the next batch.
    fn cancel(&self);

    fn buffer_stats(&self) -> BufferStats;
}

/// Counts of fresh versus reused batch buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub allocated: u64,
    pub reused: u64,
}

/// One-shot cancellation flag, shareable across tables and threads.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a table needs besides its cursor.
pub struct TableParams {
    pub key: GroupKey,
    pub cols: Vec<ColMeta>,
    pub bounds: Bounds,
    /// Default value per column, used for tag columns a series lacks.
    /// Empty means no defaults.
    pub defaults: Vec<Option<String>>,
    pub cache: Arc<TagsCache>,
    pub alloc: Arc<dyn Allocator>,
    pub cancel: CancelSignal,
    /// Dropped once the table has been read.
    pub done: Option<Sender<()>>,
}

impl TableParams {
    pub fn new(
        key: GroupKey,
        cols: Vec<ColMeta>,
        bounds: Bounds,
        cache: Arc<TagsCache>,
        alloc: Arc<dyn Allocator>,
    ) -> Self {
        Self {
            key,
            cols,
            bounds,
            defaults: Vec::new(),
            cache,
            alloc,
            cancel: CancelSignal::new(),
            done: None,
        }
    }

    pub fn defaults(mut self, defaults: Vec<Option<String>>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn done(mut self, done: Sender<()>) -> Self {
        self.done = Some(done);
        self
    }
}

/// One batch of rows: bounds, time, value and tag columns, all of equal
/// length. Immutable once handed to a consumer.
#[derive(Debug)]
pub struct ColumnBatch {
    key: Arc<GroupKey>,
    cols: Arc<[ColMeta]>,
    schema: SchemaRef,
    arrays: Vec<ArrayRef>,
    len: usize,
    reservation: Reservation,
}

impl ColumnBatch {
    pub(crate) fn new(
        key: Arc<GroupKey>,
        cols: Arc<[ColMeta]>,
        schema: SchemaRef,
        alloc: Arc<dyn Allocator>,
    ) -> Self {
        let arrays = schema
            .fields()
            .iter()
            .map(|f| new_empty_array(f.data_type()))
            .collect();
        Self {
            key,
            cols,
            schema,
            arrays,
            len: 0,
            reservation: Reservation::empty(alloc),
        }
    }

    /// Drops the previous contents' accounting and resizes to `len` rows.
    pub(crate) fn reset(&mut self, len: usize) {
        self.reservation.clear();
        self.len = len;
    }

    pub(crate) fn set_column(&mut self, idx: usize, array: ArrayRef) {
        debug_assert_eq!(array.len(), self.len);
        self.arrays[idx] = array;
    }

    /// Charges `array` to the batch and stores it in column `idx`.
    pub(crate) fn set_owned_column(&mut self, idx: usize, array: ArrayRef) -> Result<()> {
        self.reservation.grow(array.get_array_memory_size())?;
        self.set_column(idx, array);
        Ok(())
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, idx: usize) -> &ArrayRef {
        &self.arrays[idx]
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.arrays
    }

    pub fn times(&self) -> &TimestampNanosecondArray {
        self.arrays[TIME_COL_IDX].as_primitive::<TimestampNanosecondType>()
    }

    pub fn values(&self) -> &ArrayRef {
        &self.arrays[VALUE_COL_IDX]
    }

    /// Bytes charged to the allocator for columns this batch owns.
    pub fn reserved_bytes(&self) -> usize {
        self.reservation.size()
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let options = RecordBatchOptions::new().with_row_count(Some(self.len));
        Ok(RecordBatch::try_new_with_options(
            Arc::clone(&self.schema),
            self.arrays.clone(),
            &options,
        )?)
    }
}
