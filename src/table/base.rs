//! State and batch assembly shared by every table.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arrow::array::{new_null_array, ArrayRef, TimestampNanosecondArray};
use arrow::datatypes::{DataType, SchemaRef};
use log::{debug, trace, warn};

use super::{BufferStats, CancelSignal, ColumnBatch, Consumer, TableParams, TagsCache};
use crate::cursors::{ArrayBlock, Tags};
use crate::error::{Error, Result};
use crate::memory::Allocator;
use crate::schema::{
    arrow_schema, col_idx, validate_columns, Bounds, ColMeta, ColType, GroupKey,
    FIRST_TAG_COL_IDX, START_COL_IDX, STOP_COL_IDX, TIME_COL_IDX, VALUE_COL_IDX,
};
use crate::value::ValueType;

/// Scan state touched only by the reading thread.
pub(crate) struct ScanState {
    /// Current tag value per column; `None` for non-tag columns and nulls.
    tags: Vec<Option<String>>,
    buf: Option<Arc<ColumnBatch>>,
    err: Option<Error>,
}

impl ScanState {
    pub(crate) fn is_faulted(&self) -> bool {
        self.err.is_some()
    }

    /// Records `err` unless a fault is already set.
    pub(crate) fn fault(&mut self, err: Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }
}

pub(crate) struct TableBase {
    key: Arc<GroupKey>,
    cols: Arc<[ColMeta]>,
    schema: SchemaRef,
    bounds: Bounds,
    defaults: Vec<Option<String>>,
    cache: Arc<TagsCache>,
    alloc: Arc<dyn Allocator>,
    cancel: CancelSignal,
    done: Mutex<Option<Sender<()>>>,
    used: AtomicBool,
    pending: AtomicBool,
    allocated: AtomicU64,
    reused: AtomicU64,
    scan: Mutex<ScanState>,
}

impl TableBase {
    pub(crate) fn new(params: TableParams, value_type: ColType) -> Result<Self> {
        let TableParams {
            key,
            cols,
            bounds,
            defaults,
            cache,
            alloc,
            cancel,
            done,
        } = params;

        validate_columns(&cols, value_type)?;
        let defaults = match defaults.len() {
            0 => vec![None; cols.len()],
            n if n == cols.len() => defaults,
            n => {
                return Err(Error::InvalidSchema(format!(
                    "{n} column defaults for {} columns",
                    cols.len()
                )))
            }
        };

        let schema = arrow_schema(&cols);
        let scan = ScanState {
            tags: vec![None; cols.len()],
            buf: None,
            err: None,
        };
        Ok(Self {
            key: Arc::new(key),
            cols: cols.into(),
            schema,
            bounds,
            defaults,
            cache,
            alloc,
            cancel,
            done: Mutex::new(done),
            used: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            scan: Mutex::new(scan),
        })
    }

    pub(crate) fn key(&self) -> &GroupKey {
        &self.key
    }

    pub(crate) fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub(crate) fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.cancel.fire();
    }

    pub(crate) fn buffer_stats(&self) -> BufferStats {
        BufferStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn lock_scan(&self) -> MutexGuard<'_, ScanState> {
        self.scan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets tag columns to their defaults, then applies `tags`.
    pub(crate) fn read_tags(&self, state: &mut ScanState, tags: &Tags) {
        for j in FIRST_TAG_COL_IDX..self.cols.len() {
            state.tags[j] = self.defaults[j].clone();
        }
        for tag in tags {
            match col_idx(&tag.key, &self.cols) {
                Some(j) if j >= FIRST_TAG_COL_IDX => state.tags[j] = Some(tag.value.clone()),
                _ => {}
            }
        }
    }

    /// Turns `block` into the pending batch. Returns false, with the fault
    /// recorded, if the batch could not be built.
    pub(crate) fn fill<T: ValueType>(&self, state: &mut ScanState, block: ArrayBlock<T>) -> bool {
        let len = block.len();
        let ScanState { tags, buf, err } = state;
        let result = self.with_buffer(buf, |batch| self.fill_batch(batch, tags, block));
        match result {
            Ok(()) => {
                trace!("table {} produced batch of {len} rows", self.key);
                self.pending.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                warn!("table {} failed to build batch: {e}", self.key);
                if err.is_none() {
                    *err = Some(e);
                }
                false
            }
        }
    }

    /// Runs `fill` on the previous buffer if no consumer still holds it,
    /// otherwise on a fresh one that replaces it.
    fn with_buffer<R>(
        &self,
        buf: &mut Option<Arc<ColumnBatch>>,
        fill: impl FnOnce(&mut ColumnBatch) -> R,
    ) -> R {
        match buf.as_mut().and_then(Arc::get_mut) {
            Some(batch) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                fill(batch)
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                let mut batch = ColumnBatch::new(
                    Arc::clone(&self.key),
                    Arc::clone(&self.cols),
                    Arc::clone(&self.schema),
                    Arc::clone(&self.alloc),
                );
                let result = fill(&mut batch);
                *buf = Some(Arc::new(batch));
                result
            }
        }
    }

    fn fill_batch<T: ValueType>(
        &self,
        batch: &mut ColumnBatch,
        tags: &[Option<String>],
        block: ArrayBlock<T>,
    ) -> Result<()> {
        let ArrayBlock { timestamps, values } = block;
        if timestamps.len() != values.len() {
            return Err(Error::InvalidSchema(format!(
                "cursor block has {} timestamps and {} values",
                timestamps.len(),
                values.len()
            )));
        }
        batch.reset(timestamps.len());

        let times: ArrayRef = Arc::new(TimestampNanosecondArray::from(timestamps));
        batch.set_owned_column(TIME_COL_IDX, times)?;
        batch.set_owned_column(VALUE_COL_IDX, T::into_array(values))?;
        self.append_tags(batch, tags)?;
        self.append_bounds(batch)
    }

    fn append_tags(&self, batch: &mut ColumnBatch, tags: &[Option<String>]) -> Result<()> {
        let len = batch.len();
        for (j, value) in tags.iter().enumerate().skip(FIRST_TAG_COL_IDX) {
            match value {
                Some(v) => batch.set_column(j, self.cache.get_tag(v, len)?),
                None => batch.set_owned_column(j, new_null_array(&DataType::Utf8, len))?,
            }
        }
        Ok(())
    }

    fn append_bounds(&self, batch: &mut ColumnBatch) -> Result<()> {
        let (start, stop) = self.cache.get_bounds(self.bounds, batch.len())?;
        batch.set_column(START_COL_IDX, start);
        batch.set_column(STOP_COL_IDX, stop);
        Ok(())
    }

    /// Delivers the pending batch, then keeps calling `advance` until it
    /// reports no further batch or the table is cancelled. A fired signal is
    /// checked before each delivery and before each read.
    pub(crate) fn do_batches(
        &self,
        f: &mut Consumer<'_>,
        mut advance: impl FnMut(&mut ScanState) -> bool,
    ) -> Result<()> {
        if self.used.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyRead);
        }

        let mut state = self.lock_scan();
        let mut delivered = 0u64;
        while state.err.is_none() && self.pending.swap(false, Ordering::AcqRel) {
            if self.cancel.is_fired() {
                debug!("table {} cancelled after {delivered} batches", self.key);
                break;
            }
            let Some(batch) = state.buf.as_ref() else {
                break;
            };
            if let Err(e) = f(batch) {
                state.fault(Error::Consumer(e));
                break;
            }
            delivered += 1;
            if self.cancel.is_fired() {
                debug!("table {} cancelled after {delivered} batches", self.key);
                break;
            }
            if !advance(&mut *state) {
                break;
            }
        }
        self.pending.store(false, Ordering::Release);
        state.buf = None;
        let err = state.err.take();
        drop(state);

        self.finish();
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Signals whoever waits on the table that it has been read.
    fn finish(&self) {
        let done = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(done);
    }
}
