use arrow::datatypes::SchemaRef;
use log::{debug, warn};

use super::base::{ScanState, TableBase};
use super::slot::{CursorSlot, Handle};
use super::{BufferStats, Consumer, Table, TableParams};
use crate::cursors::{ArrayBlock, CursorStats, GroupCursor, Tags, ValueCursor};
use crate::error::{GroupCursorError, Result};
use crate::schema::{ColMeta, GroupKey};
use crate::value::ValueType;

/// The group cursor together with the cursor of its active series.
struct GroupHandle<T> {
    gc: Box<dyn GroupCursor>,
    cur: Option<Box<dyn ValueCursor<T>>>,
}

impl<T: ValueType> Handle for GroupHandle<T> {
    fn close(&mut self) {
        if let Some(mut cur) = self.cur.take() {
            cur.close();
        }
        self.gc.close();
    }

    fn stats(&self) -> CursorStats {
        self.cur.as_ref().map(|cur| cur.stats()).unwrap_or_default()
    }
}

/// Table over every series of a group, presented as one stream of batches.
///
/// Each series the group cursor moves to must carry values of type `T`; a
/// series of any other type ends the scan with a [`GroupCursorError`].
pub struct GroupTable<T: ValueType> {
    base: TableBase,
    slot: CursorSlot<GroupHandle<T>>,
}

pub type FloatGroupTable = GroupTable<f64>;
pub type IntegerGroupTable = GroupTable<i64>;
pub type UnsignedGroupTable = GroupTable<u64>;
pub type StringGroupTable = GroupTable<String>;
pub type BooleanGroupTable = GroupTable<bool>;

impl<T: ValueType> GroupTable<T> {
    /// Builds the table from the group cursor positioned on its first series,
    /// that series' cursor and tags, and reads the first batch.
    pub fn new(
        gc: Box<dyn GroupCursor>,
        cursor: Box<dyn ValueCursor<T>>,
        tags: &Tags,
        params: TableParams,
    ) -> Result<Self> {
        let mut handle = GroupHandle {
            gc,
            cur: Some(cursor),
        };
        let base = match TableBase::new(params, T::COL_TYPE) {
            Ok(base) => base,
            Err(e) => {
                handle.close();
                return Err(e);
            }
        };
        let table = Self {
            base,
            slot: CursorSlot::new(handle),
        };
        {
            let mut state = table.base.lock_scan();
            table.base.read_tags(&mut state, tags);
            table.advance(&mut state);
        }
        Ok(table)
    }

    fn advance(&self, state: &mut ScanState) -> bool {
        if state.is_faulted() {
            return false;
        }
        let Some(mut handle) = self.slot.checkout() else {
            return false;
        };
        let block = loop {
            let block = match handle.cur.as_mut() {
                Some(cur) => cur.next(),
                None => ArrayBlock::empty(),
            };
            if !block.is_empty() {
                break Some(block);
            }
            if !self.advance_cursor(&mut handle, state) {
                break None;
            }
        };
        if !self.slot.checkin(handle) {
            return false;
        }
        match block {
            Some(block) => self.base.fill(state, block),
            None => false,
        }
    }

    /// Moves to the next series that has a cursor. Returns false at the end
    /// of the group, or with a fault recorded if the series has the wrong
    /// value type.
    fn advance_cursor(&self, handle: &mut GroupHandle<T>, state: &mut ScanState) -> bool {
        if let Some(mut cur) = handle.cur.take() {
            cur.close();
        }
        while handle.gc.next() {
            let Some(cur) = handle.gc.cursor() else {
                continue;
            };
            match T::downcast(cur) {
                Ok(typed) => {
                    let tags = handle.gc.tags();
                    debug!("table {} moved to series {:?}", self.base.key(), tags);
                    self.base.read_tags(state, &tags);
                    handle.cur = Some(typed);
                    return true;
                }
                Err(mut other) => {
                    let err = GroupCursorError {
                        expected: T::COL_TYPE,
                        actual: other.col_type(),
                    };
                    other.close();
                    warn!("table {}: {err}", self.base.key());
                    state.fault(err.into());
                    return false;
                }
            }
        }
        false
    }
}

impl<T: ValueType> Table for GroupTable<T> {
    fn key(&self) -> &GroupKey {
        self.base.key()
    }

    fn cols(&self) -> &[ColMeta] {
        self.base.cols()
    }

    fn schema(&self) -> SchemaRef {
        self.base.schema()
    }

    fn for_each_batch(&self, f: &mut Consumer<'_>) -> Result<()> {
        self.base.do_batches(f, |state| self.advance(state))
    }

    fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    fn statistics(&self) -> CursorStats {
        self.slot.stats()
    }

    fn close(&self) {
        if self.slot.close() {
            debug!("closed {} group table {}", T::COL_TYPE, self.base.key());
        }
    }

    fn cancel(&self) {
        self.base.cancel();
    }

    fn buffer_stats(&self) -> BufferStats {
        self.base.buffer_stats()
    }
}
