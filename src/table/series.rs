use arrow::datatypes::SchemaRef;
use log::debug;

use super::base::{ScanState, TableBase};
use super::slot::{CursorSlot, Handle};
use super::{BufferStats, Consumer, Table, TableParams};
use crate::cursors::{CursorStats, Tags, ValueCursor};
use crate::error::Result;
use crate::schema::{ColMeta, GroupKey};
use crate::value::ValueType;

impl<T: ValueType> Handle for Box<dyn ValueCursor<T>> {
    fn close(&mut self) {
        ValueCursor::close(self.as_mut());
    }

    fn stats(&self) -> CursorStats {
        ValueCursor::stats(self.as_ref())
    }
}

/// Table over a single series cursor, read to exhaustion.
pub struct SeriesTable<T: ValueType> {
    base: TableBase,
    slot: CursorSlot<Box<dyn ValueCursor<T>>>,
}

pub type FloatTable = SeriesTable<f64>;
pub type IntegerTable = SeriesTable<i64>;
pub type UnsignedTable = SeriesTable<u64>;
pub type StringTable = SeriesTable<String>;
pub type BooleanTable = SeriesTable<bool>;

impl<T: ValueType> SeriesTable<T> {
    /// Builds the table and reads its first batch. The cursor is closed if
    /// the parameters are rejected.
    pub fn new(
        mut cursor: Box<dyn ValueCursor<T>>,
        tags: &Tags,
        params: TableParams,
    ) -> Result<Self> {
        let base = match TableBase::new(params, T::COL_TYPE) {
            Ok(base) => base,
            Err(e) => {
                cursor.close();
                return Err(e);
            }
        };
        let table = Self {
            base,
            slot: CursorSlot::new(cursor),
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
        // A concurrent close leaves nothing to check out.
        let Some(mut cur) = self.slot.checkout() else {
            return false;
        };
        let block = cur.next();
        if !self.slot.checkin(cur) || block.is_empty() {
            return false;
        }
        self.base.fill(state, block)
    }
}

impl<T: ValueType> Table for SeriesTable<T> {
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
            debug!("closed {} table {}", T::COL_TYPE, self.base.key());
        }
    }

    fn cancel(&self) {
        self.base.cancel();
    }

    fn buffer_stats(&self) -> BufferStats {
        self.base.buffer_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursors::memory::MemoryCursor;
    use crate::cursors::ArrayBlock;
    use crate::error::Error;
    use crate::memory::TrackingAllocator;
    use crate::schema::{Bounds, ColType};
    use crate::table::TagsCache;
    use arrow::array::AsArray;
    use arrow::datatypes::Int64Type;
    use std::sync::Arc;

    fn params(value_type: ColType) -> TableParams {
        let alloc = Arc::new(TrackingAllocator::new());
        let cache = Arc::new(TagsCache::new(16, alloc.clone()));
        TableParams::new(
            GroupKey::default(),
            ColMeta::table_columns(value_type, ["host"]),
            Bounds::new(0, 1000),
            cache,
            alloc,
        )
    }

    #[test]
    fn test_first_batch_is_read_eagerly() {
        let cursor = MemoryCursor::from_points(vec![(1, 7i64), (2, 8)], 10);
        let table = IntegerTable::new(Box::new(cursor), &Tags::default(), params(ColType::Integer))
            .unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.statistics().scanned_values, 2);
    }

    #[test]
    fn test_batches_follow_cursor_blocks() {
        let cursor = MemoryCursor::from_blocks(vec![
            ArrayBlock::new(vec![1, 2], vec![10i64, 20]),
            ArrayBlock::new(vec![3], vec![30]),
        ]);
        let table = IntegerTable::new(Box::new(cursor), &Tags::default(), params(ColType::Integer))
            .unwrap();

        let mut seen = Vec::new();
        table
            .for_each_batch(&mut |batch| {
                let values = batch.values().as_primitive::<Int64Type>();
                seen.push(values.values().to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![vec![10, 20], vec![30]]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_rejected_params_close_cursor() {
        let cursor = MemoryCursor::<f64>::from_points(vec![(1, 1.0)], 10);
        let probe = cursor.probe();
        let result = FloatTable::new(Box::new(cursor), &Tags::default(), params(ColType::Integer));
        assert!(result.is_err());
        assert!(probe.is_closed());
    }

    #[test]
    fn test_uneven_block_faults() {
        let cursor = MemoryCursor::from_blocks(vec![ArrayBlock {
            timestamps: vec![1, 2],
            values: vec![1.0],
        }]);
        let table =
            FloatTable::new(Box::new(cursor), &Tags::default(), params(ColType::Float)).unwrap();
        assert!(table.is_empty());

        let mut calls = 0;
        let err = table
            .for_each_batch(&mut |_| {
                calls += 1;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(calls, 0);
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_close_twice_and_drop() {
        let cursor = MemoryCursor::from_points(vec![(1, true)], 10);
        let probe = cursor.probe();
        let table =
            BooleanTable::new(Box::new(cursor), &Tags::default(), params(ColType::Boolean)).unwrap();
        table.close();
        table.close();
        drop(table);
        assert_eq!(probe.close_count(), 1);
    }
}
