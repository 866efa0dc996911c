//! Builds the table variant matching a cursor's runtime value type.

use log::debug;

use super::{GroupTable, SeriesTable, Table, TableParams};
use crate::cursors::{GroupCursor, SeriesCursor, Tags};
use crate::error::Result;

/// Wraps a single series cursor in the table of its value type.
pub fn new_series_table(
    cursor: SeriesCursor,
    tags: &Tags,
    params: TableParams,
) -> Result<Box<dyn Table>> {
    debug!("new {} series table for {}", cursor.col_type(), params.key);
    let table: Box<dyn Table> = match cursor {
        SeriesCursor::Float(cur) => Box::new(SeriesTable::new(cur, tags, params)?),
        SeriesCursor::Integer(cur) => Box::new(SeriesTable::new(cur, tags, params)?),
        SeriesCursor::Unsigned(cur) => Box::new(SeriesTable::new(cur, tags, params)?),
        SeriesCursor::String(cur) => Box::new(SeriesTable::new(cur, tags, params)?),
        SeriesCursor::Boolean(cur) => Box::new(SeriesTable::new(cur, tags, params)?),
    };
    Ok(table)
}

/// Wraps a group cursor in the table matching the value type of its first
/// series cursor. Later series must share that type.
pub fn new_group_table(
    gc: Box<dyn GroupCursor>,
    cursor: SeriesCursor,
    tags: &Tags,
    params: TableParams,
) -> Result<Box<dyn Table>> {
    debug!("new {} group table for {}", cursor.col_type(), params.key);
    let table: Box<dyn Table> = match cursor {
        SeriesCursor::Float(cur) => Box::new(GroupTable::new(gc, cur, tags, params)?),
        SeriesCursor::Integer(cur) => Box::new(GroupTable::new(gc, cur, tags, params)?),
        SeriesCursor::Unsigned(cur) => Box::new(GroupTable::new(gc, cur, tags, params)?),
        SeriesCursor::String(cur) => Box::new(GroupTable::new(gc, cur, tags, params)?),
        SeriesCursor::Boolean(cur) => Box::new(GroupTable::new(gc, cur, tags, params)?),
    };
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursors::memory::{MemoryCursor, MemoryGroupCursor};
    use crate::error::Error;
    use crate::memory::TrackingAllocator;
    use crate::schema::{Bounds, ColMeta, ColType, GroupKey};
    use crate::table::TagsCache;
    use std::sync::Arc;

    fn params(value_type: ColType) -> TableParams {
        let alloc = Arc::new(TrackingAllocator::new());
        let cache = Arc::new(TagsCache::new(4, alloc.clone()));
        TableParams::new(
            GroupKey::default(),
            ColMeta::table_columns(value_type, Vec::<String>::new()),
            Bounds::new(0, 10),
            cache,
            alloc,
        )
    }

    #[test]
    fn test_series_table_matches_cursor_type() {
        let cursor = MemoryCursor::from_points(vec![(1, "a".to_string())], 8).into_series();
        let table = new_series_table(cursor, &Tags::default(), params(ColType::String)).unwrap();
        assert_eq!(table.cols()[3].ty, ColType::String);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_group_table_rejects_mismatched_columns() {
        let cursor = MemoryCursor::from_points(vec![(1, 1u64)], 8);
        let probe = cursor.probe();
        let gc = MemoryGroupCursor::new(vec![]);
        let gc_probe = gc.probe();
        let err = new_group_table(
            Box::new(gc),
            cursor.into_series(),
            &Tags::default(),
            params(ColType::Float),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidSchema(_)));
        assert!(probe.is_closed());
        assert!(gc_probe.is_closed());
    }
}
