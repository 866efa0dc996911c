//! In-memory cursors.
//!
//! Useful as fixtures and for feeding tables from data that is already
//! resident. Each cursor can hand out a [`CloseProbe`] to observe whether the
//! table closed it.

use std::collections::VecDeque;
use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{ArrayBlock, CursorStats, GroupCursor, SeriesCursor, Tags, ValueCursor};
use crate::value::ValueType;

/// Counts close calls that actually released a cursor.
#[derive(Debug, Clone, Default)]
pub struct CloseProbe(Arc<AtomicUsize>);

impl CloseProbe {
    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub fn close_count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cursor replaying a fixed list of blocks.
pub struct MemoryCursor<T> {
    blocks: VecDeque<ArrayBlock<T>>,
    stats: CursorStats,
    closed: bool,
    probe: CloseProbe,
}

impl<T: ValueType> MemoryCursor<T> {
    pub fn from_blocks(blocks: Vec<ArrayBlock<T>>) -> Self {
        Self {
            blocks: blocks.into_iter().filter(|b| !b.is_empty()).collect(),
            stats: CursorStats::default(),
            closed: false,
            probe: CloseProbe::default(),
        }
    }

    /// Splits `points` into blocks of at most `block_size` rows.
    pub fn from_points(points: Vec<(i64, T)>, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let mut blocks = Vec::with_capacity(points.len().div_ceil(block_size));
        let mut current = ArrayBlock::empty();
        for (ts, value) in points {
            current.timestamps.push(ts);
            current.values.push(value);
            if current.len() == block_size {
                blocks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            blocks.push(current);
        }
        Self::from_blocks(blocks)
    }

    pub fn probe(&self) -> CloseProbe {
        self.probe.clone()
    }

    pub fn into_series(self) -> SeriesCursor {
        T::into_series(Box::new(self))
    }
}

impl<T: ValueType> ValueCursor<T> for MemoryCursor<T> {
    fn next(&mut self) -> ArrayBlock<T> {
        if self.closed {
            return ArrayBlock::empty();
        }
        let Some(block) = self.blocks.pop_front() else {
            return ArrayBlock::empty();
        };
        self.stats.scanned_values += block.len() as u64;
        self.stats.scanned_bytes +=
            (block.len() * size_of::<i64>() + T::scanned_bytes(&block.values)) as u64;
        block
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.blocks.clear();
            self.probe.record();
        }
    }

    fn stats(&self) -> CursorStats {
        self.stats
    }
}

/// One series of a [`MemoryGroupCursor`].
#[derive(Debug)]
pub struct MemorySeries {
    pub tags: Tags,
    pub cursor: Option<SeriesCursor>,
}

impl MemorySeries {
    pub fn new(tags: Tags, cursor: SeriesCursor) -> Self {
        Self {
            tags,
            cursor: Some(cursor),
        }
    }

    /// A series that has no cursor for the requested field.
    pub fn without_cursor(tags: Tags) -> Self {
        Self { tags, cursor: None }
    }
}

/// Group cursor over a fixed list of series.
pub struct MemoryGroupCursor {
    series: VecDeque<MemorySeries>,
    current: Option<MemorySeries>,
    closed: bool,
    probe: CloseProbe,
}

impl MemoryGroupCursor {
    pub fn new(series: Vec<MemorySeries>) -> Self {
        Self {
            series: series.into(),
            current: None,
            closed: false,
            probe: CloseProbe::default(),
        }
    }

    pub fn probe(&self) -> CloseProbe {
        self.probe.clone()
    }
}

impl GroupCursor for MemoryGroupCursor {
    fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if let Some(mut prev) = self.current.take() {
            if let Some(cur) = prev.cursor.as_mut() {
                cur.close();
            }
        }
        self.current = self.series.pop_front();
        self.current.is_some()
    }

    fn cursor(&mut self) -> Option<SeriesCursor> {
        self.current.as_mut().and_then(|s| s.cursor.take())
    }

    fn tags(&self) -> Tags {
        self.current
            .as_ref()
            .map(|s| s.tags.clone())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for series in self.current.take().into_iter().chain(self.series.drain(..)) {
            if let Some(mut cur) = series.cursor {
                cur.close();
            }
        }
        self.probe.record();
    }
}
