//! Storage-side cursor interfaces.
//!
//! A [`ValueCursor`] yields successive blocks of `(timestamp, value)` pairs for
//! one series. A [`GroupCursor`] walks a sequence of series and hands out a
//! [`SeriesCursor`] plus the tag set for each one.
//!
//! Cursors report faults by returning an empty block; recovering from storage
//! errors is the storage layer's concern.

pub mod memory;

use crate::schema::ColType;

/// Cumulative scan counters reported by a cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub scanned_values: u64,
    pub scanned_bytes: u64,
}

/// One block of a series read. `timestamps` and `values` have equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBlock<T> {
    pub timestamps: Vec<i64>,
    pub values: Vec<T>,
}

impl<T> ArrayBlock<T> {
    pub fn new(timestamps: Vec<i64>, values: Vec<T>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self { timestamps, values }
    }

    pub fn empty() -> Self {
        Self {
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl<T> Default for ArrayBlock<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Cursor over one series of values of type `T`.
pub trait ValueCursor<T>: Send {
    /// Returns the next block. An empty block means the series is exhausted.
    fn next(&mut self) -> ArrayBlock<T>;

    /// Releases the cursor's resources. Must be idempotent.
    fn close(&mut self);

    fn stats(&self) -> CursorStats;
}

pub type FloatCursor = Box<dyn ValueCursor<f64>>;
pub type IntegerCursor = Box<dyn ValueCursor<i64>>;
pub type UnsignedCursor = Box<dyn ValueCursor<u64>>;
pub type StringCursor = Box<dyn ValueCursor<String>>;
pub type BooleanCursor = Box<dyn ValueCursor<bool>>;

/// A per-series cursor whose value type is only known at runtime.
pub enum SeriesCursor {
    Float(FloatCursor),
    Integer(IntegerCursor),
    Unsigned(UnsignedCursor),
    String(StringCursor),
    Boolean(BooleanCursor),
}

impl SeriesCursor {
    /// The column type this cursor's values populate.
    pub fn col_type(&self) -> ColType {
        match self {
            SeriesCursor::Float(_) => ColType::Float,
            SeriesCursor::Integer(_) => ColType::Integer,
            SeriesCursor::Unsigned(_) => ColType::Unsigned,
            SeriesCursor::String(_) => ColType::String,
            SeriesCursor::Boolean(_) => ColType::Boolean,
        }
    }

    pub fn close(&mut self) {
        match self {
            SeriesCursor::Float(c) => c.close(),
            SeriesCursor::Integer(c) => c.close(),
            SeriesCursor::Unsigned(c) => c.close(),
            SeriesCursor::String(c) => c.close(),
            SeriesCursor::Boolean(c) => c.close(),
        }
    }

    pub fn stats(&self) -> CursorStats {
        match self {
            SeriesCursor::Float(c) => c.stats(),
            SeriesCursor::Integer(c) => c.stats(),
            SeriesCursor::Unsigned(c) => c.stats(),
            SeriesCursor::String(c) => c.stats(),
            SeriesCursor::Boolean(c) => c.stats(),
        }
    }
}

impl std::fmt::Debug for SeriesCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SeriesCursor").field(&self.col_type()).finish()
    }
}

/// A single `key=value` pair of a series' tag set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Tag set of a series, ordered by key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new(mut tags: Vec<Tag>) -> Self {
        tags.sort();
        Self(tags)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .binary_search_by(|t| t.key.as_str().cmp(key))
            .ok()
            .map(|idx| self.0[idx].value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Tags {
    fn from(pairs: [(K, V); N]) -> Self {
        Tags::new(pairs.into_iter().map(|(k, v)| Tag::new(k, v)).collect())
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Cursor over the series of one group.
pub trait GroupCursor: Send {
    /// Advances to the next series. Returns false at the end of the group.
    fn next(&mut self) -> bool;

    /// Takes the current series' cursor. `None` when the series has no data
    /// for the requested field.
    fn cursor(&mut self) -> Option<SeriesCursor>;

    /// Tag set of the current series.
    fn tags(&self) -> Tags;

    /// Must be idempotent.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_sorted_lookup() {
        let tags: Tags = [("region", "west"), ("host", "a")].into();
        let keys: Vec<&str> = tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["host", "region"]);
        assert_eq!(tags.get("region"), Some("west"));
        assert_eq!(tags.get("zone"), None);
    }
}
