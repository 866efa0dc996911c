//! Value types a table can carry in its `_value` column.
//!
//! [`ValueType`] is sealed: the set is closed to `f64`, `i64`, `u64`,
//! `String` and `bool`. Tables are generic over it, so one implementation
//! serves every type.

use std::mem::size_of;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, UInt64Array};

use crate::cursors::{SeriesCursor, ValueCursor};
use crate::schema::ColType;

mod sealed {
    pub trait Sealed {}
}

pub trait ValueType: sealed::Sealed + Clone + Send + Sync + Sized + 'static {
    const COL_TYPE: ColType;

    /// Moves `values` into an arrow array without converting them.
    fn into_array(values: Vec<Self>) -> ArrayRef;

    /// Bytes a storage cursor reports for scanning `values`.
    fn scanned_bytes(values: &[Self]) -> usize;

    /// Unwraps a series cursor of this type, handing it back on mismatch.
    fn downcast(cursor: SeriesCursor) -> Result<Box<dyn ValueCursor<Self>>, SeriesCursor>;

    fn into_series(cursor: Box<dyn ValueCursor<Self>>) -> SeriesCursor;
}

macro_rules! impl_value_type {
    ($ty:ty, $variant:ident, $array:ty) => {
        impl sealed::Sealed for $ty {}

        impl ValueType for $ty {
            const COL_TYPE: ColType = ColType::$variant;

            fn into_array(values: Vec<Self>) -> ArrayRef {
                Arc::new(<$array>::from(values))
            }

            fn scanned_bytes(values: &[Self]) -> usize {
                values.len() * size_of::<$ty>()
            }

            fn downcast(
                cursor: SeriesCursor,
            ) -> Result<Box<dyn ValueCursor<Self>>, SeriesCursor> {
                match cursor {
                    SeriesCursor::$variant(cur) => Ok(cur),
                    other => Err(other),
                }
            }

            fn into_series(cursor: Box<dyn ValueCursor<Self>>) -> SeriesCursor {
                SeriesCursor::$variant(cursor)
            }
        }
    };
}

impl_value_type!(f64, Float, Float64Array);
impl_value_type!(i64, Integer, Int64Array);
impl_value_type!(u64, Unsigned, UInt64Array);
impl_value_type!(bool, Boolean, BooleanArray);

impl sealed::Sealed for String {}

impl ValueType for String {
    const COL_TYPE: ColType = ColType::String;

    fn into_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(StringArray::from(values))
    }

    fn scanned_bytes(values: &[Self]) -> usize {
        values.iter().map(String::len).sum()
    }

    fn downcast(cursor: SeriesCursor) -> Result<Box<dyn ValueCursor<Self>>, SeriesCursor> {
        match cursor {
            SeriesCursor::String(cur) => Ok(cur),
            other => Err(other),
        }
    }

    fn into_series(cursor: Box<dyn ValueCursor<Self>>) -> SeriesCursor {
        SeriesCursor::String(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursors::memory::MemoryCursor;
    use arrow::array::Array;

    #[test]
    fn test_into_array_keeps_values() {
        let arr = f64::into_array(vec![1.5, 2.5]);
        let arr = arr.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(&arr.values()[..], &[1.5, 2.5]);

        let arr = String::into_array(vec!["a".to_string(), "bc".to_string()]);
        let arr = arr.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(arr.value(1), "bc");
    }

    #[test]
    fn test_downcast_mismatch_returns_cursor() {
        let cur = MemoryCursor::<i64>::from_blocks(vec![]).into_series();
        let Err(back) = f64::downcast(cur) else {
            panic!("integer cursor downcast to f64");
        };
        assert_eq!(back.col_type(), ColType::Integer);
        assert!(i64::downcast(back).is_ok());
    }

    #[test]
    fn test_scanned_bytes() {
        assert_eq!(u64::scanned_bytes(&[1, 2, 3]), 24);
        assert_eq!(String::scanned_bytes(&["ab".into(), "c".into()]), 3);
        assert_eq!(bool::scanned_bytes(&[true]), 1);
    }
}
