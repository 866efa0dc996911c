//! Column descriptors, group keys and query bounds.
//!
//! Every table produced by this crate shares one fixed column layout:
//!
//! ```text
//! 0: _start  (timestamp)
//! 1: _stop   (timestamp)
//! 2: _time   (timestamp)
//! 3: _value  (float | integer | unsigned | string | boolean)
//! 4..: tag columns (nullable string)
//! ```

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};

use crate::error::{Error, Result};

pub const START_COL_IDX: usize = 0;
pub const STOP_COL_IDX: usize = 1;
pub const TIME_COL_IDX: usize = 2;
pub const VALUE_COL_IDX: usize = 3;
pub const FIRST_TAG_COL_IDX: usize = 4;

pub const START_COL_LABEL: &str = "_start";
pub const STOP_COL_LABEL: &str = "_stop";
pub const TIME_COL_LABEL: &str = "_time";
pub const VALUE_COL_LABEL: &str = "_value";

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ColType {
    Time,
    Float,
    Integer,
    Unsigned,
    String,
    Boolean,
}

impl ColType {
    pub fn data_type(self) -> DataType {
        match self {
            ColType::Time => DataType::Timestamp(TimeUnit::Nanosecond, None),
            ColType::Float => DataType::Float64,
            ColType::Integer => DataType::Int64,
            ColType::Unsigned => DataType::UInt64,
            ColType::String => DataType::Utf8,
            ColType::Boolean => DataType::Boolean,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColType::Time => "time",
            ColType::Float => "float",
            ColType::Integer => "integer",
            ColType::Unsigned => "unsigned",
            ColType::String => "string",
            ColType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColMeta {
    pub label: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub ty: ColType,
}

impl ColMeta {
    pub fn new(label: impl Into<String>, ty: ColType) -> Self {
        Self {
            label: label.into(),
            ty,
        }
    }

    /// Builds the standard column list: bounds, time, value, then one string
    /// column per tag key.
    pub fn table_columns<I, S>(value_type: ColType, tag_keys: I) -> Vec<ColMeta>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cols = vec![
            ColMeta::new(START_COL_LABEL, ColType::Time),
            ColMeta::new(STOP_COL_LABEL, ColType::Time),
            ColMeta::new(TIME_COL_LABEL, ColType::Time),
            ColMeta::new(VALUE_COL_LABEL, value_type),
        ];
        cols.extend(tag_keys.into_iter().map(|k| ColMeta::new(k, ColType::String)));
        cols
    }
}

/// Returns the index of the column labelled `label`.
pub fn col_idx(label: &str, cols: &[ColMeta]) -> Option<usize> {
    cols.iter().position(|c| c.label == label)
}

/// Checks the fixed column layout and that `_value` has type `value_type`.
pub fn validate_columns(cols: &[ColMeta], value_type: ColType) -> Result<()> {
    let expected = [
        (START_COL_IDX, START_COL_LABEL, ColType::Time),
        (STOP_COL_IDX, STOP_COL_LABEL, ColType::Time),
        (TIME_COL_IDX, TIME_COL_LABEL, ColType::Time),
        (VALUE_COL_IDX, VALUE_COL_LABEL, value_type),
    ];
    for (idx, label, ty) in expected {
        match cols.get(idx) {
            Some(col) if col.label == label && col.ty == ty => {}
            Some(col) => {
                return Err(Error::InvalidSchema(format!(
                    "column {idx} must be {label}:{ty}, found {}:{}",
                    col.label, col.ty
                )))
            }
            None => {
                return Err(Error::InvalidSchema(format!(
                    "missing column {idx} ({label})"
                )))
            }
        }
    }
    for (idx, col) in cols.iter().enumerate().skip(FIRST_TAG_COL_IDX) {
        if col.ty != ColType::String {
            return Err(Error::InvalidSchema(format!(
                "tag column {idx} ({}) must be string, found {}",
                col.label, col.ty
            )));
        }
    }
    Ok(())
}

/// Builds the arrow schema for a column list. Tag columns are nullable.
pub fn arrow_schema(cols: &[ColMeta]) -> SchemaRef {
    let fields: Vec<Field> = cols
        .iter()
        .enumerate()
        .map(|(idx, col)| Field::new(&col.label, col.ty.data_type(), idx >= FIRST_TAG_COL_IDX))
        .collect();
    Arc::new(Schema::new(fields))
}

/// A scalar value in a group key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Time(i64),
    Float(f64),
    Integer(i64),
    Unsigned(u64),
    String(String),
    Boolean(bool),
}

impl Value {
    pub fn col_type(&self) -> ColType {
        match self {
            Value::Time(_) => ColType::Time,
            Value::Float(_) => ColType::Float,
            Value::Integer(_) => ColType::Integer,
            Value::Unsigned(_) => ColType::Unsigned,
            Value::String(_) => ColType::String,
            Value::Boolean(_) => ColType::Boolean,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Time(v) | Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered key columns and values identifying the partition a table belongs
/// to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupKey {
    cols: Vec<ColMeta>,
    values: Vec<Value>,
}

impl GroupKey {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        let mut cols = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (label, value) in entries {
            cols.push(ColMeta::new(label, value.col_type()));
            values.push(value);
        }
        Self { cols, values }
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn value(&self, label: &str) -> Option<&Value> {
        col_idx(label, &self.cols).map(|idx| &self.values[idx])
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (col, value)) in self.cols.iter().zip(&self.values).enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", col.label, value)?;
        }
        f.write_str("}")
    }
}

/// Query window, `[start, stop)` in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub start: i64,
    pub stop: i64,
}

impl Bounds {
    pub fn new(start: i64, stop: i64) -> Self {
        Self { start, stop }
    }
}
