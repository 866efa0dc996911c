//! Columnar tables over time-series storage cursors.
//!
//! Storage hands out cursors that yield blocks of `(timestamp, value)` pairs
//! per series. This crate presents them to a query engine as tables of arrow
//! column batches with a fixed layout: `_start`, `_stop`, `_time`, `_value`,
//! then one string column per tag key.
//!
//! Entry points are [`table::new_series_table`] for a single series and
//! [`table::new_group_table`] for a group of series read as one table.

pub mod config;
pub mod cursors;
pub mod error;
pub mod memory;
pub mod schema;
pub mod table;
pub mod value;

pub use config::ScanConfig;
pub use cursors::{CursorStats, GroupCursor, SeriesCursor, Tags, ValueCursor};
pub use error::{Error, GroupCursorError, Result};
pub use table::{new_group_table, new_series_table, ColumnBatch, Table, TableParams};
