use std::fmt;

use arrow::error::ArrowError;

use crate::schema::ColType;

/// Raised when a group cursor yields a series whose value type differs from
/// the type the group table was built for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema collision: cannot group {expected} and {actual} types together")]
pub struct GroupCursorError {
    pub expected: ColType,
    pub actual: ColType,
}

#[derive(Debug)]
pub enum Error {
    InvalidSchema(String),
    GroupCursor(GroupCursorError),
    MemoryLimit {
        requested: usize,
        allocated: usize,
        limit: usize,
    },
    AlreadyRead,
    Consumer(anyhow::Error),
    Arrow(ArrowError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSchema(msg) => write!(f, "invalid schema: {msg}"),
            Error::GroupCursor(err) => write!(f, "{err}"),
            Error::MemoryLimit {
                requested,
                allocated,
                limit,
            } => write!(
                f,
                "memory limit exceeded: requested {requested} bytes with {allocated} of {limit} allocated"
            ),
            Error::AlreadyRead => write!(f, "table already read"),
            Error::Consumer(err) => write!(f, "consumer error: {err}"),
            Error::Arrow(err) => write!(f, "arrow error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::GroupCursor(err) => Some(err),
            Error::Consumer(err) => Some(err.as_ref()),
            Error::Arrow(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GroupCursorError> for Error {
    fn from(value: GroupCursorError) -> Self {
        Error::GroupCursor(value)
    }
}

impl From<ArrowError> for Error {
    fn from(value: ArrowError) -> Self {
        Error::Arrow(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
