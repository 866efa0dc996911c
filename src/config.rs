//! Scan configuration.
//!
//! Shared by every table created for one read: sizes the replicated tag
//! cache and optionally caps column buffer memory.

use std::sync::Arc;

use crate::memory::{Allocator, TrackingAllocator};
use crate::table::TagsCache;

/// Configuration for a read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanConfig {
    /// Maximum number of distinct tag values kept in the tag cache.
    /// Default: 1024
    pub tags_cache_size: usize,

    /// Ceiling on column buffer memory, in bytes.
    /// Default: unlimited
    pub memory_limit_bytes: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tags_cache_size: 1024,
            memory_limit_bytes: None,
        }
    }
}

impl ScanConfig {
    pub fn tags_cache_size(mut self, size: usize) -> Self {
        self.tags_cache_size = size;
        self
    }

    pub fn memory_limit_bytes(mut self, limit: usize) -> Self {
        self.memory_limit_bytes = Some(limit);
        self
    }

    pub fn allocator(&self) -> Arc<TrackingAllocator> {
        match self.memory_limit_bytes {
            Some(limit) => Arc::new(TrackingAllocator::with_limit(limit)),
            None => Arc::new(TrackingAllocator::new()),
        }
    }

    pub fn tags_cache(&self, alloc: Arc<dyn Allocator>) -> Arc<TagsCache> {
        Arc::new(TagsCache::new(self.tags_cache_size, alloc))
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
