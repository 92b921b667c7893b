pub mod client;
pub mod exists;
pub mod helpers;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::UploadOptions;

pub use client::S3Store;
pub use exists::{LIST_PAGE_SIZE, find_existing};

/// A remote object as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// The two operations the publish pipeline needs from a bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List up to `max_keys` objects whose key starts with `prefix`
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<ObjectSummary>>;

    /// Write `body` at `key`
    async fn put(&self, key: &str, body: Bytes, options: &UploadOptions) -> Result<()>;
}
