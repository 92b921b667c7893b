use tracing::warn;

use super::{ObjectStore, ObjectSummary};

/// Page size of the listing used for existence checks
pub const LIST_PAGE_SIZE: i32 = 50;

/// Look up an object stored at exactly `key`
///
/// The store is listed by prefix and the page is scanned for an exact match.
/// A failed listing is reported as "not found" so that publishing is never
/// blocked by the check; the failure is logged because a wrong bucket or
/// region shows up here first.
pub async fn find_existing(store: &dyn ObjectStore, key: &str) -> Option<ObjectSummary> {
    match store.list(key, LIST_PAGE_SIZE).await {
        Ok(objects) => objects.into_iter().find(|object| object.key == key),
        Err(e) => {
            warn!("Existence check failed for {}, uploading anyway: {:#}", key, e);
            None
        }
    }
}
