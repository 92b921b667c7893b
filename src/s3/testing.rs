use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ObjectStore, ObjectSummary};
use crate::config::UploadOptions;

#[derive(Debug, Clone)]
pub struct PutCall {
    pub key: String,
    pub body: Bytes,
    pub options: UploadOptions,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Bytes>,
    list_calls: Vec<(String, i32)>,
    put_calls: Vec<PutCall>,
    fail_lists: bool,
    put_failures: Option<usize>,
}

/// In-memory store that records calls and fails on demand
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), Bytes::new());
    }

    pub fn fail_lists(&self) {
        self.state.lock().unwrap().fail_lists = true;
    }

    /// Fail the next `n` puts
    pub fn fail_puts(&self, n: usize) {
        self.state.lock().unwrap().put_failures = Some(n);
    }

    pub fn fail_all_puts(&self) {
        self.state.lock().unwrap().put_failures = Some(usize::MAX);
    }

    pub fn list_calls(&self) -> Vec<(String, i32)> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn put_calls(&self) -> Vec<PutCall> {
        self.state.lock().unwrap().put_calls.clone()
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<ObjectSummary>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push((prefix.to_string(), max_keys));
        if state.fail_lists {
            bail!("list failed: SignatureDoesNotMatch");
        }

        let uploaded_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).single();
        Ok(state
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .take(usize::try_from(max_keys).unwrap_or(0))
            .map(|key| ObjectSummary {
                key: key.clone(),
                last_modified: uploaded_at,
            })
            .collect())
    }

    async fn put(&self, key: &str, body: Bytes, options: &UploadOptions) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.put_calls.push(PutCall {
            key: key.to_string(),
            body: body.clone(),
            options: options.clone(),
        });

        if let Some(remaining) = state.put_failures.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                bail!("put failed: connection reset");
            }
        }

        state.objects.insert(key.to_string(), body);
        Ok(())
    }
}
