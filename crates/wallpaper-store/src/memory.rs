//! In-memory backends
//!
//! Both stores keep whole values behind a lock, so every write is an atomic
//! replace. Used by tests and for running the service without any storage.

use crate::error::Result;
use crate::store::{BlobStore, KeyIndexStore};
use crate::types::{paginate, BlobObject, ListPage, DEFAULT_LIST_LIMIT};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryKeyIndexStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an entry, returning the store to the never-written state
    pub async fn remove(&self, name: &str) -> Option<String> {
        self.entries.write().await.remove(name)
    }
}

#[async_trait]
impl KeyIndexStore for MemoryKeyIndexStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn put(&self, name: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(name.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
}

#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    gets: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_LIST_LIMIT)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size,
            gets: AtomicUsize::new(0),
        }
    }

    /// Store an object; the etag is derived from its content
    pub async fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: Option<&str>) {
        let data = data.into();
        let etag = hex::encode(&Sha256::digest(&data)[..16]);
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
                etag,
            },
        );
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.objects.write().await.remove(key).is_some()
    }

    /// Number of `get` calls served so far, hits and misses alike
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage> {
        let objects = self.objects.read().await;
        Ok(paginate(
            objects.keys().cloned(),
            prefix,
            cursor,
            self.page_size,
        ))
    }

    async fn get(&self, key: &str) -> Result<Option<BlobObject>> {
        self.gets.fetch_add(1, Ordering::Relaxed);

        let Some(stored) = self.objects.read().await.get(key).cloned() else {
            return Ok(None);
        };

        let data = stored.data;
        Ok(Some(BlobObject {
            key: key.to_string(),
            content_type: stored.content_type,
            size: data.len() as u64,
            etag: stored.etag,
            body: stream::once(async move { Ok(data) }).boxed(),
        }))
    }
}
