//! The storage interfaces consumed by the wallpaper service

use crate::error::{Result, StoreError};
use crate::types::{BlobObject, ListPage};
use async_trait::async_trait;

/// Small-object store holding one serialized key list per partition name.
#[async_trait]
pub trait KeyIndexStore: Send + Sync {
    /// Raw stored value, or `None` if the entry was never written
    async fn get(&self, name: &str) -> Result<Option<String>>;

    /// Replace the whole value of `name`. Readers observe either the previous
    /// value or the new one, never a partial write.
    async fn put(&self, name: &str, value: String) -> Result<()>;
}

/// Durable object store with prefix listing and streaming reads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// One page of keys under `prefix` in lexicographic order, starting after
    /// `cursor` (the cursor returned by the previous page).
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage>;

    /// Open an object, or `None` if no object exists under `key`
    async fn get(&self, key: &str) -> Result<Option<BlobObject>>;

    /// Every key under `prefix`, following list cursors to the end.
    ///
    /// Each cursor must sort strictly after the previous one; a cursor that
    /// stalls or moves backwards fails the listing.
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list(prefix, cursor.as_deref()).await?;
            keys.extend(page.keys);

            match page.cursor {
                Some(next) if cursor.as_deref().is_some_and(|prev| next.as_str() <= prev) => {
                    return Err(StoreError::Backend(format!(
                        "list cursor did not advance past {}",
                        cursor.unwrap_or_default()
                    )));
                }
                Some(next) => cursor = Some(next),
                None => return Ok(keys),
            }
        }
    }
}
