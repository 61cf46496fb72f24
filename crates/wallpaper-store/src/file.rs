//! Filesystem backends
//!
//! `FileKeyIndexStore` keeps one `<name>.json` file per index entry and
//! writes through a temp file plus rename. `FileBlobStore` maps `/`-separated
//! keys onto files below a root directory.

use crate::error::{Result, StoreError};
use crate::store::{BlobStore, KeyIndexStore};
use crate::types::{paginate, BlobObject, ListPage, DEFAULT_LIST_LIMIT};
use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Key index store backed by a directory of JSON files
#[derive(Debug, Clone)]
pub struct FileKeyIndexStore {
    dir: PathBuf,
}

impl FileKeyIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the index directory if needed
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(StoreError::InvalidKey(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl KeyIndexStore for FileKeyIndexStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let path = self.entry_path(name)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, name: &str, value: String) -> Result<()> {
        let path = self.entry_path(name)?;
        // Unique per write so overlapping writers never share a temp file
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&tmp, value.as_bytes()).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                warn!(path = ?tmp, error = %cleanup, "Failed to remove temp index file");
            }
            return Err(e.into());
        }

        debug!(name, bytes = value.len(), "Wrote index entry");
        Ok(())
    }
}

/// Blob store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
    page_size: usize,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Create the root directory if needed
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.contains('\\')
            && key
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(key.split('/').fold(self.root.clone(), |path, part| path.join(part)))
    }

    /// All object keys under the directory `start` (relative to the root),
    /// skipping dotfiles.
    async fn walk_keys(&self, start: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![start.trim_end_matches('/').to_string()];

        while let Some(rel_dir) = pending.pop() {
            let dir = if rel_dir.is_empty() {
                self.root.clone()
            } else {
                self.object_path(&rel_dir)?
            };

            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    warn!(path = ?entry.path(), "Skipping non UTF-8 file name");
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }

                let key = if rel_dir.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", rel_dir, name)
                };

                if entry.file_type().await?.is_dir() {
                    pending.push(key);
                } else {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage> {
        let keys = self.walk_keys(walk_start(prefix)).await?;
        Ok(paginate(keys, prefix, cursor, self.page_size))
    }

    /// Single walk of the tree; paging through `list` would re-walk per page
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = self.walk_keys(walk_start(prefix)).await?;
        keys.retain(|key| key.starts_with(prefix));
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<BlobObject>> {
        let path = self.object_path(key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Ok(None);
        }

        let size = metadata.len();
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        Ok(Some(BlobObject {
            key: key.to_string(),
            content_type: content_type_for_key(key).map(str::to_string),
            size,
            etag: file_etag(key, size, modified),
            body: ReaderStream::new(file).boxed(),
        }))
    }
}

/// Directory to walk for `prefix`: only its directory part narrows the walk
fn walk_start(prefix: &str) -> &str {
    prefix.rfind('/').map(|i| &prefix[..i]).unwrap_or("")
}

fn file_etag(key: &str, size: u64, modified_nanos: u128) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", key, size, modified_nanos));
    hex::encode(&digest[..16])
}

/// Image content type implied by a key's file extension
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let ext = Path::new(key).extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(content_type)
}
