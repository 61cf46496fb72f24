//! Storage collaborators for the wallpaper service
//!
//! Defines the two narrow interfaces the service consumes (a key index store
//! holding one serialized key list per partition, and a blob store holding the
//! images themselves) together with in-memory and filesystem backends.

mod error;
mod file;
mod memory;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use file::{content_type_for_key, FileBlobStore, FileKeyIndexStore};
pub use memory::{MemoryBlobStore, MemoryKeyIndexStore};
pub use store::{BlobStore, KeyIndexStore};
pub use types::{BlobObject, ByteStream, ListPage, DEFAULT_LIST_LIMIT};
