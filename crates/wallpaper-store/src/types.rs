//! Shared storage types

use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;

/// Streaming object body
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Page size used by backends when listing, matching common object store limits
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Continuation cursor, present when more keys follow
    pub cursor: Option<String>,
}

impl ListPage {
    pub fn is_truncated(&self) -> bool {
        self.cursor.is_some()
    }
}

/// An opened object: metadata plus its byte stream
pub struct BlobObject {
    pub key: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub etag: String,
    pub body: ByteStream,
}

impl BlobObject {
    /// The etag in HTTP header form (quoted)
    pub fn http_etag(&self) -> String {
        if self.etag.starts_with('"') || self.etag.starts_with("W/\"") {
            self.etag.clone()
        } else {
            format!("\"{}\"", self.etag)
        }
    }
}

impl fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobObject")
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// Cut one page out of an ascending key sequence.
pub(crate) fn paginate<I>(
    sorted_keys: I,
    prefix: &str,
    cursor: Option<&str>,
    limit: usize,
) -> ListPage
where
    I: IntoIterator<Item = String>,
{
    let limit = limit.max(1);
    let mut keys: Vec<String> = sorted_keys
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .filter(|key| cursor.is_none_or(|after| key.as_str() > after))
        .take(limit + 1)
        .collect();

    let cursor = if keys.len() > limit {
        keys.truncate(limit);
        keys.last().cloned()
    } else {
        None
    };

    ListPage { keys, cursor }
}
