use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use reelshop_model::MediaKind;

/// Raw result of a media fetch, before it is shared through the cache.
#[derive(Clone)]
pub struct MediaPayload {
    pub url: String,
    pub kind: MediaKind,
    pub bytes: Bytes,
    pub content_type: Option<String>,
    /// Pixel dimensions for images whose header could be read.
    pub dimensions: Option<(u32, u32)>,
    /// True when only a prefix of the resource was fetched (video warm-up).
    pub partial: bool,
    pub fetched_at: Instant,
}

impl fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPayload")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("dimensions", &self.dimensions)
            .field("partial", &self.partial)
            .finish()
    }
}

/// Cheap, shareable handle to loaded media.
///
/// Every requester of the same URL receives a clone of the same handle.
#[derive(Clone)]
pub struct MediaHandle {
    inner: Arc<MediaPayload>,
}

impl MediaHandle {
    pub fn new(payload: MediaPayload) -> Self {
        Self {
            inner: Arc::new(payload),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    pub fn bytes(&self) -> &Bytes {
        &self.inner.bytes
    }

    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.inner.dimensions
    }

    pub fn is_partial(&self) -> bool {
        self.inner.partial
    }

    pub fn fetched_at(&self) -> Instant {
        self.inner.fetched_at
    }

    /// Whether two handles point at the very same loaded payload.
    pub fn ptr_eq(a: &MediaHandle, b: &MediaHandle) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaHandle")
            .field("url", &self.inner.url)
            .field("kind", &self.inner.kind)
            .field("bytes", &self.inner.bytes.len())
            .finish()
    }
}
