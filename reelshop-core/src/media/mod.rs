//! Media loading: fetchers, loaded handles and the shared URL cache.

mod cache;
mod fetcher;
mod handle;

pub use cache::{CacheState, CacheStats, MediaCache};
pub use fetcher::{HttpMediaFetcher, MediaFetcher, probe_dimensions};
pub use handle::{MediaHandle, MediaPayload};
