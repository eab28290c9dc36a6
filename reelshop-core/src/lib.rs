//! # Reelshop Core
//!
//! Client-side engine of the Reelshop product feed: a vertical list of
//! products where each product owns a horizontal carousel of media (an
//! optional video followed by images).
//!
//! ## Overview
//!
//! - [`media`]: the shared, de-duplicating [`MediaCache`] and the
//!   [`MediaFetcher`] that performs network loads
//! - [`prefetch`]: the tiered [`PrefetchScheduler`] with cancellation and
//!   bounded concurrency
//! - [`carousel`]: per-product [`CarouselLoader`] deciding what to request
//! - [`feed`]: the [`FeedViewport`] and the [`FeedSession`] tying everything
//!   together, plus persisted likes
//! - [`api`]: the product REST client
//!
//! Control flows one way: scroll and visibility signals update the viewport,
//! the viewport hands [`LoadFlags`] to carousels, carousels submit tiered
//! requests to the scheduler, and the scheduler loads through the cache.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use reelshop_core::{
//!     ApiClient, FeedConfig, FeedSession, HttpMediaFetcher, LikedProducts, MediaCache,
//!     ProductFilters,
//! };
//!
//! async fn open_feed() -> reelshop_core::Result<()> {
//!     let config = FeedConfig::load();
//!     let api = ApiClient::from_config(&config)?;
//!     let fetcher = HttpMediaFetcher::new(
//!         config.request_timeout(),
//!         config.prefetch.video_probe_bytes,
//!     )?;
//!     let cache = MediaCache::new(Arc::new(fetcher));
//!
//!     let mut session = FeedSession::new(cache, &config, 800.0, LikedProducts::in_memory());
//!     session.replace_products(api.fetch_products(&ProductFilters::default()).await?);
//!     session.on_intersection(0, 1.0);
//!     session.tick(Instant::now());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod api;
pub mod carousel;
pub mod config;
pub mod constants;
pub mod error;
pub mod feed;
pub mod media;
pub mod prefetch;
pub mod testing;

pub use api::{ApiClient, ProductFilters, SearchFilters, SortOrder};
pub use carousel::{CarouselLoader, FeedRole, Frame, LoadFlags, SlotState};
pub use config::{FeedConfig, PrefetchConfig};
pub use error::{ApiError, ConfigError, CoreError, MediaError, Result};
pub use feed::{FeedSession, FeedViewport, LikedProducts, LoadMore, TickReport};
pub use media::{CacheState, HttpMediaFetcher, MediaCache, MediaFetcher, MediaHandle};
pub use prefetch::{LoadEvent, LoadOutcome, LoadTier, PrefetchScheduler};
