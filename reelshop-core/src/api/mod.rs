//! HTTP client for the product API and the mailing list endpoint.

mod client;
mod envelope;
mod filters;

pub use client::{ApiClient, normalize_base_url};
pub use filters::{ALL_CATEGORIES, ProductFilters, SearchFilters, SortOrder};
