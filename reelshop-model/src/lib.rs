//! Core data model definitions shared across Reelshop crates.
#![allow(missing_docs)]

pub mod catalog;
pub mod error;
pub mod media;
pub mod prelude;
pub mod price;
pub mod product;
pub mod signup;

// Intentionally curated re-exports for downstream consumers.
pub use catalog::{Category, ProductPage};
pub use error::{ModelError, Result as ModelResult};
pub use media::{MediaItem, MediaKind, lead_len, media_sequence};
pub use price::{format_price, parse_percent};
pub use product::{Product, ProductId};
pub use signup::{EmailAddress, SignupOutcome};
