//! Feed focused snapshot of the model surface.
//! Prefer importing from this module in client crates instead of reaching
//! into individual tree nodes.

pub use super::catalog::{Category, ProductPage};
pub use super::error::{ModelError, Result as ModelResult};
pub use super::media::{MediaItem, MediaKind, lead_len, media_sequence};
pub use super::price::{DEFAULT_CURRENCY, format_price};
pub use super::product::{Product, ProductId};
pub use super::signup::{EmailAddress, SignupOutcome};
