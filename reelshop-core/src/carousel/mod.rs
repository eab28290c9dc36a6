//! Per-product carousel loading and slide state.

mod flags;
mod loader;

pub use flags::{FeedRole, LoadFlags};
pub use loader::{CarouselLoader, Frame, SlotState};
