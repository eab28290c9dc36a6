//! The vertical product feed: viewport tracking, session state and likes.

mod likes;
mod session;
mod viewport;

pub use likes::LikedProducts;
pub use session::{FeedSession, LoadMore, TickReport};
pub use viewport::FeedViewport;
