pub mod prefetch {
    use std::time::Duration;

    /// Head start given to the current product before the next product's
    /// lead media is released to the queue.
    pub const NEXT_LEAD_DELAY: Duration = Duration::from_millis(50);

    /// Head start given to the current product's remaining media before the
    /// next product's remaining media is released.
    pub const NEXT_REST_DELAY: Duration = Duration::from_millis(100);

    /// Maximum media fetches dispatched at once.
    pub const MAX_CONCURRENT_LOADS: usize = 6;

    /// Bytes requested when warming a video (enough for container metadata).
    pub const VIDEO_PROBE_BYTES: u64 = 512 * 1024;
}

pub mod feed {
    use std::time::Duration;

    /// Quiet period after the last scroll event before the current index is
    /// recomputed.
    pub const SCROLL_SETTLE: Duration = Duration::from_millis(100);

    /// Fraction of a card that must be visible for it to count as in view.
    pub const IN_VIEW_THRESHOLD: f32 = 0.5;

    /// Scroll depth that triggers growing the feed.
    pub const LOAD_MORE_THRESHOLD: f32 = 0.8;

    /// Products appended to the displayed window per growth step.
    pub const DISPLAY_BATCH: usize = 5;

    /// Delay between automatic carousel advances for image-only products.
    pub const AUTOPLAY_INTERVAL: Duration = Duration::from_millis(3000);
}

pub mod api {
    use std::time::Duration;

    pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Products requested for the initial feed load.
    pub const INITIAL_PAGE_LIMIT: u32 = 150;

    pub const CATEGORY_MAX_RETRIES: u32 = 3;

    /// Base of the linear backoff between category retries.
    pub const CATEGORY_RETRY_STEP: Duration = Duration::from_secs(1);
}
