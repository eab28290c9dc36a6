use std::time::{Duration, Instant};

use reelshop_model::{MediaItem, Product, ProductId, lead_len};

use super::flags::{FeedRole, LoadFlags};
use crate::media::{MediaCache, MediaHandle};
use crate::prefetch::{LoadEvent, LoadOutcome, LoadTicket, LoadTier, PrefetchScheduler};

/// Load state of one carousel slot.
#[derive(Debug, Clone, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Requested(LoadTicket),
    Loaded(MediaHandle),
    Failed,
    Cancelled,
}

impl SlotState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, SlotState::Loaded(_))
    }

    pub fn is_requested(&self) -> bool {
        matches!(self, SlotState::Requested(_))
    }

    pub fn handle(&self) -> Option<&MediaHandle> {
        match self {
            SlotState::Loaded(handle) => Some(handle),
            _ => None,
        }
    }
}

/// What the carousel shows at the moment.
#[derive(Debug, Clone)]
pub enum Frame<'a> {
    /// The video slot. Videos render from their own stream; `warmed` is the
    /// prefetched head if it landed.
    Video {
        index: usize,
        url: &'a str,
        warmed: Option<&'a MediaHandle>,
    },
    Image {
        index: usize,
        handle: &'a MediaHandle,
    },
    Placeholder,
}

/// Per-product media loader.
///
/// Turns [`LoadFlags`] into scheduler requests, tracks each slot's state and
/// drives the displayed slide (manual navigation and autoplay).
#[derive(Debug)]
pub struct CarouselLoader {
    product_index: usize,
    product_id: ProductId,
    items: Vec<MediaItem>,
    slots: Vec<SlotState>,
    lead: usize,
    flags: LoadFlags,
    displayed: usize,
    last_shown: Option<usize>,
    autoplay: Option<Duration>,
    autoplay_since: Option<Instant>,
    muted: bool,
}

impl CarouselLoader {
    pub fn new(product_index: usize, product: &Product, autoplay: Option<Duration>) -> Self {
        Self::from_items(product_index, product.product_id.clone(), product.media(), autoplay)
    }

    pub fn from_items(
        product_index: usize,
        product_id: ProductId,
        items: Vec<MediaItem>,
        autoplay: Option<Duration>,
    ) -> Self {
        let has_video = items.iter().any(MediaItem::is_video);
        let autoplay = autoplay.filter(|_| !has_video && items.len() > 1);

        Self {
            product_index,
            product_id,
            lead: lead_len(&items),
            slots: vec![SlotState::Idle; items.len()],
            items,
            flags: LoadFlags::inactive(),
            displayed: 0,
            last_shown: None,
            autoplay,
            autoplay_since: None,
            muted: true,
        }
    }

    pub fn product_index(&self) -> usize {
        self.product_index
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&SlotState> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    pub fn flags(&self) -> LoadFlags {
        self.flags
    }

    pub fn displayed(&self) -> usize {
        self.displayed
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_loaded()).count()
    }

    pub fn is_lead(&self, index: usize) -> bool {
        index < self.lead
    }

    pub fn autoplay_enabled(&self) -> bool {
        self.autoplay.is_some()
    }

    /// Apply new load flags from the feed.
    ///
    /// Losing `load_rest` cancels every outstanding non-lead request (manual
    /// ones survive while the product is still current). Lead requests are
    /// never withdrawn. Failed slots are retried only on a rising edge of
    /// their flag.
    pub fn apply(&mut self, flags: LoadFlags, scheduler: &PrefetchScheduler, cache: &MediaCache) {
        let previous = std::mem::replace(&mut self.flags, flags);
        if previous == flags {
            return;
        }

        log::trace!(
            "[Carousel] product {} flags {:?} -> {:?}",
            self.product_index,
            previous,
            flags
        );

        if !flags.load_rest {
            let keep_manual = flags.is_current();
            self.cancel_rest(scheduler, keep_manual);
        }

        if let Some(tier) = flags.first_tier() {
            let retry_failed = !previous.load_first;
            for index in 0..self.lead {
                self.ensure_requested(index, tier, retry_failed, scheduler, cache);
            }
        }

        if let Some(tier) = flags.rest_tier() {
            let retry_failed = !previous.load_rest;
            for index in self.lead..self.items.len() {
                self.ensure_requested(index, tier, retry_failed, scheduler, cache);
            }
        }

        if !flags.is_current() {
            self.autoplay_since = None;
        }
    }

    fn ensure_requested(
        &mut self,
        index: usize,
        tier: LoadTier,
        retry_failed: bool,
        scheduler: &PrefetchScheduler,
        cache: &MediaCache,
    ) {
        match &mut self.slots[index] {
            SlotState::Loaded(_) => {}
            SlotState::Requested(ticket) => {
                // Next became current: its queued requests move up with it.
                scheduler.promote(ticket, tier);
            }
            SlotState::Failed if !retry_failed => {}
            SlotState::Idle | SlotState::Cancelled | SlotState::Failed => {
                self.request(index, tier, scheduler, cache);
            }
        }
    }

    fn request(
        &mut self,
        index: usize,
        tier: LoadTier,
        scheduler: &PrefetchScheduler,
        cache: &MediaCache,
    ) {
        let item = &self.items[index];
        if let Some(handle) = cache.get_cached(item.url()) {
            self.mark_loaded(index, handle);
            return;
        }

        let ticket = scheduler.submit(self.product_index, index, item.clone(), tier);
        self.slots[index] = SlotState::Requested(ticket);
    }

    fn cancel_rest(&mut self, scheduler: &PrefetchScheduler, keep_manual: bool) {
        let mut cancelled = 0;
        for slot in self.slots.iter_mut().skip(self.lead) {
            if let SlotState::Requested(ticket) = slot {
                if keep_manual && ticket.tier() == LoadTier::Manual {
                    continue;
                }
                scheduler.cancel(ticket);
                *slot = SlotState::Cancelled;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            log::debug!(
                "[Carousel] product {} cancelled {} pending loads",
                self.product_index,
                cancelled
            );
        }
    }

    /// Cancel everything outstanding, lead media included. Used when the
    /// product leaves the feed entirely.
    pub fn cancel_all(&mut self, scheduler: &PrefetchScheduler) {
        for slot in &mut self.slots {
            if let SlotState::Requested(ticket) = slot {
                scheduler.cancel(ticket);
                *slot = SlotState::Cancelled;
            }
        }
        self.flags = LoadFlags::inactive();
        self.autoplay_since = None;
    }

    /// Record a scheduler completion. Returns `false` for stale events
    /// (cancelled, superseded or for another product).
    pub fn on_event(&mut self, event: &LoadEvent) -> bool {
        if event.product_index != self.product_index {
            return false;
        }
        let Some(slot) = self.slots.get_mut(event.media_index) else {
            return false;
        };
        let current = match slot {
            SlotState::Requested(ticket) => ticket.id() == event.ticket && !ticket.is_cancelled(),
            _ => false,
        };
        if !current {
            log::trace!(
                "[Carousel] product {} ignoring stale event #{}",
                self.product_index,
                event.ticket
            );
            return false;
        }

        match &event.outcome {
            LoadOutcome::Loaded(handle) => self.mark_loaded(event.media_index, handle.clone()),
            LoadOutcome::Failed => {
                log::warn!(
                    "[Carousel] product {} media {} failed: {}",
                    self.product_index,
                    event.media_index,
                    event.url
                );
                self.slots[event.media_index] = SlotState::Failed;
                if event.media_index == self.displayed && self.items[self.displayed].is_video() {
                    self.skip_failed_video();
                }
            }
        }
        true
    }

    /// Move off a displayed video that failed to load, preferring the next
    /// loaded slide and otherwise the next one that has not failed.
    fn skip_failed_video(&mut self) {
        let len = self.items.len();
        let following: Vec<usize> = (1..len).map(|step| (self.displayed + step) % len).collect();
        let target = following
            .iter()
            .copied()
            .find(|&index| self.slots[index].is_loaded())
            .or_else(|| {
                following
                    .iter()
                    .copied()
                    .find(|&index| !matches!(self.slots[index], SlotState::Failed))
            });

        let Some(target) = target else {
            return;
        };
        log::debug!(
            "[Carousel] product {} skipping failed video, showing media {}",
            self.product_index,
            target
        );
        self.displayed = target;
        if self.slots[target].is_loaded() {
            self.last_shown = Some(target);
        }
    }

    fn mark_loaded(&mut self, index: usize, handle: MediaHandle) {
        self.slots[index] = SlotState::Loaded(handle);
        if index == self.displayed {
            self.last_shown = Some(index);
        }
    }

    /// Show slide `index`. Stops autoplay. While the product is current, an
    /// unloaded target is requested (or promoted) at manual priority.
    pub fn navigate(
        &mut self,
        index: usize,
        scheduler: &PrefetchScheduler,
        cache: &MediaCache,
    ) -> bool {
        if index >= self.items.len() {
            return false;
        }

        self.displayed = index;
        self.autoplay = None;
        self.autoplay_since = None;

        if self.slots[index].is_loaded() {
            self.last_shown = Some(index);
        } else if self.flags.is_current() {
            log::debug!(
                "[Carousel] product {} manual load of media {}",
                self.product_index,
                index
            );
            match &mut self.slots[index] {
                SlotState::Requested(ticket) => {
                    scheduler.promote(ticket, LoadTier::Manual);
                }
                _ => self.request(index, LoadTier::Manual, scheduler, cache),
            }
        }
        true
    }

    pub fn next_slide(&mut self, scheduler: &PrefetchScheduler, cache: &MediaCache) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let target = (self.displayed + 1) % self.items.len();
        self.navigate(target, scheduler, cache)
    }

    pub fn previous_slide(&mut self, scheduler: &PrefetchScheduler, cache: &MediaCache) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let len = self.items.len();
        let target = (self.displayed + len - 1) % len;
        self.navigate(target, scheduler, cache)
    }

    /// Advance autoplay. Returns `true` if the displayed slide changed.
    ///
    /// The interval runs only while the product is current and the displayed
    /// slide is loaded; when it elapses the carousel moves to the following
    /// slide (wrapping) if that slide is loaded and otherwise stays put.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(interval) = self.autoplay else {
            return false;
        };
        if !self.flags.is_current() || !self.slots[self.displayed].is_loaded() {
            self.autoplay_since = None;
            return false;
        }

        let since = *self.autoplay_since.get_or_insert(now);
        if now.duration_since(since) < interval {
            return false;
        }
        self.autoplay_since = Some(now);

        let target = (self.displayed + 1) % self.items.len();
        if !self.slots[target].is_loaded() {
            log::trace!(
                "[Carousel] product {} holding on {}: {} not loaded",
                self.product_index,
                self.displayed,
                target
            );
            return false;
        }

        self.displayed = target;
        self.last_shown = Some(target);
        true
    }

    pub fn frame(&self) -> Frame<'_> {
        if let Some(item) = self.items.get(self.displayed)
            && item.is_video()
            && !self.displayed_failed()
        {
            return Frame::Video {
                index: self.displayed,
                url: item.url(),
                warmed: self.slots[self.displayed].handle(),
            };
        }

        [Some(self.displayed), self.last_shown]
            .into_iter()
            .flatten()
            .find_map(|index| {
                self.slots
                    .get(index)
                    .and_then(SlotState::handle)
                    .map(|handle| Frame::Image { index, handle })
            })
            .unwrap_or(Frame::Placeholder)
    }

    /// Whether the video slot should be playing.
    pub fn should_play_video(&self, in_view: bool) -> bool {
        self.flags.role == FeedRole::Current
            && in_view
            && !self.displayed_failed()
            && self
                .items
                .get(self.displayed)
                .is_some_and(MediaItem::is_video)
    }

    fn displayed_failed(&self) -> bool {
        matches!(self.slots.get(self.displayed), Some(SlotState::Failed))
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrefetchConfig;
    use crate::testing::ScriptedFetcher;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Rig {
        fetcher: ScriptedFetcher,
        cache: MediaCache,
        scheduler: PrefetchScheduler,
        events: UnboundedReceiver<LoadEvent>,
    }

    impl Rig {
        fn new() -> Self {
            let fetcher = ScriptedFetcher::new();
            let cache = MediaCache::new(Arc::new(fetcher.clone()));
            let (scheduler, events) =
                PrefetchScheduler::new(cache.clone(), &PrefetchConfig::default());
            let _ = scheduler.start();
            Self {
                fetcher,
                cache,
                scheduler,
                events,
            }
        }

        async fn pump(&mut self, carousel: &mut CarouselLoader) {
            tokio::time::sleep(Duration::from_millis(150)).await;
            while let Ok(event) = self.events.try_recv() {
                carousel.on_event(&event);
            }
        }
    }

    fn images(names: &[&str]) -> Vec<MediaItem> {
        names
            .iter()
            .map(|name| MediaItem::image(format!("https://cdn.test/{name}.jpg")))
            .collect()
    }

    fn carousel(items: Vec<MediaItem>) -> CarouselLoader {
        CarouselLoader::from_items(0, ProductId::new("p0"), items, Some(Duration::from_secs(3)))
    }

    #[tokio::test(start_paused = true)]
    async fn current_out_of_view_loads_only_the_first_image() {
        let mut rig = Rig::new();
        let mut loader = carousel(images(&["a", "b", "c"]));

        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;

        assert!(loader.slot(0).unwrap().is_loaded());
        assert!(matches!(loader.slot(1), Some(SlotState::Idle)));
        assert_eq!(rig.fetcher.calls(), vec!["https://cdn.test/a.jpg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_view_cancels_rest_but_keeps_first() {
        let mut rig = Rig::new();
        rig.fetcher.set_latency("https://cdn.test/a.jpg", Duration::from_millis(500));
        rig.fetcher.set_latency("https://cdn.test/b.jpg", Duration::from_millis(500));
        let mut loader = carousel(images(&["a", "b", "c"]));

        loader.apply(LoadFlags::next(true), &rig.scheduler, &rig.cache);
        assert!(loader.slot(0).unwrap().is_requested());
        assert!(loader.slot(2).unwrap().is_requested());

        loader.apply(LoadFlags::inactive(), &rig.scheduler, &rig.cache);
        assert!(loader.slot(0).unwrap().is_requested());
        assert!(matches!(loader.slot(1), Some(SlotState::Cancelled)));
        assert!(matches!(loader.slot(2), Some(SlotState::Cancelled)));

        tokio::time::sleep(Duration::from_millis(600)).await;
        while let Ok(event) = rig.events.try_recv() {
            loader.on_event(&event);
        }
        assert!(loader.slot(0).unwrap().is_loaded());
        assert!(!loader.slot(1).unwrap().is_loaded());
        assert_eq!(rig.fetcher.call_count("https://cdn.test/c.jpg"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hits_resolve_without_the_scheduler() {
        let mut rig = Rig::new();
        rig.cache
            .preload(&MediaItem::image("https://cdn.test/a.jpg"))
            .await
            .unwrap();
        let mut loader = carousel(images(&["a", "b"]));

        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);
        assert!(loader.slot(0).unwrap().is_loaded());
        assert_eq!(rig.scheduler.snapshot().queued, 0);
        rig.pump(&mut loader).await;
        assert_eq!(rig.fetcher.total_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn video_product_leads_with_video_and_cover() {
        let mut rig = Rig::new();
        let mut items = vec![MediaItem::video("https://cdn.test/v.mp4")];
        items.extend(images(&["i1", "i2", "i3"]));
        let mut loader = carousel(items);
        assert!(!loader.autoplay_enabled());

        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;

        let mut calls = rig.fetcher.calls();
        calls.sort();
        assert_eq!(calls, vec!["https://cdn.test/i1.jpg", "https://cdn.test/v.mp4"]);
        assert!(matches!(loader.frame(), Frame::Video { index: 0, .. }));
        assert!(loader.should_play_video(true));
        assert!(!loader.should_play_video(false));

        assert!(loader.is_muted());
        assert!(!loader.toggle_mute());
        assert!(!loader.is_muted());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_video_is_skipped_for_the_next_loaded_slide() {
        let mut rig = Rig::new();
        rig.fetcher.fail("https://cdn.test/v.mp4");
        let mut items = vec![MediaItem::video("https://cdn.test/v.mp4")];
        items.extend(images(&["a", "b"]));
        let mut loader = carousel(items);

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;

        assert!(matches!(loader.slot(0), Some(SlotState::Failed)));
        assert_eq!(loader.displayed(), 1);
        assert!(matches!(loader.frame(), Frame::Image { index: 1, .. }));
        assert!(!loader.should_play_video(true));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_video_alone_shows_a_placeholder() {
        let mut rig = Rig::new();
        rig.fetcher.fail("https://cdn.test/v.mp4");
        let mut loader = carousel(vec![MediaItem::video("https://cdn.test/v.mp4")]);

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;

        assert_eq!(loader.displayed(), 0);
        assert!(matches!(loader.frame(), Frame::Placeholder));
        assert!(!loader.should_play_video(true));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_navigation_requests_only_while_current() {
        let mut rig = Rig::new();
        let mut loader = carousel(images(&["a", "b", "c", "d"]));

        loader.apply(LoadFlags::next(false), &rig.scheduler, &rig.cache);
        loader.navigate(3, &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        assert_eq!(rig.fetcher.call_count("https://cdn.test/d.jpg"), 0);

        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);
        loader.navigate(2, &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        assert!(loader.slot(2).unwrap().is_loaded());
        assert!(matches!(loader.frame(), Frame::Image { index: 2, .. }));
        assert!(!loader.autoplay_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_load_survives_losing_view_while_current() {
        let mut rig = Rig::new();
        rig.fetcher.set_latency("https://cdn.test/c.jpg", Duration::from_millis(300));
        let mut loader = carousel(images(&["a", "b", "c"]));

        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);
        loader.navigate(2, &rig.scheduler, &rig.cache);
        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);

        assert!(loader.slot(2).unwrap().is_requested());
        assert!(matches!(loader.slot(1), Some(SlotState::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_never_moves_to_an_unloaded_slide() {
        let mut rig = Rig::new();
        rig.fetcher.set_latency("https://cdn.test/b.jpg", Duration::from_secs(10));
        let mut loader = carousel(images(&["a", "b", "c"]));

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        assert!(loader.slot(0).unwrap().is_loaded());
        assert!(!loader.slot(1).unwrap().is_loaded());

        let start = Instant::now();
        assert!(!loader.tick(start));
        assert!(!loader.tick(start + Duration::from_secs(3)));
        assert_eq!(loader.displayed(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(event) = rig.events.try_recv() {
            loader.on_event(&event);
        }
        assert!(loader.tick(start + Duration::from_secs(6)));
        assert_eq!(loader.displayed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_pauses_when_not_current() {
        let mut rig = Rig::new();
        let mut loader = carousel(images(&["a", "b"]));

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        loader.apply(LoadFlags::next(true), &rig.scheduler, &rig.cache);

        let start = Instant::now();
        assert!(!loader.tick(start));
        assert!(!loader.tick(start + Duration::from_secs(10)));
        assert_eq!(loader.displayed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_slot_retries_only_on_a_new_edge() {
        let mut rig = Rig::new();
        rig.fetcher.fail("https://cdn.test/a.jpg");
        let mut loader = carousel(images(&["a", "b"]));

        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        assert!(matches!(loader.slot(0), Some(SlotState::Failed)));
        assert!(matches!(loader.frame(), Frame::Placeholder));

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        assert_eq!(rig.fetcher.call_count("https://cdn.test/a.jpg"), 1);

        rig.fetcher.recover("https://cdn.test/a.jpg");
        loader.apply(LoadFlags::inactive(), &rig.scheduler, &rig.cache);
        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        assert!(loader.slot(0).unwrap().is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_slide_keeps_showing_the_last_good_one() {
        let mut rig = Rig::new();
        rig.fetcher.fail("https://cdn.test/b.jpg");
        let mut loader = carousel(images(&["a", "b"]));

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;
        loader.navigate(1, &rig.scheduler, &rig.cache);
        rig.pump(&mut loader).await;

        assert_eq!(loader.displayed(), 1);
        assert!(matches!(loader.frame(), Frame::Image { index: 0, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_events_are_ignored() {
        let mut rig = Rig::new();
        rig.fetcher.set_latency("https://cdn.test/b.jpg", Duration::from_millis(50));
        let mut loader = carousel(images(&["a", "b"]));

        loader.apply(LoadFlags::current(true), &rig.scheduler, &rig.cache);
        let SlotState::Requested(ticket) = loader.slot(1).unwrap().clone() else {
            panic!("slot 1 should be requested");
        };
        loader.apply(LoadFlags::current(false), &rig.scheduler, &rig.cache);

        let forged = LoadEvent {
            ticket: ticket.id(),
            product_index: 0,
            media_index: 1,
            url: "https://cdn.test/b.jpg".into(),
            outcome: LoadOutcome::Failed,
        };
        assert!(!loader.on_event(&forged));
        assert!(matches!(loader.slot(1), Some(SlotState::Cancelled)));
    }
}
