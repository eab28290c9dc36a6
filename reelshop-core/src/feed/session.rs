use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reelshop_model::{Product, ProductPage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::likes::LikedProducts;
use super::viewport::FeedViewport;
use crate::carousel::{CarouselLoader, LoadFlags};
use crate::config::FeedConfig;
use crate::error::Result;
use crate::media::MediaCache;
use crate::prefetch::{LoadEvent, PrefetchScheduler};

/// What scrolling near the bottom of the feed asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    Nothing,
    /// The displayed window grew to this many products.
    Grew(usize),
    /// Every fetched product is displayed; the caller should fetch this page
    /// and hand it to [`FeedSession::append_page`].
    FetchPage(u32),
}

/// Result of one [`FeedSession::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub current_changed: Option<usize>,
    pub events_applied: usize,
    pub advanced: Vec<usize>,
}

/// Composition root of a feed: products, viewport, carousels and likes.
///
/// Owns the scheduler's dispatch task for its lifetime and must be created
/// inside a Tokio runtime.
#[derive(Debug)]
pub struct FeedSession {
    cache: MediaCache,
    scheduler: PrefetchScheduler,
    events: mpsc::UnboundedReceiver<LoadEvent>,
    dispatcher: JoinHandle<()>,
    viewport: FeedViewport,
    products: Vec<Product>,
    window: usize,
    display_batch: usize,
    has_more_remote: bool,
    page: u32,
    carousels: BTreeMap<usize, CarouselLoader>,
    autoplay: Option<Duration>,
    likes: LikedProducts,
}

impl FeedSession {
    pub fn new(
        cache: MediaCache,
        config: &FeedConfig,
        viewport_height: f32,
        likes: LikedProducts,
    ) -> Self {
        let (scheduler, events) = PrefetchScheduler::new(cache.clone(), &config.prefetch);
        let dispatcher = scheduler.start();
        let autoplay = config
            .prefetch
            .autoplay
            .then(|| config.prefetch.autoplay_interval());

        Self {
            cache,
            scheduler,
            events,
            dispatcher,
            viewport: FeedViewport::new(viewport_height, &config.prefetch),
            products: Vec::new(),
            window: 0,
            display_batch: config.display_batch.max(1),
            has_more_remote: false,
            page: 0,
            carousels: BTreeMap::new(),
            autoplay,
            likes,
        }
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &PrefetchScheduler {
        &self.scheduler
    }

    pub fn viewport(&self) -> &FeedViewport {
        &self.viewport
    }

    pub fn current(&self) -> usize {
        self.viewport.current()
    }

    pub fn current_product(&self) -> Option<&Product> {
        self.displayed_products().get(self.viewport.current())
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// The products currently laid out in the feed.
    pub fn displayed_products(&self) -> &[Product] {
        &self.products[..self.window]
    }

    pub fn has_more(&self) -> bool {
        self.window < self.products.len() || self.has_more_remote
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn carousel(&self, index: usize) -> Option<&CarouselLoader> {
        self.carousels.get(&index)
    }

    pub fn carousels(&self) -> impl Iterator<Item = &CarouselLoader> {
        self.carousels.values()
    }

    /// Start over with a new product list (new filter, search or category).
    pub fn replace_products(&mut self, page: ProductPage) {
        for carousel in self.carousels.values_mut() {
            carousel.cancel_all(&self.scheduler);
        }
        self.carousels.clear();

        log::info!(
            "[Feed] showing {} products (page {}, more: {})",
            page.products.len(),
            page.page,
            page.has_more
        );

        self.products = page.products;
        self.has_more_remote = page.has_more;
        self.page = page.page;
        self.window = self.products.len().min(self.display_batch);
        self.viewport.reset();
        self.viewport.set_item_count(self.window);
        self.recompute();
    }

    /// Add a fetched page behind the existing products and grow the window.
    pub fn append_page(&mut self, page: ProductPage) {
        log::debug!(
            "[Feed] appending {} products from page {}",
            page.products.len(),
            page.page
        );
        self.products.extend(page.products);
        self.has_more_remote = page.has_more;
        self.page = page.page;
        self.grow_window();
    }

    /// Show the next batch of already fetched products.
    pub fn grow_window(&mut self) -> bool {
        let grown = (self.window + self.display_batch).min(self.products.len());
        if grown == self.window {
            return false;
        }
        self.window = grown;
        self.viewport.set_item_count(grown);
        self.recompute();
        true
    }

    /// Feed a scroll event.
    ///
    /// The current index is recomputed on a later [`tick`](Self::tick), once
    /// the scroll has settled. Scrolling deep enough grows the feed.
    pub fn on_scroll(&mut self, offset: f32, content_height: f32, now: Instant) -> LoadMore {
        self.viewport.on_scroll(offset, now);

        if !self.viewport.should_load_more(offset, content_height) {
            return LoadMore::Nothing;
        }
        if self.grow_window() {
            return LoadMore::Grew(self.window);
        }
        if self.has_more_remote {
            return LoadMore::FetchPage(self.page + 1);
        }
        LoadMore::Nothing
    }

    /// Feed an intersection report for the card at `index`.
    pub fn on_intersection(&mut self, index: usize, ratio: f32) {
        if self.viewport.on_intersection(index, ratio) {
            self.recompute();
        }
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport.set_viewport_height(height);
    }

    /// Advance time: settle scrolling, apply finished loads, run autoplay.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        if let Some(current) = self.viewport.settle(now) {
            report.current_changed = Some(current);
            self.recompute();
        }

        report.events_applied = self.drain_events();

        for (index, carousel) in &mut self.carousels {
            if carousel.tick(now) {
                report.advanced.push(*index);
            }
        }

        report
    }

    /// Apply every completion waiting on the channel.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.handle_event(&event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next completion. The event is not applied; pass it to
    /// [`handle_event`](Self::handle_event).
    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        self.events.recv().await
    }

    pub fn handle_event(&mut self, event: &LoadEvent) -> bool {
        self.carousels
            .get_mut(&event.product_index)
            .is_some_and(|carousel| carousel.on_event(event))
    }

    /// Jump product `product_index`'s carousel to `media_index`.
    pub fn navigate(&mut self, product_index: usize, media_index: usize) -> bool {
        let Some(carousel) = carousel_mut(
            &mut self.carousels,
            &self.products[..self.window],
            product_index,
            self.autoplay,
        ) else {
            return false;
        };
        carousel.navigate(media_index, &self.scheduler, &self.cache)
    }

    pub fn next_slide(&mut self, product_index: usize) -> bool {
        let Some(carousel) = carousel_mut(
            &mut self.carousels,
            &self.products[..self.window],
            product_index,
            self.autoplay,
        ) else {
            return false;
        };
        carousel.next_slide(&self.scheduler, &self.cache)
    }

    pub fn previous_slide(&mut self, product_index: usize) -> bool {
        let Some(carousel) = carousel_mut(
            &mut self.carousels,
            &self.products[..self.window],
            product_index,
            self.autoplay,
        ) else {
            return false;
        };
        carousel.previous_slide(&self.scheduler, &self.cache)
    }

    pub fn likes(&self) -> &LikedProducts {
        &self.likes
    }

    /// Toggle the like on the displayed product at `index`.
    pub fn toggle_like(&mut self, index: usize) -> Result<Option<bool>> {
        let Some(product) = self.displayed_products().get(index) else {
            return Ok(None);
        };
        let id = product.product_id.clone();
        self.likes.toggle(&id).map(Some)
    }

    pub fn liked_products(&self) -> Vec<&Product> {
        self.likes.filter(&self.products)
    }

    /// Push the viewport's flags to every carousel. Products missing from
    /// the plan are switched off.
    fn recompute(&mut self) {
        let plan = self.viewport.plan();

        for (index, carousel) in &mut self.carousels {
            if carousel.flags().is_active() && !plan.iter().any(|(planned, _)| planned == index) {
                carousel.apply(LoadFlags::inactive(), &self.scheduler, &self.cache);
            }
        }

        for (index, flags) in plan {
            let Some(carousel) = carousel_mut(
                &mut self.carousels,
                &self.products[..self.window],
                index,
                self.autoplay,
            ) else {
                continue;
            };
            carousel.apply(flags, &self.scheduler, &self.cache);
        }

        log::trace!(
            "[Feed] current {} in view {:?} scheduler {:?}",
            self.viewport.current(),
            self.viewport.in_view().collect::<Vec<_>>(),
            self.scheduler.snapshot()
        );
    }
}

fn carousel_mut<'a>(
    carousels: &'a mut BTreeMap<usize, CarouselLoader>,
    displayed: &[Product],
    index: usize,
    autoplay: Option<Duration>,
) -> Option<&'a mut CarouselLoader> {
    let product = displayed.get(index)?;
    Some(
        carousels
            .entry(index)
            .or_insert_with(|| CarouselLoader::new(index, product, autoplay)),
    )
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.scheduler.shutdown();
        self.dispatcher.abort();
    }
}
