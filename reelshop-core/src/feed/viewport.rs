use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::carousel::LoadFlags;
use crate::config::PrefetchConfig;

/// Scroll and visibility state of the vertical feed.
///
/// Scroll offsets are debounced: the current index is only recomputed once
/// no scroll event has arrived for the settle period. Visibility comes from
/// intersection ratios reported per card.
#[derive(Debug, Clone)]
pub struct FeedViewport {
    viewport_height: f32,
    item_count: usize,
    current: usize,
    pending_scroll: Option<(f32, Instant)>,
    settle: Duration,
    in_view: BTreeSet<usize>,
    in_view_threshold: f32,
    load_more_threshold: f32,
}

impl FeedViewport {
    pub fn new(viewport_height: f32, config: &PrefetchConfig) -> Self {
        Self {
            viewport_height: viewport_height.max(1.0),
            item_count: 0,
            current: 0,
            pending_scroll: None,
            settle: config.scroll_settle(),
            in_view: BTreeSet::new(),
            in_view_threshold: config.in_view_threshold,
            load_more_threshold: config.load_more_threshold,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn next(&self) -> Option<usize> {
        let next = self.current + 1;
        (next < self.item_count).then_some(next)
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(1.0);
    }

    /// Update the number of cards. Out-of-range visibility is dropped and the
    /// current index is clamped.
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        self.in_view.retain(|index| *index < count);
        if count == 0 {
            self.current = 0;
        } else if self.current >= count {
            self.current = count - 1;
        }
    }

    /// Back to the top with nothing in view, as after a new product list.
    pub fn reset(&mut self) {
        self.current = 0;
        self.pending_scroll = None;
        self.in_view.clear();
    }

    /// Record a scroll event. Only the latest offset is kept.
    pub fn on_scroll(&mut self, offset: f32, now: Instant) {
        self.pending_scroll = Some((offset, now));
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.pending_scroll.is_some()
    }

    /// Recompute the current index once scrolling has been quiet long enough.
    ///
    /// Returns the new index when it changed.
    pub fn settle(&mut self, now: Instant) -> Option<usize> {
        let (offset, at) = self.pending_scroll?;
        if now.saturating_duration_since(at) < self.settle {
            return None;
        }
        self.pending_scroll = None;

        let index = (offset.max(0.0) / self.viewport_height).round() as usize;
        if index == self.current || index >= self.item_count {
            return None;
        }

        log::debug!(
            "[Viewport] current {} -> {} (offset {:.0})",
            self.current,
            index,
            offset
        );
        self.current = index;
        Some(index)
    }

    /// Apply an intersection report for card `index`.
    ///
    /// Crossing the threshold makes the card the only one in view; dropping
    /// below removes it. Returns `true` if the in-view set changed.
    pub fn on_intersection(&mut self, index: usize, ratio: f32) -> bool {
        if index >= self.item_count {
            return false;
        }

        if ratio >= self.in_view_threshold {
            if self.in_view.len() == 1 && self.in_view.contains(&index) {
                return false;
            }
            self.in_view.clear();
            self.in_view.insert(index);
            true
        } else {
            self.in_view.remove(&index)
        }
    }

    pub fn is_in_view(&self, index: usize) -> bool {
        self.in_view.contains(&index)
    }

    pub fn in_view(&self) -> impl Iterator<Item = usize> + '_ {
        self.in_view.iter().copied()
    }

    pub fn flags_for(&self, index: usize) -> LoadFlags {
        if index >= self.item_count {
            return LoadFlags::inactive();
        }
        let current_in_view = self.is_in_view(self.current);
        if index == self.current {
            LoadFlags::current(current_in_view)
        } else if Some(index) == self.next() {
            LoadFlags::next(current_in_view)
        } else {
            LoadFlags::inactive()
        }
    }

    /// Flags for every product that may load anything. Products not listed
    /// are inactive.
    pub fn plan(&self) -> Vec<(usize, LoadFlags)> {
        if self.item_count == 0 {
            return Vec::new();
        }
        std::iter::once(self.current)
            .chain(self.next())
            .map(|index| (index, self.flags_for(index)))
            .collect()
    }

    /// Whether the scroll depth warrants showing more cards.
    pub fn should_load_more(&self, offset: f32, content_height: f32) -> bool {
        if content_height <= 0.0 {
            return false;
        }
        (offset + self.viewport_height) / content_height > self.load_more_threshold
    }
}
