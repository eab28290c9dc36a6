use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use priority_queue::PriorityQueue;
use reelshop_model::MediaItem;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::request::{LoadEvent, LoadOutcome, LoadRequest, LoadTicket, TicketId};
use super::tier::{LoadTier, TierDelays};
use crate::config::PrefetchConfig;
use crate::media::MediaCache;

/// Queue rank: tier weight first, then submission order within a tier.
type Rank = (u8, Reverse<TicketId>);

fn rank(tier: LoadTier, ticket: TicketId) -> Rank {
    (tier.weight(), Reverse(ticket))
}

#[derive(Debug)]
struct Pending {
    request: LoadRequest,
    queued: bool,
}

struct SchedulerInner {
    cache: MediaCache,
    delays: TierDelays,
    max_concurrent: usize,
    permits: Arc<Semaphore>,
    queue: Mutex<PriorityQueue<TicketId, Rank>>,
    // Submitted but not yet dispatched, whether delayed or queued.
    pending: DashMap<TicketId, Pending>,
    wake: Notify,
    next_ticket: AtomicU64,
    in_flight: AtomicUsize,
    events: mpsc::UnboundedSender<LoadEvent>,
    shutdown: CancellationToken,
}

/// Point-in-time view of the scheduler, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub delayed: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub max_concurrent: usize,
}

/// Priority scheduler sitting between carousels and the media cache.
#[derive(Clone)]
pub struct PrefetchScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for PrefetchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchScheduler")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl PrefetchScheduler {
    /// Create a scheduler and the receiver for its completion events.
    ///
    /// Nothing is dispatched until [`start`](Self::start) is called.
    pub fn new(
        cache: MediaCache,
        config: &PrefetchConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LoadEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let max_concurrent = config.max_concurrent.max(1);

        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                cache,
                delays: TierDelays::from_config(config),
                max_concurrent,
                permits: Arc::new(Semaphore::new(max_concurrent)),
                queue: Mutex::new(PriorityQueue::new()),
                pending: DashMap::new(),
                wake: Notify::new(),
                next_ticket: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                events,
                shutdown: CancellationToken::new(),
            }),
        };

        (scheduler, receiver)
    }

    /// Spawn the dispatch loop on the current runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.dispatch_loop())
    }

    /// Stop dispatching and cancel everything not yet reported.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn cache(&self) -> &MediaCache {
        &self.inner.cache
    }

    /// Submit a load. Requests of the next-product tiers are held back by
    /// their release delay before they compete in the queue.
    pub fn submit(
        &self,
        product_index: usize,
        media_index: usize,
        item: MediaItem,
        tier: LoadTier,
    ) -> LoadTicket {
        let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.inner.shutdown.child_token();

        log::trace!(
            "[Prefetch] submit #{} product {} media {} {} ({})",
            id,
            product_index,
            media_index,
            item.url(),
            tier
        );

        self.inner.pending.insert(
            id,
            Pending {
                request: LoadRequest {
                    ticket: id,
                    product_index,
                    media_index,
                    item,
                    tier,
                    token: token.clone(),
                },
                queued: false,
            },
        );

        let delay = self.inner.delays.delay_for(tier);
        if delay.is_zero() {
            self.inner.enqueue(id);
        } else {
            let inner = Arc::clone(&self.inner);
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => inner.enqueue(id),
                }
            });
        }

        LoadTicket::new(id, tier, token)
    }

    /// Withdraw a load. Safe to call at any point of its life.
    pub fn cancel(&self, ticket: &LoadTicket) {
        ticket.token().cancel();
        if let Some((id, pending)) = self.inner.pending.remove(&ticket.id()) {
            if pending.queued {
                self.inner.queue.lock().remove(&id);
            }
            log::trace!("[Prefetch] cancelled #{} before dispatch", id);
        }
    }

    /// Raise a waiting request to a more urgent tier.
    ///
    /// Returns `false` when the request was already dispatched or the tier
    /// is not an upgrade.
    pub fn promote(&self, ticket: &mut LoadTicket, tier: LoadTier) -> bool {
        if tier.weight() <= ticket.tier().weight() || ticket.is_cancelled() {
            return false;
        }

        let queued = {
            let Some(mut pending) = self.inner.pending.get_mut(&ticket.id()) else {
                return false;
            };
            pending.request.tier = tier;
            pending.queued
        };
        ticket.set_tier(tier);

        if queued {
            self.inner
                .queue
                .lock()
                .change_priority(&ticket.id(), rank(tier, ticket.id()));
            self.inner.wake.notify_one();
        } else if self.inner.delays.delay_for(tier).is_zero() {
            self.inner.enqueue(ticket.id());
        }

        log::trace!("[Prefetch] promoted #{} to {}", ticket.id(), tier);
        true
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let queued = self.inner.queue.lock().len();
        SchedulerSnapshot {
            delayed: self.inner.pending.len().saturating_sub(queued),
            queued,
            in_flight: self.inner.in_flight.load(Ordering::Relaxed),
            max_concurrent: self.inner.max_concurrent,
        }
    }
}

impl SchedulerInner {
    fn enqueue(&self, id: TicketId) {
        let tier = {
            let Some(mut pending) = self.pending.get_mut(&id) else {
                return;
            };
            if pending.queued {
                return;
            }
            if pending.request.token.is_cancelled() {
                drop(pending);
                self.pending.remove(&id);
                return;
            }
            pending.queued = true;
            pending.request.tier
        };

        self.queue.lock().push(id, rank(tier, id));
        self.wake.notify_one();
    }

    fn pop_next(&self) -> Option<LoadRequest> {
        loop {
            let (id, _) = self.queue.lock().pop()?;
            let Some((_, pending)) = self.pending.remove(&id) else {
                continue;
            };
            if pending.request.token.is_cancelled() {
                log::trace!("[Prefetch] skipping cancelled #{}", id);
                continue;
            }
            return Some(pending.request);
        }
    }

    async fn dispatch_loop(self: Arc<Self>) {
        log::debug!(
            "[Prefetch] dispatcher started (max {} concurrent)",
            self.max_concurrent
        );

        loop {
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let request = loop {
                if let Some(request) = self.pop_next() {
                    break Some(request);
                }
                tokio::select! {
                    _ = self.shutdown.cancelled() => break None,
                    _ = self.wake.notified() => {}
                }
            };
            let Some(request) = request else {
                break;
            };

            self.in_flight.fetch_add(1, Ordering::Relaxed);
            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                inner.run(request).await;
                inner.in_flight.fetch_sub(1, Ordering::Relaxed);
                drop(permit);
            });
        }

        log::debug!("[Prefetch] dispatcher stopped");
    }

    async fn run(&self, request: LoadRequest) {
        log::trace!(
            "[Prefetch] dispatch #{} {} ({})",
            request.ticket,
            request.item.url(),
            request.tier
        );

        let handle = tokio::select! {
            biased;
            _ = request.token.cancelled() => None,
            handle = self.cache.preload(&request.item) => Some(handle),
        };

        // The cache keeps any result that arrives after cancellation.
        let Some(handle) = handle else {
            log::trace!("[Prefetch] #{} cancelled in flight", request.ticket);
            return;
        };
        if request.token.is_cancelled() {
            return;
        }

        let outcome = match handle {
            Some(handle) => LoadOutcome::Loaded(handle),
            None => LoadOutcome::Failed,
        };
        let event = LoadEvent {
            ticket: request.ticket,
            product_index: request.product_index,
            media_index: request.media_index,
            url: request.item.url().to_string(),
            outcome,
        };

        if self.events.send(event).is_err() {
            log::trace!("[Prefetch] event receiver dropped");
        }
    }
}
