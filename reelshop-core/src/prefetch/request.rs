use reelshop_model::MediaItem;
use tokio_util::sync::CancellationToken;

use super::tier::LoadTier;
use crate::media::MediaHandle;

/// Identifier of one submitted load. Never reused within a scheduler.
pub type TicketId = u64;

/// Receipt for a submitted load, kept by the requester.
///
/// Cancelling the ticket withdraws the request: it is dropped from the queue
/// if still waiting, and its completion is never reported.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    id: TicketId,
    tier: LoadTier,
    token: CancellationToken,
}

impl LoadTicket {
    pub(crate) fn new(id: TicketId, tier: LoadTier, token: CancellationToken) -> Self {
        Self { id, tier, token }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn tier(&self) -> LoadTier {
        self.tier
    }

    pub(crate) fn set_tier(&mut self, tier: LoadTier) {
        self.tier = tier;
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoadRequest {
    pub ticket: TicketId,
    pub product_index: usize,
    pub media_index: usize,
    pub item: MediaItem,
    pub tier: LoadTier,
    pub token: CancellationToken,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(MediaHandle),
    Failed,
}

/// Completion notice for a load that was not cancelled.
#[derive(Debug, Clone)]
pub struct LoadEvent {
    pub ticket: TicketId,
    pub product_index: usize,
    pub media_index: usize,
    pub url: String,
    pub outcome: LoadOutcome,
}

impl LoadEvent {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Loaded(_))
    }
}
