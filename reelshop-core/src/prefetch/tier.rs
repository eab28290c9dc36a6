use std::time::Duration;

use crate::config::PrefetchConfig;

/// Priority class of a media load.
///
/// Ordered from most to least urgent. The next product always trails the
/// current one: its loads are released only after a short delay so the
/// current product's requests reach the queue first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadTier {
    /// A slide the user navigated to by hand on the current product.
    Manual,
    /// Lead media (video cover or first image) of the current product.
    CurrentLead,
    /// Lead media of the next product.
    NextLead,
    /// Remaining carousel media of the current product.
    CurrentRest,
    /// Remaining carousel media of the next product.
    NextRest,
}

impl LoadTier {
    /// Queue weight; higher is dispatched first.
    pub const fn weight(self) -> u8 {
        match self {
            LoadTier::Manual => 5,
            LoadTier::CurrentLead => 4,
            LoadTier::NextLead => 3,
            LoadTier::CurrentRest => 2,
            LoadTier::NextRest => 1,
        }
    }

    pub const fn is_lead(self) -> bool {
        matches!(self, LoadTier::CurrentLead | LoadTier::NextLead)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LoadTier::Manual => "manual",
            LoadTier::CurrentLead => "current-lead",
            LoadTier::NextLead => "next-lead",
            LoadTier::CurrentRest => "current-rest",
            LoadTier::NextRest => "next-rest",
        }
    }
}

impl std::fmt::Display for LoadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release delays applied before a request enters the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDelays {
    pub next_lead: Duration,
    pub next_rest: Duration,
}

impl TierDelays {
    pub fn from_config(config: &PrefetchConfig) -> Self {
        Self {
            next_lead: config.next_lead_delay(),
            next_rest: config.next_rest_delay(),
        }
    }

    pub fn delay_for(&self, tier: LoadTier) -> Duration {
        match tier {
            LoadTier::NextLead => self.next_lead,
            LoadTier::NextRest => self.next_rest,
            _ => Duration::ZERO,
        }
    }
}

impl Default for TierDelays {
    fn default() -> Self {
        Self::from_config(&PrefetchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_follow_declaration_order() {
        let tiers = [
            LoadTier::Manual,
            LoadTier::CurrentLead,
            LoadTier::NextLead,
            LoadTier::CurrentRest,
            LoadTier::NextRest,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].weight() > pair[1].weight());
        }
    }

    #[test]
    fn only_next_tiers_are_delayed() {
        let delays = TierDelays::default();
        assert_eq!(delays.delay_for(LoadTier::Manual), Duration::ZERO);
        assert_eq!(delays.delay_for(LoadTier::CurrentLead), Duration::ZERO);
        assert_eq!(delays.delay_for(LoadTier::CurrentRest), Duration::ZERO);
        assert_eq!(delays.delay_for(LoadTier::NextLead), Duration::from_millis(50));
        assert_eq!(delays.delay_for(LoadTier::NextRest), Duration::from_millis(100));
    }
}
