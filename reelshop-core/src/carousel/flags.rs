use crate::prefetch::LoadTier;

/// Position of a product relative to the settled scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FeedRole {
    Current,
    Next,
    #[default]
    Inactive,
}

/// What a carousel is allowed to load right now.
///
/// `load_first` covers the lead media (video plus cover frame, or the first
/// image);
/// `load_rest` covers every other slide and is only granted while the
/// current product is actually in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoadFlags {
    pub role: FeedRole,
    pub load_first: bool,
    pub load_rest: bool,
}

impl LoadFlags {
    pub const fn inactive() -> Self {
        Self {
            role: FeedRole::Inactive,
            load_first: false,
            load_rest: false,
        }
    }

    pub const fn current(in_view: bool) -> Self {
        Self {
            role: FeedRole::Current,
            load_first: true,
            load_rest: in_view,
        }
    }

    /// The next product's remaining media follow the current product's
    /// visibility.
    pub const fn next(current_in_view: bool) -> Self {
        Self {
            role: FeedRole::Next,
            load_first: true,
            load_rest: current_in_view,
        }
    }

    pub fn is_active(&self) -> bool {
        self.load_first || self.load_rest
    }

    pub fn is_current(&self) -> bool {
        self.role == FeedRole::Current
    }

    pub fn first_tier(&self) -> Option<LoadTier> {
        match self.role {
            FeedRole::Current if self.load_first => Some(LoadTier::CurrentLead),
            FeedRole::Next if self.load_first => Some(LoadTier::NextLead),
            _ => None,
        }
    }

    pub fn rest_tier(&self) -> Option<LoadTier> {
        match self.role {
            FeedRole::Current if self.load_rest => Some(LoadTier::CurrentRest),
            FeedRole::Next if self.load_rest => Some(LoadTier::NextRest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_role_and_flags() {
        assert_eq!(LoadFlags::current(false).first_tier(), Some(LoadTier::CurrentLead));
        assert_eq!(LoadFlags::current(false).rest_tier(), None);
        assert_eq!(LoadFlags::current(true).rest_tier(), Some(LoadTier::CurrentRest));
        assert_eq!(LoadFlags::next(false).first_tier(), Some(LoadTier::NextLead));
        assert_eq!(LoadFlags::next(false).rest_tier(), None);
        assert_eq!(LoadFlags::next(true).rest_tier(), Some(LoadTier::NextRest));
        assert_eq!(LoadFlags::inactive().first_tier(), None);
        assert!(!LoadFlags::inactive().is_active());
    }
}
