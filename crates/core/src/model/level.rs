use serde::Serialize;
use std::fmt;

/// Canonical level labels, indexed by `tier - 1`.
///
/// Exercise documents carry the label, progress documents carry the tier.
pub const LEVEL_LABELS: [&str; 5] = ["A1", "A2", "B1", "B2", "C1"];

/// Integer proficiency rank. Always `>= 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LevelTier(u32);

impl LevelTier {
    pub const FIRST: Self = Self(1);

    /// Creates a tier, clamping `0` up to the first tier.
    #[must_use]
    pub fn new(tier: u32) -> Self {
        Self(tier.max(1))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Label used to query the catalog.
    ///
    /// Tiers past the end of [`LEVEL_LABELS`] fall back to the first label.
    #[must_use]
    pub fn label(self) -> &'static str {
        usize::try_from(self.0)
            .ok()
            .and_then(|tier| tier.checked_sub(1))
            .and_then(|index| LEVEL_LABELS.get(index))
            .copied()
            .unwrap_or(LEVEL_LABELS[0])
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for LevelTier {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Debug for LevelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LevelTier({})", self.0)
    }
}

impl fmt::Display for LevelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_table() {
        let labels: Vec<_> = (1..=5).map(|t| LevelTier::new(t).label()).collect();
        assert_eq!(labels, LEVEL_LABELS);
    }

    #[test]
    fn unknown_tier_falls_back_to_first_label() {
        assert_eq!(LevelTier::new(6).label(), "A1");
        assert_eq!(LevelTier::new(u32::MAX).label(), "A1");
    }

    #[test]
    fn zero_clamps_to_first_tier() {
        assert_eq!(LevelTier::new(0), LevelTier::FIRST);
    }

    #[test]
    fn next_increments_by_one() {
        assert_eq!(LevelTier::new(2).next().value(), 3);
        assert_eq!(LevelTier::new(u32::MAX).next().value(), u32::MAX);
    }
}
