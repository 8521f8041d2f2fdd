//! Slack policy shared by every array indexed by global index.

use serde::{Deserialize, Serialize};

/// Growth and shrink policy for index-keyed arrays.
///
/// Arrays grow to `index + 1 + slack` and are only shrunk once the unused
/// tail exceeds `slack + shrink_margin`, so a population oscillating around
/// one size never reallocates on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexReservoir {
    /// Spare slots appended on every growth.
    pub slack: usize,
    /// Extra unused slots tolerated beyond `slack` before shrinking.
    pub shrink_margin: usize,
}

impl Default for IndexReservoir {
    fn default() -> Self {
        Self {
            slack: 30,
            shrink_margin: 30,
        }
    }
}

impl IndexReservoir {
    #[must_use]
    pub const fn new(slack: usize, shrink_margin: usize) -> Self {
        Self {
            slack,
            shrink_margin,
        }
    }

    /// Length to grow to so that `index` fits.
    #[must_use]
    pub const fn grown_len(&self, index: usize) -> usize {
        index + 1 + self.slack
    }

    /// Preferred length for an index space whose highest index is `max_index`.
    #[must_use]
    pub const fn target_len(&self, max_index: Option<usize>) -> usize {
        match max_index {
            Some(max) => self.grown_len(max),
            None => self.slack,
        }
    }

    /// Whether an array of `current` slots should be reallocated for `max_index`.
    #[must_use]
    pub const fn needs_resize(&self, current: usize, max_index: Option<usize>) -> bool {
        let needed = match max_index {
            Some(max) => max + 1,
            None => 0,
        };
        current < needed || current > needed + self.slack + self.shrink_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_slack() {
        let reservoir = IndexReservoir::default();
        assert_eq!(reservoir.slack, 30);
        assert_eq!(reservoir.grown_len(9), 40);
        assert_eq!(reservoir.target_len(None), 30);
    }

    #[test]
    fn resize_only_outside_hysteresis_band() {
        let reservoir = IndexReservoir::new(4, 2);
        assert!(reservoir.needs_resize(5, Some(5)));
        assert!(!reservoir.needs_resize(6, Some(5)));
        assert!(!reservoir.needs_resize(12, Some(5)));
        assert!(reservoir.needs_resize(13, Some(5)));
        assert!(!reservoir.needs_resize(6, None));
        assert!(reservoir.needs_resize(7, None));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let reservoir: IndexReservoir = serde_json::from_str(r#"{"slack": 8}"#).expect("json");
        assert_eq!(reservoir, IndexReservoir::new(8, 30));
    }
}
