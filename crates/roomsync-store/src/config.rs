//! Store configuration.

use roomsync_protocol::{MAX_CAPACITY, MIN_CAPACITY};

/// Capacity bounds enforced when rooms are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub min_capacity: usize,
    pub max_capacity: usize,
    /// Used when a create request doesn't name a capacity.
    pub default_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_capacity: MIN_CAPACITY,
            max_capacity: MAX_CAPACITY,
            default_capacity: 4,
        }
    }
}

impl StoreConfig {
    /// Clamps the bounds into `MIN_CAPACITY..=MAX_CAPACITY` and keeps them
    /// ordered, logging anything it had to change.
    pub fn validated(mut self) -> Self {
        let min = self.min_capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        if min != self.min_capacity {
            tracing::warn!(requested = self.min_capacity, clamped = min, "min_capacity out of range");
            self.min_capacity = min;
        }
        let max = self.max_capacity.clamp(self.min_capacity, MAX_CAPACITY);
        if max != self.max_capacity {
            tracing::warn!(requested = self.max_capacity, clamped = max, "max_capacity out of range");
            self.max_capacity = max;
        }
        let default = self
            .default_capacity
            .clamp(self.min_capacity, self.max_capacity);
        if default != self.default_capacity {
            tracing::warn!(
                requested = self.default_capacity,
                clamped = default,
                "default_capacity outside bounds"
            );
            self.default_capacity = default;
        }
        self
    }

    /// Returns `true` if `capacity` is allowed.
    pub fn accepts(&self, capacity: usize) -> bool {
        (self.min_capacity..=self.max_capacity).contains(&capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default_is_valid() {
        let config = StoreConfig::default();
        assert_eq!(config.clone().validated(), config);
        assert!(config.accepts(2));
        assert!(config.accepts(6));
        assert!(!config.accepts(7));
    }

    #[test]
    fn test_store_config_validated_clamps_bounds() {
        let config = StoreConfig {
            min_capacity: 0,
            max_capacity: 12,
            default_capacity: 9,
        }
        .validated();
        assert_eq!(config.min_capacity, MIN_CAPACITY);
        assert_eq!(config.max_capacity, MAX_CAPACITY);
        assert_eq!(config.default_capacity, MAX_CAPACITY);
    }

    #[test]
    fn test_store_config_validated_keeps_min_below_max() {
        let config = StoreConfig {
            min_capacity: 5,
            max_capacity: 3,
            default_capacity: 4,
        }
        .validated();
        assert_eq!(config.max_capacity, 5);
        assert_eq!(config.default_capacity, 5);
    }
}
