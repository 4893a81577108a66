//! Lobby configuration.

use std::time::Duration;

use tracing::warn;

/// Tunables for the lobby coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyConfig {
    /// How long a disconnected member keeps their seat before they are
    /// removed as if they had left. Zero removes them immediately.
    pub grace_period: Duration,

    /// Longest accepted display name, in characters.
    pub max_display_name: usize,

    /// Longest accepted room name, in characters.
    pub max_room_name: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(120),
            max_display_name: 32,
            max_room_name: 64,
        }
    }
}

impl LobbyConfig {
    /// Upper bound on the grace period.
    pub const MAX_GRACE: Duration = Duration::from_secs(3600);

    /// Clamps out-of-range values, logging each change.
    pub fn validated(mut self) -> Self {
        if self.grace_period > Self::MAX_GRACE {
            warn!(
                requested_secs = self.grace_period.as_secs(),
                max_secs = Self::MAX_GRACE.as_secs(),
                "grace_period exceeds maximum, clamping"
            );
            self.grace_period = Self::MAX_GRACE;
        }
        if self.max_display_name == 0 {
            warn!("max_display_name of 0 would reject every name, using 1");
            self.max_display_name = 1;
        }
        if self.max_room_name == 0 {
            warn!("max_room_name of 0 would reject every name, using 1");
            self.max_room_name = 1;
        }
        self
    }

    /// Trims `name` and checks it against `max` characters.
    pub(crate) fn check_name(what: &str, name: &str, max: usize) -> Result<String, String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(format!("{what} must not be empty"));
        }
        let len = trimmed.chars().count();
        if len > max {
            return Err(format!("{what} is {len} characters, the limit is {max}"));
        }
        Ok(trimmed.to_string())
    }
}
