//! Server configuration loaded from a JSON file.
//!
//! Every field has a default, so a partial file only overrides what it
//! names. A missing file is normal and yields the defaults; a malformed one
//! is logged and also yields the defaults.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use roomsync_dispatch::{ConfirmationMode, DispatchConfig};
use roomsync_lobby::LobbyConfig;
use roomsync_store::StoreConfig;
use serde::Deserialize;
use tracing::{info, warn};

/// Where the server looks for its configuration by default.
pub const DEFAULT_CONFIG_PATH: &str = "config/roomsync.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "ROOMSYNC_CONFIG_PATH";

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub server: ServerSettings,
    pub lobby: LobbySettings,
    pub store: StoreSettings,
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// A connection that sends nothing for this long is closed.
    pub idle_timeout_secs: u64,
    /// Time allowed between accept and the handshake frame.
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LobbySettings {
    pub grace_period_secs: u64,
    pub max_display_name: usize,
    pub max_room_name: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub min_capacity: usize,
    pub max_capacity: usize,
    pub default_capacity: usize,
}

/// Confirmation mode as spelled in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    #[default]
    Implicit,
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_multiplier: u32,
    pub backoff_cap_ms: u64,
    pub retry_jitter_ms: u64,
    pub confirm_timeout_ms: u64,
    pub confirmation: Confirmation,
    pub pending_expiry_secs: u64,
    pub janitor_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 60,
            handshake_timeout_secs: 5,
        }
    }
}

impl Default for LobbySettings {
    fn default() -> Self {
        let lobby = LobbyConfig::default();
        Self {
            grace_period_secs: lobby.grace_period.as_secs(),
            max_display_name: lobby.max_display_name,
            max_room_name: lobby.max_room_name,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            min_capacity: store.min_capacity,
            max_capacity: store.max_capacity,
            default_capacity: store.default_capacity,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            max_retries: dispatch.max_retries,
            backoff_base_ms: dispatch.backoff_base.as_millis() as u64,
            backoff_multiplier: dispatch.backoff_multiplier,
            backoff_cap_ms: dispatch.backoff_cap.as_millis() as u64,
            retry_jitter_ms: dispatch.retry_jitter.as_millis() as u64,
            confirm_timeout_ms: dispatch.confirm_timeout.as_millis() as u64,
            confirmation: Confirmation::Implicit,
            pending_expiry_secs: dispatch.pending_expiry.as_secs(),
            janitor_interval_secs: dispatch.janitor_interval.as_secs(),
        }
    }
}

impl SyncConfig {
    /// Loads from `$ROOMSYNC_CONFIG_PATH`, or [`DEFAULT_CONFIG_PATH`] when
    /// the variable is unset.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Loads from `path`, falling back to defaults if the file is missing
    /// or can't be parsed.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), bind = %config.server.bind_addr, "loaded config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found; using built-in defaults");
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.server.idle_timeout_secs.max(1))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.server.handshake_timeout_secs.max(1))
    }

    pub fn lobby_config(&self) -> LobbyConfig {
        LobbyConfig {
            grace_period: Duration::from_secs(self.lobby.grace_period_secs),
            max_display_name: self.lobby.max_display_name,
            max_room_name: self.lobby.max_room_name,
        }
        .validated()
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            min_capacity: self.store.min_capacity,
            max_capacity: self.store.max_capacity,
            default_capacity: self.store.default_capacity,
        }
        .validated()
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        let d = &self.dispatch;
        DispatchConfig {
            max_retries: d.max_retries,
            backoff_base: Duration::from_millis(d.backoff_base_ms),
            backoff_multiplier: d.backoff_multiplier,
            backoff_cap: Duration::from_millis(d.backoff_cap_ms),
            retry_jitter: Duration::from_millis(d.retry_jitter_ms),
            confirm_timeout: Duration::from_millis(d.confirm_timeout_ms),
            confirmation: match d.confirmation {
                Confirmation::Implicit => ConfirmationMode::Implicit,
                Confirmation::Explicit => ConfirmationMode::Explicit,
            },
            pending_expiry: Duration::from_secs(d.pending_expiry_secs),
            janitor_interval: Duration::from_secs(d.janitor_interval_secs),
        }
        .validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_layer_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.lobby_config(), LobbyConfig::default());
        assert_eq!(config.store_config(), StoreConfig::default());

        let dispatch = config.dispatch_config();
        assert_eq!(dispatch.max_retries, 3);
        assert_eq!(dispatch.backoff_base, Duration::from_secs(1));
        assert_eq!(dispatch.backoff_cap, Duration::from_secs(8));
        assert_eq!(dispatch.confirm_timeout, Duration::from_secs(5));
        assert_eq!(dispatch.confirmation, ConfirmationMode::Implicit);
    }

    #[test]
    fn test_deserialize_partial_file_keeps_other_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"dispatch":{"max_retries":5,"confirmation":"explicit"},"lobby":{"grace_period_secs":30}}"#,
        )
        .unwrap();
        assert_eq!(config.dispatch.max_retries, 5);
        assert_eq!(config.dispatch_config().confirmation, ConfirmationMode::Explicit);
        assert_eq!(config.lobby_config().grace_period, Duration::from_secs(30));
        assert_eq!(config.server, ServerSettings::default());
        assert_eq!(config.store, StoreSettings::default());
    }

    #[test]
    fn test_dispatch_config_clamps_out_of_range_values() {
        let mut config = SyncConfig::default();
        config.dispatch.max_retries = 99;
        config.dispatch.backoff_cap_ms = 10;
        let dispatch = config.dispatch_config();
        assert_eq!(dispatch.max_retries, DispatchConfig::MAX_RETRIES);
        assert_eq!(dispatch.backoff_cap, dispatch.backoff_base);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = SyncConfig::load_from(Path::new("/nonexistent/roomsync.json"));
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_load_from_malformed_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("roomsync-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let config = SyncConfig::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_load_from_valid_file_overrides_bind_addr() {
        let path = std::env::temp_dir().join(format!("roomsync-ok-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"server":{"bind_addr":"0.0.0.0:9000"}}"#).unwrap();
        let config = SyncConfig::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.server.idle_timeout_secs, 60);
    }
}
