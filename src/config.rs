//! Application-level configuration loading, including the realtime tuning knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIPFLOW_BACK_CONFIG_PATH";
/// Quiet period after the last mutation before a plan is flushed to storage.
const DEFAULT_FLUSH_DELAY_SECS: u64 = 20;
/// How long a freshly upgraded socket may take to send its join handshake.
const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 10;
/// Capacity of each trip room's broadcast channel.
const DEFAULT_ROOM_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    flush_delay: Duration,
    join_timeout: Duration,
    room_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        flush_delay_secs = app_config.flush_delay.as_secs(),
                        "loaded realtime configuration"
                    );
                    app_config
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
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
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

    /// Quiet period the debounce scheduler waits for before persisting a plan.
    pub fn flush_delay(&self) -> Duration {
        self.flush_delay
    }

    /// Deadline for the first frame of a plan socket to arrive.
    pub fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    /// Broadcast channel capacity used for each trip room.
    pub fn room_capacity(&self) -> usize {
        self.room_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_secs(DEFAULT_FLUSH_DELAY_SECS),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
            room_capacity: DEFAULT_ROOM_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    flush_delay_seconds: Option<u64>,
    join_timeout_seconds: Option<u64>,
    room_channel_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            flush_delay: value
                .flush_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.flush_delay),
            join_timeout: value
                .join_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.join_timeout),
            room_capacity: value.room_channel_capacity.unwrap_or(defaults.room_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = AppConfig::default();
        assert_eq!(config.flush_delay(), Duration::from_secs(20));
        assert_eq!(config.join_timeout(), Duration::from_secs(10));
        assert_eq!(config.room_capacity(), 32);
    }

    #[test]
    fn raw_config_overrides_only_present_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "flush_delay_seconds": 5 }"#).expect("valid raw config");
        let config: AppConfig = raw.into();
        assert_eq!(config.flush_delay(), Duration::from_secs(5));
        assert_eq!(config.join_timeout(), Duration::from_secs(10));
        assert_eq!(config.room_capacity(), 32);
    }
}
