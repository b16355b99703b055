//! Application configuration (§6.4).
//!
//! Loaded from environment variables with sensible defaults; nothing
//! here is required to be present except `DATABASE_URL`,
//! and even that is optional — its absence degrades the persistence layer
//! to the in-memory adapter rather than refusing to start, mirroring the
//! server's general "missing service -> degrade, don't crash" posture.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Op-buffer size that triggers a checkpoint.
    pub snapshot_op_threshold: usize,
    /// Periodic checkpoint cadence for active rooms.
    pub snapshot_interval: Duration,
    /// Client ping cadence (advisory; the server does not enforce it).
    pub heartbeat_interval: Duration,
    /// Server-side stale-session cutoff.
    pub heartbeat_timeout: Duration,
    /// Maximum time from connect to `join_room`.
    pub join_deadline: Duration,
    /// Client cursor-emit minimum interval (advisory).
    pub cursor_throttle: Duration,
    /// Permitted cross-origin for the transport handshake, if any.
    pub client_origin: Option<String>,
    /// Storage backend connection string.
    pub database_url: Option<String>,
    /// Port the websocket/HTTP server binds on.
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_op_threshold: 100,
            snapshot_interval: Duration::from_millis(60_000),
            heartbeat_interval: Duration::from_millis(30_000),
            heartbeat_timeout: Duration::from_millis(90_000),
            join_deadline: Duration::from_millis(10_000),
            cursor_throttle: Duration::from_millis(100),
            client_origin: None,
            database_url: None,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            snapshot_op_threshold: env_usize("SNAPSHOT_OP_THRESHOLD", defaults.snapshot_op_threshold),
            snapshot_interval: env_duration_ms("SNAPSHOT_INTERVAL_MS", defaults.snapshot_interval),
            heartbeat_interval: env_duration_ms("HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval),
            heartbeat_timeout: env_duration_ms("HEARTBEAT_TIMEOUT_MS", defaults.heartbeat_timeout),
            join_deadline: env_duration_ms("JOIN_DEADLINE_MS", defaults.join_deadline),
            cursor_throttle: env_duration_ms("CURSOR_THROTTLE_MS", defaults.cursor_throttle),
            client_origin: std::env::var("CLIENT_ORIGIN").ok(),
            database_url: std::env::var("DATABASE_URL").ok(),
            server_port: env_usize("SERVER_PORT", defaults.server_port as usize) as u16,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_op_threshold == 0 {
            return Err(ConfigError::InvalidValue("SNAPSHOT_OP_THRESHOLD must be > 0"));
        }
        Ok(())
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value: {0}")]
    InvalidValue(&'static str),
}
