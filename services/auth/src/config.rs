//! Service configuration loaded from `AUTH_*` environment variables

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Authentication service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Lifetime of a session, fixed at login (default: 7 days)
    pub session_ttl_seconds: u64,
    /// Budget for a single store operation
    pub store_timeout_seconds: u64,
    /// Budget for one background last-activity update
    pub activity_timeout_seconds: u64,
    /// Maximum concurrent last-activity updates
    pub activity_workers: usize,
    /// Pending last-activity updates held before new ones are dropped
    pub activity_queue_capacity: usize,
    /// Add the `Secure` attribute to both cookies
    pub cookie_secure: bool,
}

impl AuthConfig {
    /// Create a new AuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_BIND_ADDRESS` (default: `0.0.0.0:3000`)
    /// - `AUTH_SESSION_TTL_SECONDS` (default: 604800)
    /// - `AUTH_STORE_TIMEOUT_SECONDS` (default: 5)
    /// - `AUTH_ACTIVITY_TIMEOUT_SECONDS` (default: 5)
    /// - `AUTH_ACTIVITY_WORKERS` (default: 4)
    /// - `AUTH_ACTIVITY_QUEUE_CAPACITY` (default: 1024)
    /// - `AUTH_COOKIE_SECURE` (default: false)
    pub fn from_env() -> Result<Self> {
        let config: AuthConfig = Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("session_ttl_seconds", 604_800_i64)?
            .set_default("store_timeout_seconds", 5_i64)?
            .set_default("activity_timeout_seconds", 5_i64)?
            .set_default("activity_workers", 4_i64)?
            .set_default("activity_queue_capacity", 1024_i64)?
            .set_default("cookie_secure", false)?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()
            .context("failed to read AUTH_* configuration")?
            .try_deserialize()
            .context("invalid AUTH_* configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.session_ttl_seconds > 0, "AUTH_SESSION_TTL_SECONDS must be positive");
        anyhow::ensure!(self.store_timeout_seconds > 0, "AUTH_STORE_TIMEOUT_SECONDS must be positive");
        anyhow::ensure!(
            self.activity_timeout_seconds > 0,
            "AUTH_ACTIVITY_TIMEOUT_SECONDS must be positive"
        );
        anyhow::ensure!(self.activity_workers > 0, "AUTH_ACTIVITY_WORKERS must be positive");
        anyhow::ensure!(
            self.activity_queue_capacity > 0,
            "AUTH_ACTIVITY_QUEUE_CAPACITY must be positive"
        );
        Ok(())
    }

    pub fn session_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.session_ttl_seconds as i64)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            session_ttl_seconds: 604_800,
            store_timeout_seconds: 5,
            activity_timeout_seconds: 5,
            activity_workers: 4,
            activity_queue_capacity: 1024,
            cookie_secure: false,
        }
    }
}
