//! Server configuration module
//! Handles dynamic configuration parameters for the game session worker

use crate::constants::{
    DEFAULT_BUCKET_CAPACITY, DEFAULT_CONCURRENT_GAME_LIMIT, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_REFILL_INTERVAL_MS,
};
use crate::error::{Result, RustyRooksError};
use std::env;
use std::time::Duration;

/// Worker configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared session cache (redis://...)
    pub redis_url: String,
    /// Message broker (amqp://... or amqps://...)
    pub amqp_url: String,
    /// JWT secret for token validation; required unless anonymous access
    /// is allowed
    pub jwt_secret: Option<String>,
    /// Allow connections without an identity token (security consideration)
    pub allow_anonymous_access: bool,
    /// Cap on simultaneously live games across all workers
    pub concurrent_game_limit: usize,
    /// Admission token bucket capacity
    pub bucket_capacity: u32,
    /// Interval between admission token refills
    pub refill_interval: Duration,
}

impl ServerConfig {
    /// Create a test configuration backed by in-memory services
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            redis_url: "redis://localhost:6379".to_string(),
            amqp_url: "amqp://localhost:5672".to_string(),
            jwt_secret: None,
            allow_anonymous_access: true,
            concurrent_game_limit: 10,
            bucket_capacity: 5,
            refill_interval: Duration::from_millis(10),
        }
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("RUSTY_ROOKS_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("RUSTY_ROOKS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let redis_url = env::var("RUSTY_ROOKS_REDIS_URL")
            .or_else(|_| env::var("REDIS_URL"))
            .map_err(|_| {
                RustyRooksError::ConfigError(
                    "REDIS_URL environment variable is required (shared session cache)"
                        .to_string(),
                )
            })?;

        let amqp_url = env::var("RUSTY_ROOKS_AMQP_URL")
            .or_else(|_| env::var("AMQP_URL"))
            .map_err(|_| {
                RustyRooksError::ConfigError(
                    "AMQP_URL environment variable is required (message broker)".to_string(),
                )
            })?;

        let allow_anonymous_access = env::var("RUSTY_ROOKS_ALLOW_ANONYMOUS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false); // SECURITY: Default to false

        let jwt_secret = env::var("RUSTY_ROOKS_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .ok();

        if jwt_secret.is_none() && !allow_anonymous_access {
            return Err(RustyRooksError::ConfigError(
                "JWT_SECRET is required unless RUSTY_ROOKS_ALLOW_ANONYMOUS is set. \
                 Generate one with: openssl rand -base64 32"
                    .to_string(),
            ));
        }

        if let Some(ref secret) = jwt_secret {
            if secret.len() < 32 {
                return Err(RustyRooksError::ConfigError(
                    "JWT secret must be at least 32 characters long".to_string(),
                ));
            }
        }

        let concurrent_game_limit = env::var("RUSTY_ROOKS_GAME_LIMIT")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(DEFAULT_CONCURRENT_GAME_LIMIT);

        let bucket_capacity = env::var("RUSTY_ROOKS_BUCKET_CAPACITY")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(DEFAULT_BUCKET_CAPACITY);

        let refill_interval_ms = env::var("RUSTY_ROOKS_REFILL_INTERVAL_MS")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(DEFAULT_REFILL_INTERVAL_MS);

        Ok(Self {
            host,
            port,
            redis_url,
            amqp_url,
            jwt_secret,
            allow_anonymous_access,
            concurrent_game_limit,
            bucket_capacity,
            refill_interval: Duration::from_millis(refill_interval_ms),
        })
    }
}
