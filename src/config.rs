use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    /// "production" enables the scheduler's pre-shared secret requirement.
    pub environment: String,

    pub database_url: String,

    pub ils_gateway_url: String,
    pub mail_gateway_url: String,
    pub sms_gateway_url: String,

    pub library_name: String,
    pub library_email: String,

    /// Pre-shared secret required to trigger the reminder scheduler in
    /// production. Optional everywhere else.
    #[serde(default)]
    pub scheduler_secret: Option<String>,

    #[serde(default = "default_delivery_batch_limit")]
    pub delivery_batch_limit: u32,

    #[serde(default = "default_secret_ttl_seconds")]
    pub secret_ttl_seconds: u64,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,

    pub server_port: u16,
}

fn default_delivery_batch_limit() -> u32 {
    50
}

fn default_secret_ttl_seconds() -> u64 {
    300
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    5_000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }
}
