use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    clients::ReminderSource,
    models::{
        reminder::{DomainEvent, ReminderRegistration},
        retry::RetryConfig,
    },
    utils::retry_with_backoff,
};

/// Client for the integrated-library-system RPC gateway. The reads are
/// idempotent and retried; the reminder-sent marker is written once, since
/// the scheduler accounts for its failure itself.
pub struct IlsGatewayClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl IlsGatewayClient {
    pub fn new(base_url: String, retry_config: RetryConfig) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url = %base_url, "ILS gateway client initialized");

        Ok(Self {
            http_client,
            base_url,
            retry_config,
        })
    }

    async fn get_json<T>(&self, url: String, what: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        retry_with_backoff(&self.retry_config, || {
            let client = self.http_client.clone();
            let url = url.clone();

            async move {
                let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
                let status = response.status();

                if status.is_success() {
                    response
                        .json::<T>()
                        .await
                        .map_err(|e| format!("Failed to parse {} JSON: {}", what, e))
                } else {
                    Err(format!("ILS gateway returned status {}", status))
                }
            }
        })
        .await
        .map_err(|e| anyhow!("ILS gateway request failed: {}", e))
    }
}

#[async_trait]
impl ReminderSource for IlsGatewayClient {
    async fn list_due_reminders(&self) -> Result<Vec<ReminderRegistration>> {
        debug!("Fetching due reminders from ILS gateway");

        self.get_json(
            format!("{}/api/v1/reminders/due", self.base_url),
            "reminder list",
        )
        .await
    }

    async fn lookup_event(&self, event_id: i64) -> Result<DomainEvent> {
        debug!(event_id, "Looking up domain event");

        self.get_json(
            format!("{}/api/v1/events/{}", self.base_url, event_id),
            "domain event",
        )
        .await
    }

    async fn mark_reminder_sent(&self, registration_id: i64) -> Result<()> {
        debug!(registration_id, "Marking reminder as sent");

        let url = format!(
            "{}/api/v1/reminders/{}/sent",
            self.base_url, registration_id
        );

        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| anyhow!("ILS gateway request failed: {}", e))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!(
                "ILS gateway returned status {} marking reminder sent",
                status
            ))
        }
    }
}
