use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    clients::{SendProvider, template::RenderedNotice},
    models::retry::RetryConfig,
    utils::retry_with_backoff,
};

#[derive(Debug, Clone, Serialize)]
struct MailPayload {
    to: String,
    from: String,
    subject: String,
    html: String,
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct SmsPayload {
    to: String,
    body: String,
}

/// Email relay client. One worker-level delivery attempt maps to one call
/// here; transport-level retries stay inside this client.
pub struct MailGatewayClient {
    http_client: Client,
    base_url: String,
    sender: String,
    retry_config: RetryConfig,
}

impl MailGatewayClient {
    pub fn new(base_url: String, sender: String, retry_config: RetryConfig) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url = %base_url, "Mail gateway client initialized");

        Ok(Self {
            http_client,
            base_url,
            sender,
            retry_config,
        })
    }
}

#[async_trait]
impl SendProvider for MailGatewayClient {
    async fn send(&self, recipient: &str, notice: &RenderedNotice) -> Result<()> {
        debug!(recipient, subject = %notice.subject, "Sending email notice");

        let payload = MailPayload {
            to: recipient.to_string(),
            from: self.sender.clone(),
            subject: notice.subject.clone(),
            html: notice.body_html.clone(),
            text: notice.body_text.clone(),
        };

        let url = format!("{}/api/v1/messages", self.base_url);

        post_with_retry(self.http_client.clone(), &self.retry_config, url, payload)
            .await
            .map_err(|e| anyhow!("Mail gateway send failed: {}", e))
    }
}

/// SMS gateway client. Text body only; subjects and HTML have no place on
/// this transport.
pub struct SmsGatewayClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl SmsGatewayClient {
    pub fn new(base_url: String, retry_config: RetryConfig) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url = %base_url, "SMS gateway client initialized");

        Ok(Self {
            http_client,
            base_url,
            retry_config,
        })
    }
}

#[async_trait]
impl SendProvider for SmsGatewayClient {
    async fn send(&self, recipient: &str, notice: &RenderedNotice) -> Result<()> {
        debug!(recipient, "Sending SMS notice");

        let payload = SmsPayload {
            to: recipient.to_string(),
            body: notice.body_text.clone(),
        };

        let url = format!("{}/api/v1/sms", self.base_url);

        post_with_retry(self.http_client.clone(), &self.retry_config, url, payload)
            .await
            .map_err(|e| anyhow!("SMS gateway send failed: {}", e))
    }
}

async fn post_with_retry<P>(
    http_client: Client,
    retry_config: &RetryConfig,
    url: String,
    payload: P,
) -> Result<(), String>
where
    P: Serialize + Clone + Send + Sync,
{
    retry_with_backoff(retry_config, || {
        let client = http_client.clone();
        let url = url.clone();
        let payload = payload.clone();

        async move {
            let response = client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let status = response.status();

            if status.is_success() {
                Ok(())
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(format!("Gateway returned status {}: {}", status, body))
            }
        }
    })
    .await
}
