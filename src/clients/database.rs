use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    clients::{NotificationStore, provider_for_channel},
    models::{
        delivery::{DeliveryAttempt, DeliveryStatus},
        notice::NotificationEvent,
    },
};

pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection task ended");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    fn delivery_from_row(row: &Row) -> DeliveryAttempt {
        let status: String = row.get("status");

        DeliveryAttempt {
            id: row.get("id"),
            event_id: row.get("event_id"),
            provider: row.get("provider"),
            status: DeliveryStatus::from_string(&status),
            last_error: row.get("last_error"),
            attempted_at: row.get("attempted_at"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl NotificationStore for DatabaseClient {
    async fn insert_event(&self, event: &NotificationEvent) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO notification_events (
                    id,
                    channel,
                    notice_type,
                    recipient,
                    context,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &event.id,
                    &event.channel,
                    &event.notice_type,
                    &event.recipient,
                    &event.context,
                    &event.created_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(error = %e, event_id = %event.id, "Failed to insert notification event");
                anyhow!("Event insert failed: {}", e)
            })?;

        debug!(event_id = %event.id, channel = %event.channel, "Notification event recorded");

        Ok(())
    }

    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<NotificationEvent>> {
        let row = self
            .client
            .query_opt(
                r#"
                SELECT id, channel, notice_type, recipient, context, created_at
                FROM notification_events
                WHERE id = $1
                "#,
                &[&event_id],
            )
            .await
            .map_err(|e| anyhow!("Event lookup failed: {}", e))?;

        Ok(row.map(|row| NotificationEvent {
            id: row.get("id"),
            channel: row.get("channel"),
            notice_type: row.get("notice_type"),
            recipient: row.get("recipient"),
            context: row.get("context"),
            created_at: row.get("created_at"),
        }))
    }

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO deliveries (
                    id,
                    event_id,
                    provider,
                    status,
                    last_error,
                    attempted_at,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
                &[
                    &delivery.id,
                    &delivery.event_id,
                    &delivery.provider,
                    &delivery.status.as_str(),
                    &delivery.last_error,
                    &delivery.attempted_at,
                    &delivery.created_at,
                ],
            )
            .await
            .map_err(|e| anyhow!("Delivery insert failed: {}", e))?;

        Ok(())
    }

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<DeliveryAttempt>> {
        let rows = self
            .client
            .query(
                r#"
                SELECT id, event_id, provider, status, last_error, attempted_at, created_at
                FROM deliveries
                WHERE status = 'pending'
                ORDER BY created_at ASC, id ASC
                LIMIT $1
                "#,
                &[&(limit as i64)],
            )
            .await
            .map_err(|e| anyhow!("Pending delivery fetch failed: {}", e))?;

        Ok(rows.iter().map(Self::delivery_from_row).collect())
    }

    async fn mark_sent(&self, delivery_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let updated = self
            .client
            .execute(
                r#"
                UPDATE deliveries
                SET status = 'sent', last_error = NULL, attempted_at = $2
                WHERE id = $1 AND status = 'pending'
                "#,
                &[&delivery_id, &at],
            )
            .await
            .map_err(|e| anyhow!("Delivery status update failed: {}", e))?;

        Ok(updated == 1)
    }

    async fn mark_failed(
        &self,
        delivery_id: Uuid,
        error_message: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self
            .client
            .execute(
                r#"
                UPDATE deliveries
                SET status = 'failed', last_error = $2, attempted_at = $3
                WHERE id = $1 AND status = 'pending'
                "#,
                &[&delivery_id, &error_message, &at],
            )
            .await
            .map_err(|e| anyhow!("Delivery status update failed: {}", e))?;

        Ok(updated == 1)
    }

    async fn reset_delivery(&self, event_id: Uuid) -> Result<Option<Uuid>> {
        let Some(event) = self.fetch_event(event_id).await? else {
            return Ok(None);
        };

        let reset = self
            .client
            .query_opt(
                r#"
                UPDATE deliveries
                SET status = 'pending'
                WHERE event_id = $1
                RETURNING id
                "#,
                &[&event_id],
            )
            .await
            .map_err(|e| anyhow!("Delivery reset failed: {}", e))?;

        if let Some(row) = reset {
            return Ok(Some(row.get("id")));
        }

        let fresh = DeliveryAttempt::pending(event_id, provider_for_channel(&event.channel));
        self.insert_delivery(&fresh).await?;

        Ok(Some(fresh.id))
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}
