use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    clients::{NotificationStore, provider_for_channel},
    models::{
        delivery::{DeliveryAttempt, DeliveryStatus},
        notice::NotificationEvent,
    },
};

/// Process-local store keeping deliveries in insertion order, which is their
/// creation order. Backs single-node runs and the test suite; deployments
/// that need durability wire up the Postgres client instead.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, NotificationEvent>,
    deliveries: Vec<DeliveryAttempt>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every delivery row in creation order.
    pub async fn deliveries(&self) -> Vec<DeliveryAttempt> {
        self.inner.lock().await.deliveries.clone()
    }

    /// Snapshot of every recorded event, oldest first.
    pub async fn events(&self) -> Vec<NotificationEvent> {
        let inner = self.inner.lock().await;
        let mut events: Vec<_> = inner.events.values().cloned().collect();
        events.sort_by_key(|e| e.created_at);
        events
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_event(&self, event: &NotificationEvent) -> Result<()> {
        self.inner.lock().await.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<NotificationEvent>> {
        Ok(self.inner.lock().await.events.get(&event_id).cloned())
    }

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        self.inner.lock().await.deliveries.push(delivery.clone());
        Ok(())
    }

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<DeliveryAttempt>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .deliveries
            .iter()
            .filter(|d| d.status == DeliveryStatus::Pending)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, delivery_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().await;

        match inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery_id && d.status == DeliveryStatus::Pending)
        {
            Some(row) => {
                row.status = DeliveryStatus::Sent;
                row.last_error = None;
                row.attempted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(
        &self,
        delivery_id: Uuid,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;

        match inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery_id && d.status == DeliveryStatus::Pending)
        {
            Some(row) => {
                row.status = DeliveryStatus::Failed;
                row.last_error = Some(error.to_string());
                row.attempted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reset_delivery(&self, event_id: Uuid) -> Result<Option<Uuid>> {
        let mut inner = self.inner.lock().await;

        let Some(event) = inner.events.get(&event_id) else {
            return Ok(None);
        };
        let provider = provider_for_channel(&event.channel);

        if let Some(row) = inner.deliveries.iter_mut().find(|d| d.event_id == event_id) {
            row.status = DeliveryStatus::Pending;
            return Ok(Some(row.id));
        }

        let row = DeliveryAttempt::pending(event_id, provider);
        let id = row.id;
        inner.deliveries.push(row);

        Ok(Some(id))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
