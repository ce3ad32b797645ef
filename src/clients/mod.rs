pub mod database;
pub mod gateway;
pub mod ils;
pub mod memory;
pub mod template;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    clients::template::RenderedNotice,
    models::{
        delivery::DeliveryAttempt,
        notice::{Channel, NotificationEvent},
        reminder::{DomainEvent, ReminderRegistration},
    },
};

/// Persistence seam for the append-only event log and the delivery outbox.
/// The store is the arbiter of claim races: status transitions are
/// conditional on the row still being `pending`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_event(&self, event: &NotificationEvent) -> Result<()>;

    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<NotificationEvent>>;

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()>;

    /// Oldest-first pending rows, at most `limit`.
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<DeliveryAttempt>>;

    /// `pending -> sent`, clearing the last error. Returns false when the
    /// row was no longer pending.
    async fn mark_sent(&self, delivery_id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// `pending -> failed`, recording the error. Returns false when the row
    /// was no longer pending.
    async fn mark_failed(&self, delivery_id: Uuid, error: &str, at: DateTime<Utc>)
    -> Result<bool>;

    /// Explicit retry: the event's existing delivery row goes back to
    /// `pending` (a fresh row is created when the event has none). Returns
    /// the delivery id, or None when the event is unknown.
    async fn reset_delivery(&self, event_id: Uuid) -> Result<Option<Uuid>>;

    async fn health_check(&self) -> Result<()>;

    /// Record the event and its pending outbox row in one call.
    async fn enqueue(&self, event: NotificationEvent) -> Result<Uuid> {
        let delivery = DeliveryAttempt::pending(event.id, provider_for_channel(&event.channel));
        let event_id = event.id;

        self.insert_event(&event).await?;
        self.insert_delivery(&delivery).await?;

        Ok(event_id)
    }
}

/// Sending backend recorded on the outbox row. Unknown channels keep their
/// own name so the row still exists for the worker to fail permanently.
pub fn provider_for_channel(channel: &str) -> String {
    match Channel::parse(channel) {
        Some(parsed) => parsed.provider().to_string(),
        None => channel.to_string(),
    }
}

/// The actual transport: an email relay, an SMS gateway.
#[async_trait]
pub trait SendProvider: Send + Sync {
    async fn send(&self, recipient: &str, notice: &RenderedNotice) -> Result<()>;
}

/// Domain source of due reminders, backed by the ILS RPC gateway.
#[async_trait]
pub trait ReminderSource: Send + Sync {
    async fn list_due_reminders(&self) -> Result<Vec<ReminderRegistration>>;

    async fn lookup_event(&self, event_id: i64) -> Result<DomainEvent>;

    async fn mark_reminder_sent(&self, registration_id: i64) -> Result<()>;
}
