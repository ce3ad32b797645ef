use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clients::{
        NotificationStore, SendProvider,
        template::{TemplateCatalog, resolve_path},
    },
    models::{
        delivery::{DeliveryAttempt, DeliverySummary},
        notice::{Channel, NoticeType},
        validation::validate_recipient,
    },
};

enum Outcome {
    Sent,
    Failed,
    /// The row stopped being ours mid-flight (claimed by a racing worker or
    /// unreadable). Counted as processed only.
    Skipped,
}

/// Polling outbox drain. Invoked by an external trigger; each call takes a
/// bounded batch, attempts every row sequentially in creation order, and
/// records each outcome on the row itself.
pub struct DeliveryWorker {
    store: Arc<dyn NotificationStore>,
    mail: Arc<dyn SendProvider>,
    sms: Arc<dyn SendProvider>,
    catalog: TemplateCatalog,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mail: Arc<dyn SendProvider>,
        sms: Arc<dyn SendProvider>,
    ) -> Self {
        Self {
            store,
            mail,
            sms,
            catalog: TemplateCatalog::builtin(),
        }
    }

    /// Drains up to `limit` pending rows, oldest first. Row-level problems
    /// land in the `failed` counter; only the initial fetch can fail the
    /// whole call. Rows already out of `pending` are never selected, and a
    /// failed row stays failed until an explicit retry re-enqueues it.
    pub async fn process_pending(&self, limit: u32) -> Result<DeliverySummary> {
        let batch = self.store.fetch_pending(limit).await?;

        info!(batch_size = batch.len(), limit, "Draining pending deliveries");

        let mut summary = DeliverySummary::default();

        for row in &batch {
            summary.processed += 1;

            match self.attempt(row).await {
                Outcome::Sent => summary.sent += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Skipped => {}
            }
        }

        info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            "Drain pass complete"
        );

        Ok(summary)
    }

    /// Explicitly re-enqueues the delivery row for an event, the only path
    /// by which a failed row becomes pending again. Returns the delivery id,
    /// or None for an unknown event.
    pub async fn enqueue_retry(&self, event_id: Uuid) -> Result<Option<Uuid>> {
        let reset = self.store.reset_delivery(event_id).await?;

        if let Some(delivery_id) = reset {
            info!(event_id = %event_id, delivery_id = %delivery_id, "Delivery re-enqueued");
        }

        Ok(reset)
    }

    async fn attempt(&self, row: &DeliveryAttempt) -> Outcome {
        let event = match self.store.fetch_event(row.event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => return self.fail(row, "Notification event not found").await,
            Err(e) => {
                warn!(
                    delivery_id = %row.id,
                    error = %e,
                    "Event lookup failed, leaving row pending"
                );
                return Outcome::Skipped;
            }
        };

        // Everything up to the send is a permanent condition: the event is
        // immutable, so none of these checks can pass on a later pass.
        let Some(channel) = Channel::parse(&event.channel) else {
            return self
                .fail(row, &format!("Unsupported channel: {}", event.channel))
                .await;
        };

        if let Err(e) = validate_recipient(channel, &event.recipient) {
            return self
                .fail(row, &format!("Invalid recipient address: {}", e))
                .await;
        }

        if resolve_path(&event.context, channel.address_field()).is_none() {
            return self
                .fail(
                    row,
                    &format!(
                        "Missing required context field: {}",
                        channel.address_field()
                    ),
                )
                .await;
        }

        let Some(notice_type) = NoticeType::parse(&event.notice_type) else {
            return self
                .fail(row, &format!("Unknown notice type: {}", event.notice_type))
                .await;
        };

        for field in self.catalog.required_fields(notice_type) {
            if resolve_path(&event.context, field).is_none() {
                return self
                    .fail(row, &format!("Missing required context field: {}", field))
                    .await;
            }
        }

        let notice = self.catalog.render_notice(notice_type, &event.context);

        let provider = match channel {
            Channel::Email => &self.mail,
            Channel::Sms => &self.sms,
        };

        match provider.send(&event.recipient, &notice).await {
            Ok(()) => match self.store.mark_sent(row.id, Utc::now()).await {
                Ok(true) => {
                    info!(
                        delivery_id = %row.id,
                        event_id = %row.event_id,
                        channel = channel.as_str(),
                        "Notice delivered"
                    );
                    Outcome::Sent
                }
                Ok(false) => {
                    warn!(delivery_id = %row.id, "Row already finalized elsewhere");
                    Outcome::Skipped
                }
                Err(e) => {
                    // The send happened; a bookkeeping failure must not turn
                    // it into a reported failure.
                    warn!(delivery_id = %row.id, error = %e, "Failed to record sent status");
                    Outcome::Sent
                }
            },
            Err(e) => self.fail(row, &format!("Provider send failed: {}", e)).await,
        }
    }

    async fn fail(&self, row: &DeliveryAttempt, reason: &str) -> Outcome {
        warn!(delivery_id = %row.id, event_id = %row.event_id, reason, "Delivery attempt failed");

        match self.store.mark_failed(row.id, reason, Utc::now()).await {
            Ok(true) => Outcome::Failed,
            Ok(false) => {
                warn!(delivery_id = %row.id, "Row already finalized elsewhere");
                Outcome::Skipped
            }
            Err(e) => {
                warn!(delivery_id = %row.id, error = %e, "Failed to record failure status");
                Outcome::Failed
            }
        }
    }
}
