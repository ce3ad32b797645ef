use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    clients::{NotificationStore, ReminderSource},
    config::Config,
    models::{
        notice::{Channel, NoticeType, NotificationEvent},
        reminder::{DomainEvent, ReminderRegistration, ReminderSummary},
    },
};

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Production run without a configured pre-shared secret. Fatal
    /// configuration problem; nothing is read or written.
    #[error("Scheduler secret is not configured for production")]
    MissingSecret,

    #[error("Scheduler secret mismatch")]
    Unauthorized,

    /// The due-reminder scan itself could not run.
    #[error("Reminder source unavailable: {0}")]
    Source(#[from] anyhow::Error),
}

/// Scans due event reminders from the ILS and enqueues one notification per
/// required channel. A reminder is marked sent only when every channel was
/// enqueued; partial failures leave the marker unset so the next run tries
/// again (possibly re-notifying channels that already succeeded).
pub struct ReminderScheduler {
    source: Arc<dyn ReminderSource>,
    store: Arc<dyn NotificationStore>,
    production: bool,
    scheduler_secret: Option<String>,
    library_name: String,
    library_email: String,
}

impl ReminderScheduler {
    pub fn new(
        source: Arc<dyn ReminderSource>,
        store: Arc<dyn NotificationStore>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            store,
            production: config.is_production(),
            scheduler_secret: config.scheduler_secret.clone(),
            library_name: config.library_name.clone(),
            library_email: config.library_email.clone(),
        }
    }

    pub async fn run_due_reminders(
        &self,
        provided_secret: Option<&str>,
    ) -> Result<ReminderSummary, SchedulerError> {
        self.authorize(provided_secret)?;

        let due = self.source.list_due_reminders().await?;

        info!(due = due.len(), "Running due event reminders");

        let mut summary = ReminderSummary::default();

        for reminder in &due {
            if self.handle_reminder(reminder).await {
                summary.sent += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(sent = summary.sent, failed = summary.failed, "Reminder run complete");

        Ok(summary)
    }

    fn authorize(&self, provided: Option<&str>) -> Result<(), SchedulerError> {
        if !self.production {
            return Ok(());
        }

        let expected = self
            .scheduler_secret
            .as_deref()
            .ok_or(SchedulerError::MissingSecret)?;

        if provided != Some(expected) {
            return Err(SchedulerError::Unauthorized);
        }

        Ok(())
    }

    async fn handle_reminder(&self, reminder: &ReminderRegistration) -> bool {
        let event = match self.source.lookup_event(reminder.event_id).await {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    registration_id = reminder.registration_id,
                    event_id = reminder.event_id,
                    error = %e,
                    "Domain event lookup failed"
                );
                return false;
            }
        };

        // Every required channel is attempted even after an earlier one
        // fails. A partial retry can over-notify; it can never silently drop
        // a channel.
        let mut all_enqueued = true;

        for channel in reminder.reminder_channel.required_channels() {
            if let Err(e) = self.enqueue_channel(reminder, &event, *channel).await {
                warn!(
                    registration_id = reminder.registration_id,
                    channel = channel.as_str(),
                    error = %e,
                    "Reminder channel enqueue failed"
                );
                all_enqueued = false;
            }
        }

        if !all_enqueued {
            return false;
        }

        match self.source.mark_reminder_sent(reminder.registration_id).await {
            Ok(()) => {
                info!(
                    registration_id = reminder.registration_id,
                    patron_id = reminder.patron_id,
                    "Reminder handled"
                );
                true
            }
            Err(e) => {
                warn!(
                    registration_id = reminder.registration_id,
                    error = %e,
                    "Failed to mark reminder sent"
                );
                false
            }
        }
    }

    async fn enqueue_channel(
        &self,
        reminder: &ReminderRegistration,
        event: &DomainEvent,
        channel: Channel,
    ) -> anyhow::Result<()> {
        let address = match channel {
            Channel::Email => reminder.patron_email.clone(),
            Channel::Sms => reminder.patron_phone.clone(),
        }
        .ok_or_else(|| anyhow!("Patron has no {} address", channel.as_str()))?;

        let context = json!({
            "patron": {
                "name": reminder.patron_name,
                "email": reminder.patron_email,
                "phone": reminder.patron_phone,
            },
            "event": {
                "title": event.title,
                "date": event.starts_at.format("%Y-%m-%d %H:%M").to_string(),
                "location": event.location,
            },
            "library": {
                "name": self.library_name,
                "email": self.library_email,
            },
        });

        self.store
            .enqueue(NotificationEvent::new(
                channel.as_str(),
                NoticeType::EventReminder.as_str(),
                address,
                context,
            ))
            .await?;

        Ok(())
    }
}
