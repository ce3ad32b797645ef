use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::notice::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderChannel {
    Email,
    Sms,
    Both,
}

impl ReminderChannel {
    /// Channels that must all be enqueued before the reminder counts as
    /// handled. For `both` the order is fixed: email first, then sms.
    pub fn required_channels(&self) -> &'static [Channel] {
        match self {
            ReminderChannel::Email => &[Channel::Email],
            ReminderChannel::Sms => &[Channel::Sms],
            ReminderChannel::Both => &[Channel::Email, Channel::Sms],
        }
    }
}

/// Due-reminder row as returned by the ILS gateway. Read-only here: the
/// scheduler never creates or deletes registrations, it only writes back the
/// "reminder sent" marker. Patron contact data travels on the payload so the
/// scheduler can address each channel without extra gateway round trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRegistration {
    pub registration_id: i64,
    pub patron_id: i64,
    pub event_id: i64,
    pub reminder_channel: ReminderChannel,
    pub patron_name: String,
    #[serde(default)]
    pub patron_email: Option<String>,
    #[serde(default)]
    pub patron_phone: Option<String>,
}

/// Human-readable event metadata resolved for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: i64,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSummary {
    pub sent: u32,
    pub failed: u32,
}
