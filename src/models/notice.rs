use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Delivery channels the worker knows how to send on. Events store the
/// channel as a plain string so rows with an unrecognized channel can still
/// be recorded and then failed permanently at delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Channel::Email),
            "sms" => Some(Channel::Sms),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }

    /// Context field that must carry the recipient address for this channel.
    pub fn address_field(&self) -> &'static str {
        match self {
            Channel::Email => "patron.email",
            Channel::Sms => "patron.phone",
        }
    }

    /// Identifier of the sending backend recorded on the outbox row.
    pub fn provider(&self) -> &'static str {
        match self {
            Channel::Email => "smtp_relay",
            Channel::Sms => "sms_gateway",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeType {
    HoldReady,
    EventReminder,
    Overdue,
}

impl NoticeType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hold_ready" => Some(NoticeType::HoldReady),
            "event_reminder" => Some(NoticeType::EventReminder),
            "overdue" => Some(NoticeType::Overdue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeType::HoldReady => "hold_ready",
            NoticeType::EventReminder => "event_reminder",
            NoticeType::Overdue => "overdue",
        }
    }
}

/// Append-only record of "a notification was requested". Immutable once
/// inserted; delivery state lives on the outbox row, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub channel: String,
    pub notice_type: String,
    pub recipient: String,
    pub context: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        channel: &str,
        notice_type: &str,
        recipient: String,
        context: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            notice_type: notice_type.to_string(),
            recipient,
            context,
            created_at: Utc::now(),
        }
    }
}
