use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use notice_service::{
    clients::{NotificationStore, ReminderSource, memory::MemoryStore},
    config::Config,
    models::{
        delivery::DeliveryAttempt,
        notice::NotificationEvent,
        reminder::{DomainEvent, ReminderChannel, ReminderRegistration},
    },
    scheduler::{ReminderScheduler, SchedulerError},
};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Test: a dual-channel reminder with one failing enqueue is not marked sent,
/// and both channels are still attempted
#[tokio::test]
async fn test_dual_channel_atomicity() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![reminder(
        ReminderChannel::Both,
    )]));
    let store = Arc::new(CountingStore::failing_from_call(2));

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        store.insert_event_calls.load(Ordering::SeqCst),
        2,
        "both channels must be attempted, no short-circuit"
    );
    assert!(source.marked.lock().await.is_empty());

    // The first channel's event stands; append-only logs are not rolled back.
    assert_eq!(store.inner.events().await.len(), 1);
    assert_eq!(store.inner.events().await[0].channel, "email");

    Ok(())
}

/// Test: a fully enqueued dual-channel reminder is marked sent with one
/// event per channel, email first
#[tokio::test]
async fn test_dual_channel_success() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![reminder(
        ReminderChannel::Both,
    )]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);

    let deliveries = store.inner.deliveries().await;
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].provider, "smtp_relay");
    assert_eq!(deliveries[1].provider, "sms_gateway");

    assert_eq!(source.marked.lock().await.clone(), vec![701]);

    Ok(())
}

/// Test: a single-channel reminder enqueues exactly one event
#[tokio::test]
async fn test_single_channel_enqueues_once() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![reminder(
        ReminderChannel::Email,
    )]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.sent, 1);
    assert_eq!(store.insert_event_calls.load(Ordering::SeqCst), 1);

    let events = store.inner.events().await;
    assert_eq!(events[0].recipient, "ada@example.org");
    assert_eq!(events[0].notice_type, "event_reminder");

    Ok(())
}

/// Test: a patron without an address for one channel fails the reminder but
/// leaves the other channel's event standing
#[tokio::test]
async fn test_missing_address_fails_reminder() -> Result<()> {
    let mut registration = reminder(ReminderChannel::Both);
    registration.patron_phone = None;

    let source = Arc::new(ScriptedSource::with_reminders(vec![registration]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 1);
    assert!(source.marked.lock().await.is_empty());

    let events = store.inner.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].channel, "email");

    Ok(())
}

/// Test: production without a configured secret aborts before the scan
#[tokio::test]
async fn test_production_missing_secret_is_fatal() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![reminder(
        ReminderChannel::Email,
    )]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("production", None));
    let result = scheduler.run_due_reminders(Some("anything")).await;

    assert!(matches!(result, Err(SchedulerError::MissingSecret)));
    assert_eq!(
        source.listed.load(Ordering::SeqCst),
        0,
        "the data source must never be touched"
    );

    Ok(())
}

/// Test: production rejects a wrong or absent caller secret
#[tokio::test]
async fn test_production_rejects_bad_secret() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(
        &source,
        &store,
        test_config("production", Some("pre-shared")),
    );

    let wrong = scheduler.run_due_reminders(Some("guess")).await;
    assert!(matches!(wrong, Err(SchedulerError::Unauthorized)));

    let absent = scheduler.run_due_reminders(None).await;
    assert!(matches!(absent, Err(SchedulerError::Unauthorized)));

    assert_eq!(source.listed.load(Ordering::SeqCst), 0);

    Ok(())
}

/// Test: production accepts the matching secret
#[tokio::test]
async fn test_production_accepts_matching_secret() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![reminder(
        ReminderChannel::Email,
    )]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(
        &source,
        &store,
        test_config("production", Some("pre-shared")),
    );
    let summary = scheduler.run_due_reminders(Some("pre-shared")).await?;

    assert_eq!(summary.sent, 1);
    assert_eq!(source.listed.load(Ordering::SeqCst), 1);

    Ok(())
}

/// Test: non-production environments need no secret
#[tokio::test]
async fn test_development_needs_no_secret() -> Result<()> {
    let source = Arc::new(ScriptedSource::with_reminders(vec![]));
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 0);

    Ok(())
}

/// Test: a domain event lookup failure fails the reminder without enqueues
#[tokio::test]
async fn test_lookup_failure_fails_reminder() -> Result<()> {
    let mut source = ScriptedSource::with_reminders(vec![reminder(ReminderChannel::Both)]);
    source.lookup_fails = true;
    let source = Arc::new(source);
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.failed, 1);
    assert_eq!(store.insert_event_calls.load(Ordering::SeqCst), 0);

    Ok(())
}

/// Test: a marker write failure counts the reminder failed but the enqueued
/// events stand
#[tokio::test]
async fn test_marker_failure_counts_failed() -> Result<()> {
    let mut source = ScriptedSource::with_reminders(vec![reminder(ReminderChannel::Both)]);
    source.mark_fails = true;
    let source = Arc::new(source);
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let summary = scheduler.run_due_reminders(None).await?;

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(store.inner.deliveries().await.len(), 2);

    Ok(())
}

/// Test: a failing reminder scan propagates as a source error
#[tokio::test]
async fn test_list_failure_propagates() -> Result<()> {
    let mut source = ScriptedSource::with_reminders(vec![]);
    source.list_fails = true;
    let source = Arc::new(source);
    let store = Arc::new(CountingStore::reliable());

    let scheduler = scheduler_with(&source, &store, test_config("development", None));
    let result = scheduler.run_due_reminders(None).await;

    assert!(matches!(result, Err(SchedulerError::Source(_))));

    Ok(())
}

struct ScriptedSource {
    reminders: Vec<ReminderRegistration>,
    list_fails: bool,
    lookup_fails: bool,
    mark_fails: bool,
    listed: AtomicU32,
    marked: Mutex<Vec<i64>>,
}

impl ScriptedSource {
    fn with_reminders(reminders: Vec<ReminderRegistration>) -> Self {
        Self {
            reminders,
            list_fails: false,
            lookup_fails: false,
            mark_fails: false,
            listed: AtomicU32::new(0),
            marked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReminderSource for ScriptedSource {
    async fn list_due_reminders(&self) -> Result<Vec<ReminderRegistration>> {
        if self.list_fails {
            return Err(anyhow!("gateway timeout"));
        }

        self.listed.fetch_add(1, Ordering::SeqCst);
        Ok(self.reminders.clone())
    }

    async fn lookup_event(&self, event_id: i64) -> Result<DomainEvent> {
        if self.lookup_fails {
            return Err(anyhow!("event record missing"));
        }

        Ok(DomainEvent {
            id: event_id,
            title: "Summer Reading Kickoff".to_string(),
            starts_at: Utc.with_ymd_and_hms(2026, 8, 10, 17, 0, 0).unwrap(),
            location: Some("Main Hall".to_string()),
        })
    }

    async fn mark_reminder_sent(&self, registration_id: i64) -> Result<()> {
        if self.mark_fails {
            return Err(anyhow!("marker write refused"));
        }

        self.marked.lock().await.push(registration_id);
        Ok(())
    }
}

/// Store that counts event inserts and optionally starts failing them at the
/// n-th call (1-based); everything else delegates to a MemoryStore.
struct CountingStore {
    inner: MemoryStore,
    insert_event_calls: AtomicU32,
    fail_from_call: Option<u32>,
}

impl CountingStore {
    fn reliable() -> Self {
        Self {
            inner: MemoryStore::new(),
            insert_event_calls: AtomicU32::new(0),
            fail_from_call: None,
        }
    }

    fn failing_from_call(n: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            insert_event_calls: AtomicU32::new(0),
            fail_from_call: Some(n),
        }
    }
}

#[async_trait]
impl NotificationStore for CountingStore {
    async fn insert_event(&self, event: &NotificationEvent) -> Result<()> {
        let call = self.insert_event_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(n) = self.fail_from_call {
            if call >= n {
                return Err(anyhow!("store write refused"));
            }
        }

        self.inner.insert_event(event).await
    }

    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<NotificationEvent>> {
        self.inner.fetch_event(event_id).await
    }

    async fn insert_delivery(&self, delivery: &DeliveryAttempt) -> Result<()> {
        self.inner.insert_delivery(delivery).await
    }

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<DeliveryAttempt>> {
        self.inner.fetch_pending(limit).await
    }

    async fn mark_sent(&self, delivery_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.inner.mark_sent(delivery_id, at).await
    }

    async fn mark_failed(&self, delivery_id: Uuid, error: &str, at: DateTime<Utc>) -> Result<bool> {
        self.inner.mark_failed(delivery_id, error, at).await
    }

    async fn reset_delivery(&self, event_id: Uuid) -> Result<Option<Uuid>> {
        self.inner.reset_delivery(event_id).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

fn scheduler_with(
    source: &Arc<ScriptedSource>,
    store: &Arc<CountingStore>,
    config: Config,
) -> ReminderScheduler {
    ReminderScheduler::new(
        Arc::clone(source) as Arc<dyn ReminderSource>,
        Arc::clone(store) as Arc<dyn NotificationStore>,
        &config,
    )
}

fn reminder(channel: ReminderChannel) -> ReminderRegistration {
    ReminderRegistration {
        registration_id: 701,
        patron_id: 88,
        event_id: 42,
        reminder_channel: channel,
        patron_name: "Ada Lovelace".to_string(),
        patron_email: Some("ada@example.org".to_string()),
        patron_phone: Some("+15550100123".to_string()),
    }
}

fn test_config(environment: &str, scheduler_secret: Option<&str>) -> Config {
    Config {
        environment: environment.to_string(),
        database_url: "postgres://localhost/notices".to_string(),
        ils_gateway_url: "http://localhost:9200".to_string(),
        mail_gateway_url: "http://localhost:9300".to_string(),
        sms_gateway_url: "http://localhost:9400".to_string(),
        library_name: "Westside Library".to_string(),
        library_email: "notices@westside.example.org".to_string(),
        scheduler_secret: scheduler_secret.map(str::to_string),
        delivery_batch_limit: 50,
        secret_ttl_seconds: 300,
        max_retry_attempts: 2,
        initial_retry_delay_ms: 1,
        max_retry_delay_ms: 2,
        retry_backoff_multiplier: 2,
        server_port: 0,
    }
}
