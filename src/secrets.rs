use std::collections::HashMap;
use std::sync::Arc;

use rand::{Rng, distr::Alphanumeric};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, sleep_until};
use tracing::debug;

const TOKEN_LENGTH: usize = 43;

struct SecretEntry {
    secret: String,
    expires_at: Instant,
}

/// Short-lived, single-read handoff for sensitive values such as freshly
/// generated passwords. An entry is readable exactly once: the first consume
/// removes it under the map lock, so a racing second consume observes
/// nothing. Expired, consumed, and never-issued tokens are indistinguishable.
///
/// Process-local by design; a multi-instance deployment needs a shared
/// backing store with atomic delete-on-read for these semantics to hold
/// cluster-wide.
#[derive(Clone)]
pub struct OneTimeSecretStore {
    entries: Arc<Mutex<HashMap<String, SecretEntry>>>,
    ttl: Duration,
}

impl OneTimeSecretStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Stores the secret under a fresh random token and returns the token.
    /// A background sweeper drops the entry at expiry; it is best-effort
    /// cleanup only, since `consume` checks expiry itself.
    pub async fn store(&self, secret: String) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();

        let expires_at = Instant::now() + self.ttl;

        self.entries.lock().await.insert(
            token.clone(),
            SecretEntry {
                secret,
                expires_at,
            },
        );

        let entries = Arc::clone(&self.entries);
        let sweep_token = token.clone();

        tokio::spawn(async move {
            sleep_until(expires_at).await;

            if entries.lock().await.remove(&sweep_token).is_some() {
                debug!("Expired secret handoff entry purged");
            }
        });

        token
    }

    /// Removes and returns the secret for `token`, or None when the token
    /// never existed, was already consumed, or has expired.
    pub async fn consume(&self, token: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;

        let entry = entries.remove(token)?;

        if entry.expires_at <= Instant::now() {
            return None;
        }

        Some(entry.secret)
    }
}
