//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Alert throttling over an expiring key/value store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sfo_logging::{sfo_debug, sfo_warn, TARGET_NOTIFY};
use sha2::{Digest, Sha256};
use tokio::time::Instant;

const KEY_PREFIX: &str = "sfo_throttle_";

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Store offering an atomic set-if-absent with expiry.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Insert `key` for `ttl` unless a live entry exists. Returns whether it was inserted.
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> anyhow::Result<bool>;

    async fn has_key(&self, key: &str) -> anyhow::Result<bool>;
}

/// Store key derived from a failure signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThrottleKey(String);

impl ThrottleKey {
    pub fn for_signature(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        ThrottleKey(format!("{}{}", KEY_PREFIX, hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live suppression window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleWindow {
    pub key: String,
    pub expires_at: Instant,
}

/// Process-local [`ExpiringStore`]. Entries expire lazily on access or through
/// [`InMemoryExpiringStore::purge_expired`].
#[derive(Debug, Default)]
pub struct InMemoryExpiringStore {
    entries: DashMap<String, Instant>,
}

impl InMemoryExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired windows ordered by expiry.
    pub fn active_windows(&self) -> Vec<ThrottleWindow> {
        let now = Instant::now();
        let mut windows: Vec<ThrottleWindow> = self
            .entries
            .iter()
            .filter(|entry| *entry.value() > now)
            .map(|entry| ThrottleWindow {
                key: entry.key().clone(),
                expires_at: *entry.value(),
            })
            .collect();
        windows.sort_by_key(|window| window.expires_at);
        windows
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl ExpiringStore for InMemoryExpiringStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> anyhow::Result<bool> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    Ok(false)
                } else {
                    entry.insert(expires_at);
                    Ok(true)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn has_key(&self, key: &str) -> anyhow::Result<bool> {
        let now = Instant::now();
        let live = self.entries.get(key).map(|expires_at| *expires_at > now);
        if live == Some(false) {
            self.entries.remove_if(key, |_, expires_at| *expires_at <= now);
        }
        Ok(live.unwrap_or(false))
    }
}

/// Decides whether a failure signature may alert now.
#[derive(Clone)]
pub struct NotificationThrottle {
    store: Arc<dyn ExpiringStore>,
}

impl fmt::Debug for NotificationThrottle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationThrottle").finish_non_exhaustive()
    }
}

impl NotificationThrottle {
    pub fn new(store: Arc<dyn ExpiringStore>) -> Self {
        Self { store }
    }

    /// Claim the window for `signature`. Returns true when the caller should alert.
    /// Store failures let the alert through.
    pub async fn maybe_notify(&self, signature: &str, window: Duration) -> bool {
        let key = ThrottleKey::for_signature(signature);
        match self.store.set_if_absent(key.as_str(), window).await {
            Ok(true) => true,
            Ok(false) => {
                sfo_debug!(target: TARGET_NOTIFY, "notification throttled for key {}", key);
                false
            }
            Err(err) => {
                sfo_warn!(
                    target: TARGET_NOTIFY,
                    "throttle store unavailable for key {}, alerting anyway: {:#}",
                    key,
                    err
                );
                true
            }
        }
    }

    pub async fn is_throttled(&self, signature: &str) -> bool {
        let key = ThrottleKey::for_signature(signature);
        match self.store.has_key(key.as_str()).await {
            Ok(present) => present,
            Err(err) => {
                sfo_warn!(
                    target: TARGET_NOTIFY,
                    "throttle store unavailable for key {}: {:#}",
                    key,
                    err
                );
                false
            }
        }
    }
}
