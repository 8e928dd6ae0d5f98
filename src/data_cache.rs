use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::document::Document;

struct CacheEntry {
    account_id: String,
    document: Document,
    last_heartbeat: DateTime<Utc>,
}

#[derive(Default)]
struct Entries {
    by_token: HashMap<String, CacheEntry>,
    /// account id -> sequence number of the newest write applied to the cache
    write_marks: HashMap<String, u64>,
}

/// Heartbeat-gated cache of decrypted documents, keyed by session token.
///
/// Purely an optimisation: every caller must behave identically on a miss.
///
/// Reads fill the cache with [`insert`](Self::insert) and writes with
/// [`put`](Self::put). A read only lands if no write for the same account reached
/// the cache after the read took its [`write_mark`](Self::write_mark).
#[derive(Clone)]
pub struct DataCache {
    entries: Arc<RwLock<Entries>>,
    write_seq: Arc<AtomicU64>,
    heartbeat_timeout: Duration,
}

impl DataCache {
    /// Creates a new `DataCache` with heartbeat timeout `H`.
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            write_seq: Arc::new(AtomicU64::new(0)),
            heartbeat_timeout,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_heartbeat < self.heartbeat_timeout
    }

    /// Returns the cached document if its heartbeat is younger than `H`.
    ///
    /// A hit counts as activity and refreshes the heartbeat; a stale entry is dropped.
    pub async fn get(&self, token: &str, now: DateTime<Utc>) -> Option<Document> {
        let mut entries = self.entries.write().await;
        let fresh = entries
            .by_token
            .get(token)
            .map(|entry| self.is_fresh(entry, now))?;

        if !fresh {
            entries.by_token.remove(token);
            tracing::debug!("🧊 Cache entry stale, dropped");
            return None;
        }

        let entry = entries.by_token.get_mut(token)?;
        entry.last_heartbeat = now;
        Some(entry.document.clone())
    }

    /// Hands out the sequence number for a store write.
    ///
    /// Must be called while the write holds the store lock, so sequence order is
    /// commit order.
    pub fn next_write_seq(&self) -> u64 {
        self.write_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The account's current write mark. Take it before loading the store for a
    /// later [`insert`](Self::insert).
    pub async fn write_mark(&self, account_id: &str) -> u64 {
        self.entries
            .read()
            .await
            .write_marks
            .get(account_id)
            .copied()
            .unwrap_or(0)
    }

    /// Stores a document read from the persisted store.
    ///
    /// Does nothing, and returns false, if a write for the account reached the cache
    /// since `mark` was taken: the document may predate that write.
    pub async fn insert(
        &self,
        token: &str,
        account_id: &str,
        document: Document,
        now: DateTime<Utc>,
        mark: u64,
    ) -> bool {
        let mut entries = self.entries.write().await;
        let current = entries.write_marks.get(account_id).copied().unwrap_or(0);
        if current != mark {
            tracing::debug!("🧊 Read of {} raced a write, not cached", account_id);
            return false;
        }
        entries.by_token.insert(
            token.to_string(),
            CacheEntry {
                account_id: account_id.to_string(),
                document,
                last_heartbeat: now,
            },
        );
        true
    }

    /// Records the write numbered `seq`. The writer's entry gets the new data;
    /// entries of the same account held by other sessions are dropped so they
    /// re-read the store.
    ///
    /// A write older than one already applied only drops the writer's entry.
    pub async fn put(
        &self,
        token: &str,
        account_id: &str,
        document: Document,
        now: DateTime<Utc>,
        seq: u64,
    ) {
        let mut entries = self.entries.write().await;
        let current = entries.write_marks.get(account_id).copied().unwrap_or(0);
        if seq <= current {
            entries.by_token.remove(token);
            return;
        }

        entries.write_marks.insert(account_id.to_string(), seq);
        entries.by_token.retain(|other_token, entry| {
            other_token.as_str() == token || entry.account_id != account_id
        });
        entries.by_token.insert(
            token.to_string(),
            CacheEntry {
                account_id: account_id.to_string(),
                document,
                last_heartbeat: now,
            },
        );
    }

    /// Refreshes the heartbeat without touching the data.
    ///
    /// Returns whether a fresh entry exists for the session.
    pub async fn heartbeat(&self, token: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.by_token.get_mut(token) else {
            return false;
        };
        if now - entry.last_heartbeat < self.heartbeat_timeout {
            entry.last_heartbeat = now;
            true
        } else {
            entries.by_token.remove(token);
            false
        }
    }

    /// Drops the session's entry eagerly.
    pub async fn disconnect(&self, token: &str) -> bool {
        self.entries.write().await.by_token.remove(token).is_some()
    }

    /// Drops the entries of several sessions at once.
    pub async fn evict_many<'a>(&self, tokens: impl IntoIterator<Item = &'a String>) {
        let mut entries = self.entries.write().await;
        for token in tokens {
            entries.by_token.remove(token);
        }
    }

    /// Evicts entries untouched for more than `2H`. Returns how many were dropped.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let limit = self.heartbeat_timeout * 2;
        let mut entries = self.entries.write().await;
        let before = entries.by_token.len();
        entries
            .by_token
            .retain(|_, entry| now - entry.last_heartbeat <= limit);
        before - entries.by_token.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_token.len()
    }
}
