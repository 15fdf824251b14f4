//! Key-value capability the services persist through.
//!
//! The services never reach for a global client: whoever builds an
//! [`crate::Arcade`] hands it a [`KvStore`]. [`MemoryStore`] is the in-process
//! implementation used by tests and single-node deployments.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),
}

/// Redis-shaped operations. Every call is atomic with respect to the others.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value`, replacing any previous value; `ttl` of `None` never expires.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Store `value` only when `key` is absent. Returns whether it was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Increment a counter (absent counts as 0) and return the new value.
    /// An existing expiry is kept.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set the expiry of an existing key. Returns false when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining lifetime, or `None` when the key is absent or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Remove a key of any type. Returns whether something was removed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Score recorded for `member` on `board`.
    async fn score(&self, board: &str, member: &str) -> Result<Option<f64>, StoreError>;

    /// Record `score` for `member`, replacing the previous one.
    async fn put_score(&self, board: &str, member: &str, score: f64) -> Result<(), StoreError>;

    /// Every member and score on `board`, in no particular order.
    async fn scores(&self, board: &str) -> Result<Vec<(String, f64)>, StoreError>;
}

#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Counter(i64),
    Board(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<i64>,
}

impl Entry {
    fn live_at(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

fn deadline(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

/// Minimum spacing between full sweeps of expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-process store with expiry against an injected clock.
///
/// Reads drop the expired key they touch. Writes also sweep every expired
/// entry at most once per [`SWEEP_INTERVAL`], so keys nobody reads again
/// (rate-limit counters, run tokens) are still released.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    swept_at: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            swept_at: AtomicI64::new(now),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Live entry for `key`, dropping it first if it has expired.
    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: i64,
    ) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|entry| !entry.live_at(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn sweep(&self, entries: &mut HashMap<String, Entry>, now: i64) -> usize {
        self.swept_at.store(now, Ordering::Relaxed);
        let before = entries.len();
        entries.retain(|_, entry| entry.live_at(now));
        before - entries.len()
    }

    /// Write-path lock: sweeps expired entries first when a sweep is due.
    fn lock_for_write(
        &self,
        now: i64,
    ) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        let mut entries = self.lock()?;
        let due = deadline(self.swept_at.load(Ordering::Relaxed), SWEEP_INTERVAL) <= now;
        if due {
            let dropped = self.sweep(&mut entries, now);
            if dropped > 0 {
                log::debug!("swept {dropped} expired keys");
            }
        }
        Ok(entries)
    }

    /// Drop every expired entry now. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        Ok(self.sweep(&mut entries, now))
    }

    /// Number of keys currently held, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        match Self::live(&mut entries, key, now).map(|entry| &entry.slot) {
            None => Ok(None),
            Some(Slot::Text(text)) => Ok(Some(text.clone())),
            Some(Slot::Counter(count)) => Ok(Some(count.to_string())),
            Some(Slot::Board(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock_for_write(now)?;
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Text(value),
                expires_at: ttl.map(|ttl| deadline(now, ttl)),
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock_for_write(now)?;
        if Self::live(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Text(value),
                expires_at: ttl.map(|ttl| deadline(now, ttl)),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock_for_write(now)?;
        let Some(entry) = Self::live(&mut entries, key, now) else {
            entries.insert(
                key.to_string(),
                Entry {
                    slot: Slot::Counter(1),
                    expires_at: None,
                },
            );
            return Ok(1);
        };
        let current = match &entry.slot {
            Slot::Counter(count) => *count,
            Slot::Text(text) => text
                .parse::<i64>()
                .map_err(|_| StoreError::WrongType(key.to_string()))?,
            Slot::Board(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        let next = current.saturating_add(1);
        entry.slot = Slot::Counter(next);
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        let Some(entry) = Self::live(&mut entries, key, now) else {
            return Ok(false);
        };
        entry.expires_at = Some(deadline(now, ttl));
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        Ok(Self::live(&mut entries, key, now)
            .and_then(|entry| entry.expires_at)
            .map(|deadline| {
                Duration::from_millis(u64::try_from(deadline - now).unwrap_or_default())
            }))
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        let existed = Self::live(&mut entries, key, now).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn score(&self, board: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        match Self::live(&mut entries, board, now).map(|entry| &entry.slot) {
            None => Ok(None),
            Some(Slot::Board(members)) => Ok(members.get(member).copied()),
            Some(_) => Err(StoreError::WrongType(board.to_string())),
        }
    }

    async fn put_score(&self, board: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock_for_write(now)?;
        if let Some(entry) = Self::live(&mut entries, board, now) {
            let Slot::Board(members) = &mut entry.slot else {
                return Err(StoreError::WrongType(board.to_string()));
            };
            members.insert(member.to_string(), score);
            return Ok(());
        }
        entries.insert(
            board.to_string(),
            Entry {
                slot: Slot::Board(HashMap::from([(member.to_string(), score)])),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn scores(&self, board: &str) -> Result<Vec<(String, f64)>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        match Self::live(&mut entries, board, now).map(|entry| &entry.slot) {
            None => Ok(Vec::new()),
            Some(Slot::Board(members)) => Ok(members
                .iter()
                .map(|(member, score)| (member.clone(), *score))
                .collect()),
            Some(_) => Err(StoreError::WrongType(board.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = MemoryStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn values_expire_after_ttl() {
        let (clock, store) = store();
        store
            .set("k", "v".to_string(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(
            store.ttl("k").await.unwrap(),
            Some(Duration::from_secs(10))
        );
        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_without_ttl_persists() {
        let (clock, store) = store();
        store.set("k", "v".to_string(), None).await.unwrap();
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_respects_live_keys_only() {
        let (clock, store) = store();
        let ttl = Some(Duration::from_secs(5));
        assert!(store.set_if_absent("run", "a".into(), ttl).await.unwrap());
        assert!(!store.set_if_absent("run", "b".into(), ttl).await.unwrap());
        assert_eq!(store.get("run").await.unwrap().as_deref(), Some("a"));
        clock.advance(Duration::from_secs(5));
        assert!(store.set_if_absent("run", "c".into(), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn incr_keeps_existing_expiry() {
        let (clock, store) = store();
        assert_eq!(store.incr("c").await.unwrap(), 1);
        assert!(store.expire("c", Duration::from_secs(60)).await.unwrap());
        clock.advance(Duration::from_secs(30));
        assert_eq!(store.incr("c").await.unwrap(), 2);
        assert_eq!(store.ttl("c").await.unwrap(), Some(Duration::from_secs(30)));
        clock.advance(Duration::from_secs(30));
        assert_eq!(store.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn incr_parses_numeric_text_and_rejects_other_text() {
        let (_clock, store) = store();
        store.set("n", "41".into(), None).await.unwrap();
        assert_eq!(store.incr("n").await.unwrap(), 42);
        store.set("t", "hello".into(), None).await.unwrap();
        assert_eq!(
            store.incr("t").await,
            Err(StoreError::WrongType("t".to_string()))
        );
    }

    #[tokio::test]
    async fn expire_on_missing_key_is_false() {
        let (_clock, store) = store();
        assert!(!store.expire("nope", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn boards_hold_members_and_reject_text_access() {
        let (_clock, store) = store();
        store.put_score("lb:aim", "kim", 12.0).await.unwrap();
        store.put_score("lb:aim", "lee", 9.0).await.unwrap();
        store.put_score("lb:aim", "kim", 15.0).await.unwrap();
        assert_eq!(store.score("lb:aim", "kim").await.unwrap(), Some(15.0));
        assert_eq!(store.score("lb:aim", "park").await.unwrap(), None);
        let mut all = store.scores("lb:aim").await.unwrap();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all, vec![("kim".to_string(), 15.0), ("lee".to_string(), 9.0)]);
        assert_eq!(
            store.get("lb:aim").await,
            Err(StoreError::WrongType("lb:aim".to_string()))
        );
        store.set("plain", "x".into(), None).await.unwrap();
        assert!(store.put_score("plain", "kim", 1.0).await.is_err());
    }

    #[tokio::test]
    async fn del_removes_any_type() {
        let (_clock, store) = store();
        store.put_score("lb:reaction", "kim", 200.0).await.unwrap();
        assert!(store.del("lb:reaction").await.unwrap());
        assert!(!store.del("lb:reaction").await.unwrap());
        assert!(store.scores("lb:reaction").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_drops_expired_entries() {
        let (clock, store) = store();
        store
            .set("short", "1".into(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store.set("long", "2".into(), None).await.unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert!(!store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn writes_sweep_keys_nobody_reads_again() {
        let (clock, store) = store();
        for n in 0..100 {
            let key = format!("rl:save:{n}");
            store.incr(&key).await.unwrap();
            store.expire(&key, Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(store.len().unwrap(), 100);

        clock.advance(Duration::from_secs(30));
        store.set("fresh", "1".into(), None).await.unwrap();
        assert_eq!(store.len().unwrap(), 101);

        clock.advance(SWEEP_INTERVAL);
        store.set("later", "2".into(), None).await.unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }
}
