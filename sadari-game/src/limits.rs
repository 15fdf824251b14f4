//! Fixed-window rate limiting and one-shot run deduplication.
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::time::Duration;
use twox_hash::XxHash64;

use crate::store::{KvStore, StoreError};

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the window resets.
    pub retry_after: Duration,
}

/// Fixed-width key segment for an untrusted client identity.
#[must_use]
pub fn client_fingerprint(client: &str) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(client.as_bytes());
    format!("{:016x}", hasher.finish())
}

/// Count one request against `scope` for `client`.
///
/// The first hit in a window starts the window's expiry; the counter's
/// atomic increment is the only coordination between concurrent callers.
///
/// # Errors
///
/// Returns a [`StoreError`] when the store cannot be reached.
pub async fn rate_limit(
    store: &dyn KvStore,
    scope: &str,
    client: &str,
    limit: u32,
    window: Duration,
) -> Result<RateDecision, StoreError> {
    let key = format!("rl:{scope}:{}", client_fingerprint(client));
    let count = store.incr(&key).await?;
    if count == 1 {
        store.expire(&key, window).await?;
    }
    let retry_after = store.ttl(&key).await?.unwrap_or(window);
    let used = u32::try_from(count).unwrap_or(u32::MAX);
    Ok(RateDecision {
        allowed: used <= limit,
        remaining: limit.saturating_sub(used),
        retry_after,
    })
}

/// Claim `key` for `window`. Returns `true` only for the first claimant.
///
/// # Errors
///
/// Returns a [`StoreError`] when the store cannot be reached.
pub async fn deduplicate(
    store: &dyn KvStore,
    key: &str,
    marker: &str,
    window: Duration,
) -> Result<bool, StoreError> {
    store
        .set_if_absent(key, marker.to_string(), Some(window))
        .await
}
