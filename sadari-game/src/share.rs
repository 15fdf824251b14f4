//! Share identifiers and links for saved ladders.
//! Identifier format: `<TIME6>-<RAND6>`, e.g. `a8Xk2Q-0Zr9bc`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::{Mutex, PoisonError};

use crate::numbers::MAX_SAFE_INTEGER;

const BASE62: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SEGMENT_LEN: usize = 6;

/// Base-62 digits of `value`, most significant first; zero encodes as `"0"`.
#[must_use]
pub fn base62(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE62[(value % 62) as usize]);
        value /= 62;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn tail(text: &str) -> &str {
    &text[text.len().saturating_sub(SEGMENT_LEN)..]
}

/// Produces opaque identifiers for newly saved configs.
pub trait IdAllocator: Send + Sync {
    fn allocate(&self, now_millis: i64) -> String;
}

/// Timestamp-plus-random identifiers.
#[derive(Debug)]
pub struct TokenIdAllocator {
    rng: Mutex<ChaCha20Rng>,
}

impl Default for TokenIdAllocator {
    fn default() -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }
}

impl TokenIdAllocator {
    /// Deterministic allocator for tests and replays.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl IdAllocator for TokenIdAllocator {
    fn allocate(&self, now_millis: i64) -> String {
        let noise = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..MAX_SAFE_INTEGER);
        let stamp = base62(u64::try_from(now_millis).unwrap_or_default());
        let noise = base62(noise);
        format!("{}-{}", tail(&stamp), tail(&noise))
    }
}

/// True for strings an allocator could have produced.
#[must_use]
pub fn is_well_formed_id(id: &str) -> bool {
    let Some((stamp, noise)) = id.split_once('-') else {
        return false;
    };
    [stamp, noise].iter().all(|segment| {
        (1..=SEGMENT_LEN).contains(&segment.len())
            && segment.bytes().all(|byte| byte.is_ascii_alphanumeric())
    })
}

/// Link that reopens a saved ladder. Trailing slashes on `site_url` are ignored;
/// without a site the link is relative.
#[must_use]
pub fn share_url(site_url: Option<&str>, id: &str) -> String {
    let site = site_url.map_or("", |site| site.trim_end_matches('/'));
    format!("{site}/games/ladder?id={id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base62_matches_known_digits() {
        assert_eq!(base62(0), "0");
        assert_eq!(base62(61), "Z");
        assert_eq!(base62(62), "10");
        assert_eq!(base62(1_700_000_000_000), "tVCOKGI");
    }

    #[test]
    fn allocated_ids_use_the_last_six_digits() {
        let allocator = TokenIdAllocator::seeded(7);
        let id = allocator.allocate(1_700_000_000_000);
        let (stamp, noise) = id.split_once('-').unwrap();
        assert_eq!(stamp, "VCOKGI");
        assert!(!noise.is_empty() && noise.len() <= 6);
        assert!(is_well_formed_id(&id));
    }

    #[test]
    fn seeded_allocators_repeat_and_successive_ids_differ() {
        let first = TokenIdAllocator::seeded(99);
        let second = TokenIdAllocator::seeded(99);
        let a = first.allocate(5);
        assert_eq!(a, second.allocate(5));
        assert_ne!(a, first.allocate(5));
    }

    #[test]
    fn well_formed_ids_reject_garbage() {
        assert!(is_well_formed_id("0-0"));
        assert!(!is_well_formed_id("abc"));
        assert!(!is_well_formed_id("abc-"));
        assert!(!is_well_formed_id("abc-../x"));
        assert!(!is_well_formed_id("abcdefg-abc"));
    }

    #[test]
    fn share_url_trims_site_slashes() {
        assert_eq!(
            share_url(Some("https://play.example//"), "abc-def"),
            "https://play.example/games/ladder?id=abc-def"
        );
        assert_eq!(share_url(None, "abc-def"), "/games/ladder?id=abc-def");
    }
}
