//! Bearer-token checks for administrative actions.
use hmac::{Hmac, Mac};
use sha2::Sha256;

const ADMIN_DOMAIN_TAG: &[u8] = b"sadari/admin-reset";

type HmacSha256 = Hmac<Sha256>;

/// Token carried by an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .trim()
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn domain_tag(key: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(ADMIN_DOMAIN_TAG);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Whether `presented` matches the configured admin token.
///
/// Both tokens are keyed into HMAC-SHA256 over a fixed tag and the tags are
/// compared with `verify_slice`, so timing does not depend on where the
/// tokens first differ. An unset or empty expected token authorizes nothing.
#[must_use]
pub fn authorize(expected: Option<&str>, presented: Option<&str>) -> bool {
    let (Some(expected), Some(presented)) = (expected, presented) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    let Some(expected_tag) = domain_tag(expected.as_bytes()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(presented.as_bytes()) else {
        return false;
    };
    mac.update(ADMIN_DOMAIN_TAG);
    mac.verify_slice(&expected_tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer s3cret"), Some("s3cret"));
        assert_eq!(bearer_token("  Bearer  s3cret "), Some("s3cret"));
        assert_eq!(bearer_token("Basic s3cret"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("s3cret"), None);
    }

    #[test]
    fn matching_token_is_authorized() {
        assert!(authorize(Some("s3cret"), Some("s3cret")));
        assert!(!authorize(Some("s3cret"), Some("s3cre")));
        assert!(!authorize(Some("s3cret"), Some("S3CRET")));
        assert!(!authorize(Some("s3cret"), None));
    }

    #[test]
    fn unset_token_refuses_everyone() {
        assert!(!authorize(None, Some("anything")));
        assert!(!authorize(Some(""), Some("")));
    }
}
