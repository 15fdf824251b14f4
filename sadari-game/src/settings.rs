//! Service tunables.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Seven days.
pub const DEFAULT_LADDER_TTL_SECS: u64 = 604_800;
pub const DEFAULT_RATE_LIMIT: u32 = 10;
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
/// Ten minutes.
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Limits, lifetimes, and secrets for the arcade services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeSettings {
    /// Ladder saves allowed per client per window.
    pub save_rate_limit: u32,
    /// Score submissions allowed per client per window.
    pub submit_rate_limit: u32,
    pub rate_window_secs: u64,
    /// Lifetime of a saved ladder.
    pub ladder_ttl_secs: u64,
    /// How long a run token stays claimed.
    pub dedup_window_secs: u64,
    /// Public origin used to build share links; relative links when unset.
    pub site_url: Option<String>,
    /// Bearer token for admin resets; resets are refused when unset.
    #[serde(skip_serializing)]
    pub admin_token: Option<String>,
}

impl Default for ArcadeSettings {
    fn default() -> Self {
        Self {
            save_rate_limit: DEFAULT_RATE_LIMIT,
            submit_rate_limit: DEFAULT_RATE_LIMIT,
            rate_window_secs: DEFAULT_RATE_WINDOW_SECS,
            ladder_ttl_secs: DEFAULT_LADDER_TTL_SECS,
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            site_url: None,
            admin_token: None,
        }
    }
}

impl ArcadeSettings {
    /// Check that every window and limit is usable.
    ///
    /// # Errors
    ///
    /// Returns the first field that is zero.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let checks = [
            ("save_rate_limit", u64::from(self.save_rate_limit)),
            ("submit_rate_limit", u64::from(self.submit_rate_limit)),
            ("rate_window_secs", self.rate_window_secs),
            ("ladder_ttl_secs", self.ladder_ttl_secs),
            ("dedup_window_secs", self.dedup_window_secs),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(SettingsError::Zero(*field)),
            None => Ok(()),
        }
    }

    /// Drop blank optional strings so an empty env var reads as unset.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.site_url = self.site_url.filter(|site| !site.trim().is_empty());
        self.admin_token = self.admin_token.filter(|token| !token.is_empty());
        self
    }

    #[must_use]
    pub const fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    #[must_use]
    pub const fn ladder_ttl(&self) -> Duration {
        Duration::from_secs(self.ladder_ttl_secs)
    }

    #[must_use]
    pub const fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_limits() {
        let settings = ArcadeSettings::default();
        assert_eq!(settings.save_rate_limit, 10);
        assert_eq!(settings.ladder_ttl(), Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(settings.dedup_window(), Duration::from_secs(600));
        assert_eq!(settings.rate_window(), Duration::from_secs(60));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_values_fail_validation() {
        let settings = ArcadeSettings {
            ladder_ttl_secs: 0,
            ..ArcadeSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::Zero("ladder_ttl_secs"))
        );
    }

    #[test]
    fn partial_json_fills_defaults_and_hides_token() {
        let settings: ArcadeSettings =
            serde_json::from_str(r#"{"save_rate_limit": 3, "admin_token": "s3cret"}"#).unwrap();
        assert_eq!(settings.save_rate_limit, 3);
        assert_eq!(settings.submit_rate_limit, 10);
        assert_eq!(settings.admin_token.as_deref(), Some("s3cret"));
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn blank_strings_normalize_to_unset() {
        let settings = ArcadeSettings {
            site_url: Some("  ".to_string()),
            admin_token: Some(String::new()),
            ..ArcadeSettings::default()
        }
        .normalized();
        assert_eq!(settings.site_url, None);
        assert_eq!(settings.admin_token, None);
    }
}
