//! LETHE - Core Type Definitions
//! Defines fundamental types shared by the dataset, expiration and persistence layers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Key type for the store.
pub type Key = String;

/// Value type for the store.
pub type Value = String;

/// Longest accepted TTL: 100 years.
///
/// Every expiry instant within this bound fits a snapshot timestamp and a
/// timer deadline.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A stored value together with its optional expiration instant.
///
/// `expires_at` is a wall-clock timestamp in milliseconds since the Unix
/// epoch; `None` means the item never expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub value: Value,
    pub expires_at: Option<u64>,
}

impl Item {
    /// Create an item without a TTL.
    pub fn persistent(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Create an item that expires at an absolute timestamp (ms since epoch).
    pub fn expiring(value: impl Into<Value>, expires_at_ms: u64) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at_ms),
        }
    }

    /// Returns true if the item has a TTL.
    pub fn has_ttl(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Returns true if the item carries a TTL that has elapsed at `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(at) if now_ms >= at)
    }

    /// Milliseconds left before expiry at `now_ms`.
    /// `None` when the item has no TTL, `Some(0)` once it has expired.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at.map(|at| at.saturating_sub(now_ms))
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_never_expires() {
        let item = Item::persistent("v");
        assert!(!item.has_ttl());
        assert!(!item.is_expired_at(u64::MAX));
        assert_eq!(item.remaining_ms(0), None);
    }

    #[test]
    fn test_expiring_boundary() {
        let item = Item::expiring("v", 1_000);
        assert!(!item.is_expired_at(999));
        assert!(item.is_expired_at(1_000));
        assert_eq!(item.remaining_ms(400), Some(600));
        assert_eq!(item.remaining_ms(5_000), Some(0));
    }
}
