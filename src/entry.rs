//! Loading cache entry with its expiration deadline.

use std::time::{Duration, Instant};

/// A cached value and the instant after which it is stale.
#[derive(Debug, Clone)]
pub(crate) struct LoadingItem<V> {
    pub(crate) value: V,

    /// Write time plus the configured TTL. `None` when that instant is not
    /// representable; such an entry never goes stale.
    pub(crate) expire: Option<Instant>,
}

impl<V> LoadingItem<V> {
    pub(crate) fn new(value: V, written_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            expire: written_at.checked_add(ttl),
        }
    }

    /// Stale once `now` reaches the deadline.
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        self.expire.map_or(false, |expire| now >= expire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_until_deadline() {
        let t0 = Instant::now();
        let item = LoadingItem::new("v", t0, Duration::from_secs(5));

        assert!(!item.is_expired_at(t0));
        assert!(!item.is_expired_at(t0 + Duration::from_millis(4_999)));
        assert!(item.is_expired_at(t0 + Duration::from_secs(5)));
        assert!(item.is_expired_at(t0 + Duration::from_secs(6)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        let t0 = Instant::now();
        let item = LoadingItem::new(1, t0, Duration::ZERO);
        assert!(item.is_expired_at(t0));
    }

    #[test]
    fn test_unrepresentable_deadline_never_expires() {
        let t0 = Instant::now();
        let item = LoadingItem::new(1, t0, Duration::MAX);
        assert!(item.expire.is_none());
        assert!(!item.is_expired_at(t0 + Duration::from_secs(365 * 24 * 3600)));
    }
}
