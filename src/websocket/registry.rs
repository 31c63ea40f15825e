//! Canonical set of active channel subscriptions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::models::Subscription;

/// Source of truth for which channels the client should be subscribed to.
///
/// Keyed by canonical channel string with set semantics. The registry
/// survives transport loss; membership changes only through [`add`] and
/// [`remove`], so the supervisor can replay [`snapshot`] after each
/// reconnect.
///
/// [`add`]: SubscriptionRegistry::add
/// [`remove`]: SubscriptionRegistry::remove
/// [`snapshot`]: SubscriptionRegistry::snapshot
pub struct SubscriptionRegistry {
    inner: Mutex<BTreeMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Inserts `sub`. Returns `false` when the channel was already present
    /// (idempotent subscribe).
    pub fn add(&self, sub: Subscription) -> bool {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.insert(sub.channel().to_string(), sub).is_none()
    }

    /// Removes the entry for `channel`. Returns whether one was removed.
    pub fn remove(&self, channel: &str) -> bool {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.remove(channel).is_some()
    }

    /// Whether `channel` is currently subscribed.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.contains_key(channel)
    }

    /// All active subscriptions, in canonical-channel order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.values().cloned().collect()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry mutex poisoned").len()
    }

    /// Whether the registry holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandleInterval;

    #[test]
    fn add_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.add(Subscription::ticker("BTCUSDT")));
        assert!(!registry.add(Subscription::ticker("BTCUSDT")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_by_canonical_channel() {
        let registry = SubscriptionRegistry::new();
        let sub = Subscription::candle("ETHUSDT", CandleInterval::Min5);
        registry.add(sub.clone());

        assert!(registry.contains(sub.channel()));
        assert!(registry.remove(sub.channel()));
        assert!(!registry.remove(sub.channel()));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_ordered_and_detached() {
        let registry = SubscriptionRegistry::new();
        registry.add(Subscription::trade("SOLUSDT"));
        registry.add(Subscription::ticker("BTCUSDT"));

        let snapshot = registry.snapshot();
        let channels: Vec<&str> = snapshot.iter().map(|s| s.channel()).collect();
        let mut sorted = channels.clone();
        sorted.sort_unstable();
        assert_eq!(channels, sorted);

        // Mutating the registry does not affect an existing snapshot.
        registry.remove(snapshot[0].channel());
        assert_eq!(snapshot.len(), 2);
    }
}
