//! Subscriber set with transition reporting

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::Mutex;

use super::SubscriberId;

/// One connected viewer session
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Session identifier, allocated by the transport layer
    pub id: SubscriberId,
    /// When the viewer connected
    pub connected_at: Instant,
}

/// Thread-safe set of connected subscribers
///
/// Identifiers are unique; re-adding an existing id is a no-op, as is
/// removing an absent one. Neither no-op ever reports a transition.
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Add a subscriber; returns true iff this was the 0→1 transition
    pub async fn add(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;

        if subscribers.contains_key(&id) {
            tracing::debug!(subscriber = id, "Subscriber already registered");
            return false;
        }

        let was_empty = subscribers.is_empty();
        subscribers.insert(
            id,
            Subscriber {
                id,
                connected_at: Instant::now(),
            },
        );

        tracing::info!(
            subscriber = id,
            subscribers = subscribers.len(),
            "Subscriber added"
        );

        was_empty
    }

    /// Remove a subscriber; returns true iff this was the 1→0 transition
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;

        if subscribers.remove(&id).is_none() {
            return false;
        }

        tracing::info!(
            subscriber = id,
            subscribers = subscribers.len(),
            "Subscriber removed"
        );

        subscribers.is_empty()
    }

    /// Current subscriber count
    pub async fn count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_and_last_transitions() {
        let registry = SubscriberRegistry::new();

        assert!(registry.add(1).await);
        assert!(!registry.add(2).await);
        assert_eq!(registry.count().await, 2);

        assert!(!registry.remove(1).await);
        assert!(registry.remove(2).await);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_noop() {
        let registry = SubscriberRegistry::new();

        assert!(registry.add(7).await);
        // Re-adding must not report another 0→1 transition
        assert!(!registry.add(7).await);
        assert_eq!(registry.count().await, 1);

        // A single remove empties the set
        assert!(registry.remove(7).await);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = SubscriberRegistry::new();

        assert!(!registry.remove(42).await);

        registry.add(1).await;
        assert!(!registry.remove(42).await);
        assert_eq!(registry.count().await, 1);
    }
}
