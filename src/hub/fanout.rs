//! Hub implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::registry::SubscriberId;

/// Default per-subscriber queue depth in chunks
const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default)]
pub struct HubStats {
    /// Chunks handed to the hub by the capture sink
    pub chunks_published: u64,
    /// Successful per-subscriber deliveries
    pub chunks_delivered: u64,
    /// Deliveries skipped because a subscriber queue was full or closed
    pub deliveries_skipped: u64,
}

/// Fan-out hub from the capture sink to subscriber queues
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Bytes>>>,
    sink_attached: AtomicBool,
    queue_depth: usize,
    chunks_published: AtomicU64,
    chunks_delivered: AtomicU64,
    deliveries_skipped: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with the default queue depth
    pub fn new() -> Self {
        Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
    }

    /// Create a hub with a custom per-subscriber queue depth
    pub fn with_queue_depth(queue_depth: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            sink_attached: AtomicBool::new(false),
            queue_depth,
            chunks_published: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            deliveries_skipped: AtomicU64::new(0),
        }
    }

    /// Mark the capture sink as attached
    ///
    /// Held true exactly while a capture session is active.
    pub fn attach(&self) {
        self.sink_attached.store(true, Ordering::Release);
        tracing::debug!("Capture sink attached");
    }

    /// Mark the capture sink as detached
    pub fn detach(&self) {
        if self.sink_attached.swap(false, Ordering::AcqRel) {
            tracing::debug!("Capture sink detached");
        }
    }

    /// Whether a capture sink is currently attached
    pub fn sink_attached(&self) -> bool {
        self.sink_attached.load(Ordering::Acquire)
    }

    /// Register a subscriber and return its chunk queue
    ///
    /// A subscriber starts receiving from the next published chunk onward;
    /// there is no replay of earlier data.
    pub async fn subscribe(&self, id: SubscriberId) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(id, tx);

        tracing::debug!(subscriber = id, fanout = subscribers.len(), "Hub subscriber added");
        rx
    }

    /// Deregister a subscriber
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = id, fanout = subscribers.len(), "Hub subscriber removed");
        }
    }

    /// Deliver one chunk to every currently subscribed queue
    ///
    /// Fire-and-forget per subscriber: a queue that cannot accept the chunk
    /// right now is skipped for this chunk only. Never blocks.
    pub async fn publish(&self, chunk: Bytes) {
        self.chunks_published.fetch_add(1, Ordering::Relaxed);

        let subscribers = self.subscribers.lock().await;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(chunk.clone()) {
                Ok(()) => {
                    self.chunks_delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.deliveries_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(subscriber = id, "Subscriber queue full, chunk skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Registry removes the id on disconnect; until then the
                    // closed queue is just skipped
                    self.deliveries_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(subscriber = id, "Subscriber queue closed, chunk skipped");
                }
            }
        }
    }

    /// Snapshot of delivery counters
    pub fn stats(&self) -> HubStats {
        HubStats {
            chunks_published: self.chunks_published.load(Ordering::Relaxed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            deliveries_skipped: self.deliveries_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fanout_exact_membership() {
        let hub = BroadcastHub::new();
        let mut rx1 = hub.subscribe(1).await;
        let mut rx2 = hub.subscribe(2).await;

        hub.publish(Bytes::from_static(b"alpha")).await;

        // Late joiner: must not see "alpha"
        let mut rx3 = hub.subscribe(3).await;
        hub.publish(Bytes::from_static(b"beta")).await;

        assert_eq!(rx1.recv().await.unwrap(), Bytes::from_static(b"alpha"));
        assert_eq!(rx1.recv().await.unwrap(), Bytes::from_static(b"beta"));
        assert_eq!(rx2.recv().await.unwrap(), Bytes::from_static(b"alpha"));
        assert_eq!(rx2.recv().await.unwrap(), Bytes::from_static(b"beta"));
        assert_eq!(rx3.recv().await.unwrap(), Bytes::from_static(b"beta"));
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_chunk_ordering() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe(1).await;

        for i in 0u8..10 {
            hub.publish(Bytes::copy_from_slice(&[i])).await;
        }

        for i in 0u8..10 {
            assert_eq!(rx.recv().await.unwrap(), Bytes::copy_from_slice(&[i]));
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_skipped_not_queued() {
        let hub = BroadcastHub::with_queue_depth(1);
        let mut slow = hub.subscribe(1).await;
        let mut fast = hub.subscribe(2).await;

        hub.publish(Bytes::from_static(b"one")).await;
        // Slow subscriber has not drained; its queue (depth 1) is full
        hub.publish(Bytes::from_static(b"two")).await;

        assert_eq!(fast.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(fast.recv().await.unwrap(), Bytes::from_static(b"two"));

        // Slow subscriber got only the first chunk
        assert_eq!(slow.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert!(slow.try_recv().is_err());

        let stats = hub.stats();
        assert_eq!(stats.chunks_published, 2);
        assert_eq!(stats.deliveries_skipped, 1);
    }

    #[tokio::test]
    async fn test_closed_subscriber_does_not_halt_fanout() {
        let hub = BroadcastHub::new();
        let rx1 = hub.subscribe(1).await;
        let mut rx2 = hub.subscribe(2).await;

        drop(rx1);
        hub.publish(Bytes::from_static(b"data")).await;

        assert_eq!(rx2.recv().await.unwrap(), Bytes::from_static(b"data"));
        assert_eq!(hub.stats().deliveries_skipped, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe(1).await;

        hub.publish(Bytes::from_static(b"one")).await;
        hub.unsubscribe(1).await;
        hub.publish(Bytes::from_static(b"two")).await;

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"one"));
        // Sender side is gone, so the queue terminates after the last chunk
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_attach_detach() {
        let hub = BroadcastHub::new();
        assert!(!hub.sink_attached());

        hub.attach();
        assert!(hub.sink_attached());

        hub.detach();
        assert!(!hub.sink_attached());

        // Idempotent
        hub.detach();
        assert!(!hub.sink_attached());
    }
}
