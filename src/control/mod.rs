//! Control-plane dispatcher
//!
//! Translates session events from the transport layer into calls against
//! the registry, hub, and supervisor: first subscriber starts capture, last
//! unsubscribe stops it, and explicit start/stop requests from any connected
//! client are honored on top of that. Also serves the read-only status
//! snapshot.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::backend::{Selector, StartOptions};
use crate::error::{Result, StreamError};
use crate::hub::BroadcastHub;
use crate::registry::{SubscriberId, SubscriberRegistry};
use crate::supervisor::CaptureSupervisor;

/// Read-only status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    /// Whether a capture session is starting or running
    pub streaming: bool,
    /// Connected subscriber count
    pub clients: usize,
    /// Whether camera hardware is visible right now
    pub camera: bool,
}

/// Dispatcher wiring the registry, hub, supervisor, and selector together
pub struct StreamController {
    registry: SubscriberRegistry,
    hub: Arc<BroadcastHub>,
    supervisor: Arc<CaptureSupervisor>,
    selector: Arc<dyn Selector>,
}

impl StreamController {
    /// Create a controller over an existing hub/supervisor/selector
    pub fn new(
        hub: Arc<BroadcastHub>,
        supervisor: Arc<CaptureSupervisor>,
        selector: Arc<dyn Selector>,
    ) -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            hub,
            supervisor,
            selector,
        }
    }

    /// Register a new viewer and hand back its chunk queue
    ///
    /// On the 0→1 subscriber transition capture is started. A selection or
    /// launch failure is returned alongside the queue so the transport can
    /// report it to this client only; the viewer stays subscribed and will
    /// receive video as soon as a later start succeeds.
    pub async fn connect(&self, id: SubscriberId) -> (mpsc::Receiver<Bytes>, Option<StreamError>) {
        let rx = self.hub.subscribe(id).await;
        let first = self.registry.add(id).await;

        let start_error = if first {
            tracing::info!(subscriber = id, "First subscriber, starting capture");
            self.start_capture(StartOptions::default()).await.err()
        } else {
            None
        };

        (rx, start_error)
    }

    /// Remove a viewer; the last one out stops capture
    pub async fn disconnect(&self, id: SubscriberId) {
        self.hub.unsubscribe(id).await;
        let last = self.registry.remove(id).await;

        if last {
            tracing::info!(subscriber = id, "Last subscriber left, stopping capture");
            self.supervisor.stop().await;
        }
    }

    /// Explicit start request from a connected client
    ///
    /// A no-op if capture is already starting or running.
    pub async fn request_start(&self, opts: StartOptions) -> Result<()> {
        if self.supervisor.is_active().await {
            tracing::debug!("Start requested while streaming, ignoring");
            return Ok(());
        }
        self.start_capture(opts).await
    }

    /// Explicit stop request
    ///
    /// Stops capture regardless of how many subscribers remain connected.
    /// Subscribers are not removed; a later start request (or a fresh first
    /// subscriber) re-probes and restarts, and existing subscribers resume
    /// receiving without re-subscribing.
    pub async fn request_stop(&self) {
        tracing::info!("Stop requested");
        self.supervisor.stop().await;
    }

    /// Status snapshot for the transport and the status endpoint
    pub async fn status(&self) -> StreamStatus {
        StreamStatus {
            streaming: self.supervisor.is_active().await,
            clients: self.registry.count().await,
            camera: self.selector.camera_present(),
        }
    }

    async fn start_capture(&self, opts: StartOptions) -> Result<()> {
        let backend = self.selector.select(opts)?;
        self.supervisor.start(backend, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, CaptureBackend, CommandSpec, StreamFormat};
    use crate::supervisor::SupervisorConfig;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn test_backend(program: &str, args: &[&str]) -> CaptureBackend {
        CaptureBackend {
            kind: BackendKind::LegacyCapture,
            pipeline: vec![CommandSpec::new(program, args.iter().copied())],
            format: StreamFormat::H264Elementary,
        }
    }

    /// Selector yielding a fixed sequence of backends (last repeats), or
    /// always failing when empty
    struct ScriptedSelector {
        backends: Mutex<Vec<CaptureBackend>>,
        camera: bool,
    }

    impl ScriptedSelector {
        fn streaming() -> Arc<Self> {
            Arc::new(Self {
                backends: Mutex::new(vec![test_backend("yes", &[])]),
                camera: true,
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                backends: Mutex::new(vec![]),
                camera: false,
            })
        }

        fn sequence(backends: Vec<CaptureBackend>) -> Arc<Self> {
            Arc::new(Self {
                backends: Mutex::new(backends),
                camera: true,
            })
        }
    }

    impl Selector for ScriptedSelector {
        fn select(&self, _opts: StartOptions) -> Result<CaptureBackend> {
            let mut backends = self.backends.lock().unwrap();
            if backends.len() > 1 {
                Ok(backends.remove(0))
            } else {
                backends
                    .first()
                    .cloned()
                    .ok_or(StreamError::NoCameraAvailable)
            }
        }

        fn camera_present(&self) -> bool {
            self.camera
        }
    }

    fn controller(selector: Arc<ScriptedSelector>, backoff: Duration) -> StreamController {
        let hub = Arc::new(BroadcastHub::new());
        let supervisor = Arc::new(CaptureSupervisor::new(
            Arc::clone(&hub),
            selector.clone() as Arc<dyn Selector>,
            SupervisorConfig::default().restart_backoff(backoff),
        ));
        StreamController::new(hub, supervisor, selector)
    }

    async fn wait_until_streaming(controller: &StreamController, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if controller.status().await.streaming {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_first_subscriber_starts_capture() {
        let ctl = controller(ScriptedSelector::streaming(), Duration::from_secs(5));

        let (mut rx, err) = ctl.connect(1).await;
        assert!(err.is_none());

        let status = ctl.status().await;
        assert!(status.streaming);
        assert_eq!(status.clients, 1);
        assert!(status.camera);

        // Video flows to the subscriber without further requests
        let chunk = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no chunk")
            .expect("queue closed");
        assert!(!chunk.is_empty());

        ctl.request_stop().await;
    }

    #[tokio::test]
    async fn test_last_unsubscribe_stops_capture() {
        let ctl = controller(ScriptedSelector::streaming(), Duration::from_secs(5));

        let (_rx1, _) = ctl.connect(1).await;
        let (_rx2, _) = ctl.connect(2).await;
        assert!(ctl.status().await.streaming);

        ctl.disconnect(1).await;
        assert!(ctl.status().await.streaming);
        assert_eq!(ctl.status().await.clients, 1);

        ctl.disconnect(2).await;
        let status = ctl.status().await;
        assert!(!status.streaming);
        assert_eq!(status.clients, 0);
    }

    #[tokio::test]
    async fn test_no_camera_reported_to_requester_only() {
        let ctl = controller(ScriptedSelector::unavailable(), Duration::from_secs(5));

        let (_rx, err) = ctl.connect(1).await;
        assert!(matches!(err, Some(StreamError::NoCameraAvailable)));

        // Subscriber stays connected; no capture session exists
        let status = ctl.status().await;
        assert_eq!(status.clients, 1);
        assert!(!status.streaming);
        assert!(!status.camera);

        // Explicit retry fails the same way, with the client still counted
        assert!(matches!(
            ctl.request_start(StartOptions::default()).await,
            Err(StreamError::NoCameraAvailable)
        ));
        assert_eq!(ctl.status().await.clients, 1);
    }

    #[tokio::test]
    async fn test_start_request_noop_while_streaming() {
        let ctl = controller(ScriptedSelector::streaming(), Duration::from_secs(5));

        let (_rx, _) = ctl.connect(1).await;
        assert!(ctl.status().await.streaming);

        // Any connected client may ask again; nothing changes
        ctl.request_start(StartOptions::default()).await.unwrap();
        assert!(ctl.status().await.streaming);

        ctl.request_stop().await;
    }

    #[tokio::test]
    async fn test_stop_override_keeps_subscribers() {
        let ctl = controller(ScriptedSelector::streaming(), Duration::from_secs(5));

        let (_rx1, _) = ctl.connect(1).await;
        let (_rx2, _) = ctl.connect(2).await;

        ctl.request_stop().await;
        let status = ctl.status().await;
        assert!(!status.streaming);
        assert_eq!(status.clients, 2);

        // Explicit restart re-probes and resumes
        ctl.request_start(StartOptions::default()).await.unwrap();
        assert!(ctl.status().await.streaming);

        ctl.request_stop().await;
    }

    #[tokio::test]
    async fn test_crash_recovery_with_connected_subscribers() {
        // First backend crashes immediately, the re-selected one streams
        let selector = ScriptedSelector::sequence(vec![
            test_backend("false", &[]),
            test_backend("yes", &[]),
        ]);
        let ctl = controller(selector, Duration::from_millis(40));

        let (mut rx1, err) = ctl.connect(1).await;
        assert!(err.is_none());
        let (mut rx2, _) = ctl.connect(2).await;

        assert!(wait_until_streaming(&ctl, Duration::from_secs(3)).await);
        assert_eq!(ctl.status().await.clients, 2);

        // Both subscribers receive chunks with no re-subscribe
        for rx in [&mut rx1, &mut rx2] {
            let chunk = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("no chunk after recovery")
                .expect("queue closed");
            assert!(!chunk.is_empty());
        }

        ctl.request_stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_connect_does_not_double_count() {
        let ctl = controller(ScriptedSelector::streaming(), Duration::from_secs(5));

        let (_rx1, _) = ctl.connect(1).await;
        let (_rx2, _) = ctl.connect(1).await;
        assert_eq!(ctl.status().await.clients, 1);

        ctl.disconnect(1).await;
        let status = ctl.status().await;
        assert_eq!(status.clients, 0);
        assert!(!status.streaming);
    }
}
