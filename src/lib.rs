//! picast: live camera streaming server for single-board devices
//!
//! Runs an external capture pipeline (libcamera/ffmpeg/raspivid) and relays
//! its raw output to any number of browser viewers over WebSockets. The
//! heart of the crate is the capture supervisor and the broadcast hub:
//!
//! ```text
//!   viewer ws ──┐                                  ┌─ libcamera-vid ─┐
//!   viewer ws ──┼── StreamController ── Supervisor ┤                 ├─ stdout
//!   viewer ws ──┘         │                        └─ ffmpeg ────────┘    │
//!                         │                                               │
//!                   SubscriberRegistry          BroadcastHub ◄────────────┘
//!                   (first → start,             (per-subscriber queues,
//!                    last → stop)                fire-and-forget fan-out)
//! ```
//!
//! Capture runs only while viewers are connected: the first subscriber
//! starts it, the last one out stops it. A crashed pipeline restarts itself
//! after a fixed backoff, re-probing the host for the best available
//! backend each time.

pub mod backend;
pub mod control;
pub mod error;
pub mod hub;
pub mod registry;
pub mod server;
pub mod supervisor;

pub use backend::{
    BackendKind, BackendSelector, CaptureBackend, Selector, SelectorConfig, StartOptions,
};
pub use control::{StreamController, StreamStatus};
pub use error::{Result, StreamError};
pub use hub::BroadcastHub;
pub use registry::{SubscriberId, SubscriberRegistry};
pub use server::{ServerConfig, StreamServer};
pub use supervisor::{CaptureSupervisor, SupervisorConfig, SupervisorState};
