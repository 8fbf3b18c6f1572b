//! Capture process supervisor
//!
//! Owns the lifecycle of exactly one external capture pipeline at a time.
//! The state machine is
//!
//! ```text
//! Idle → Starting → Running → Stopping → Idle
//!                      │
//!                      └→ Crashed → (backoff) → Starting | Idle
//! ```
//!
//! A spawn failure surfaces to the caller and goes straight back to `Idle`.
//! An unsolicited nonzero exit enters `Crashed` and schedules a restart
//! after a fixed backoff, re-selecting the backend each time; the restart
//! timer is cancelled if `stop()` arrives first. A zero exit, a signal
//! kill, or a supervisor-requested stop is terminal, with no restart.

pub mod core;
pub mod pipeline;
pub mod state;

pub use self::core::{CaptureSupervisor, SupervisorConfig};
pub use state::{CaptureSession, SupervisorState};
