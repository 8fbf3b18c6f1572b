//! Subscriber registry
//!
//! Tracks connected viewer sessions. The interesting part of the contract is
//! the transition reporting: `add` tells the caller whether this was the
//! 0→1 subscriber (capture should start), `remove` whether it was the 1→0
//! (capture should stop). The control plane acts on those signals; the
//! registry itself never touches the supervisor.

pub mod store;

pub use store::{Subscriber, SubscriberRegistry};

/// Opaque viewer session identifier
pub type SubscriberId = u64;
