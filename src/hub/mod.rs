//! Broadcast hub for chunk fan-out
//!
//! The hub takes raw byte chunks from the active capture process and
//! delivers them to every currently subscribed viewer connection.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<BroadcastHub>
//!                  ┌──────────────────────────┐
//!                  │ subscribers: HashMap<    │
//!                  │   SubscriberId,          │
//!                  │   mpsc::Sender<Bytes>,   │
//!                  │ >                        │
//!                  └────────────┬─────────────┘
//!                               │
//!        ┌──────────────────────┼──────────────────────┐
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!   [capture stdout]      [Subscriber]            [Subscriber]
//!   publish(chunk)        chunk_rx.recv()         chunk_rx.recv()
//! ```
//!
//! Fan-out is an explicit per-subscriber map iterated on every chunk, so the
//! hub knows exactly which subscribers a given chunk went to. Each
//! subscriber owns a bounded queue; a queue that is full or closed is
//! skipped for that chunk and the data path moves on. `bytes::Bytes` keeps
//! the fan-out zero-copy: every queue holds a reference to the same chunk
//! allocation.

pub mod fanout;

pub use fanout::{BroadcastHub, HubStats};
