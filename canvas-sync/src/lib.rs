//! # canvas-sync: Command/event synchronization for realtime-canvas
//!
//! Correlates outbound commands with their replies and fans inbound events
//! out to the UI.
//!
//! ## Architecture
//!
//! ```text
//!   UI ──► SyncClient ──► CommandCorrelator ──► Core::encode ──► Transport ──► relay
//!                │                ▲
//!                │                │ resolve / reject
//!                ▼                │
//!        push_document_command    │
//!          └► Core ─► Drain ─► Transport
//!
//!  relay ──► Transport ──► SyncClient::run ──► EventRouter
//!                                                ├─► Core::apply
//!                                                ├─► InvalidationHub   (ids, pull)
//!                                                ├─► SessionSnapshotHub (roster, push)
//!                                                └─► broadcast::<RoutedEvent>
//! ```
//!
//! ## Modules
//!
//! - [`correlator`]: Pending replies keyed by command id
//! - [`router`]: Inbound frame routing and event broadcast
//! - [`invalidation`]: Per-object invalidation listeners
//! - [`session`]: Session roster listeners
//! - [`drain`]: Flushing core-queued outbound frames
//! - [`client`]: The `SyncClient` facade
//! - [`transport`]: In-memory and WebSocket transports

pub mod client;
pub mod correlator;
pub mod drain;
pub mod error;
pub mod invalidation;
pub mod router;
pub mod session;
pub mod transport;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use client::{SyncClient, SyncConfig};
pub use correlator::{CommandCorrelator, PendingReply, ReplyMode};
pub use drain::drain_pending;
pub use error::SyncError;
pub use invalidation::{InvalidationHub, InvalidationListener, ListenerId};
pub use router::{EventRouter, Origin, RouteOutcome, RoutedEvent};
pub use session::{SessionSnapshotHub, SessionSnapshotListener};
pub use transport::{ChannelTransport, ConnectionState, Transport, TransportError, WsTransport};

/// A panicking listener must not wedge the client.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
