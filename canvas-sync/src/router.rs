//! Routing of inbound frames.
//!
//! One frame in, in transport order:
//!
//! ```text
//!  frame ─► decode ─┬─ undecodable ──────────────► dropped (warn)
//!                   │
//!                   ├─ has domain event ─► core.apply ─► invalidation pass
//!                   │                                ─► roster pass
//!                   │                                ─► event broadcast
//!                   │
//!                   └─ ByMyself + pending slot ──► correlator.resolve (last)
//! ```
//!
//! A `ByMyself` event with no pending slot is normal: fire-and-forget
//! commands (fragments) are echoed back tagged with their id.

use std::sync::Mutex;

use canvas_core::{CommandId, Core, IdentifiableEvent, SystemError, SystemEvent};
use tokio::sync::broadcast;

use crate::correlator::CommandCorrelator;
use crate::invalidation::InvalidationHub;
use crate::lock;
use crate::session::SessionSnapshotHub;

/// Who caused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Reply or echo for a command this client sent.
    Myself(CommandId),
    /// Another participant or the relay.
    System,
}

/// A domain event as delivered to broadcast subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub origin: Origin,
    pub event: SystemEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The frame could not be decoded.
    Dropped,
    Routed {
        origin: Origin,
        /// Whether a pending reply was settled by this frame.
        correlated: bool,
    },
}

pub struct EventRouter {
    events: broadcast::Sender<RoutedEvent>,
}

impl EventRouter {
    /// `capacity` bounds how far a slow subscriber may lag before it starts
    /// missing events.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoutedEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Route one inbound frame. Never fails: problems are logged and the
    /// frame is dropped or partially applied.
    pub fn route<C: Core>(
        &self,
        frame: &[u8],
        core: &Mutex<C>,
        correlator: &CommandCorrelator,
        invalidation: &InvalidationHub,
        sessions: &SessionSnapshotHub,
    ) -> RouteOutcome {
        let decoded = lock(core).decode_event(frame);
        let event = match decoded {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Dropping undecodable frame ({} bytes): {e}", frame.len());
                return RouteOutcome::Dropped;
            }
        };

        let (origin, reply): (Origin, Option<Result<SystemEvent, SystemError>>) = match &event {
            IdentifiableEvent::ByMyself { command_id, result } => {
                (Origin::Myself(*command_id), Some(result.clone().into()))
            }
            IdentifiableEvent::BySystem { .. } => (Origin::System, None),
        };

        if let Some(system_event) = event.into_system_event() {
            let applied = lock(core).apply_inbound_frame(frame);
            if let Err(e) = applied {
                log::warn!("Failed to apply {system_event:?}: {e}");
            }
            invalidation.publish(core);
            sessions.publish(core);

            // No subscribers is fine
            let _ = self.events.send(RoutedEvent {
                origin,
                event: system_event,
            });
        }

        // Settled last: a woken caller must see the replica with this frame applied
        let correlated = match (origin, reply) {
            (Origin::Myself(command_id), Some(result)) => {
                let correlated = correlator.resolve(command_id, result);
                if !correlated {
                    log::trace!("No pending reply for command {command_id}");
                }
                correlated
            }
            _ => false,
        };

        RouteOutcome::Routed { origin, correlated }
    }
}
