//! `SyncClient`, the application-facing side of the sync layer.
//!
//! Owns the core, the transport and the four routing components. Share it
//! through an `Arc` with the task running [`SyncClient::run`]:
//!
//! ```ignore
//! let (transport, inbound) = WsTransport::connect(url).await?;
//! let client = Arc::new(SyncClient::new(CanvasSystem::new(), transport, SyncConfig::default()));
//! tokio::spawn({
//!     let client = Arc::clone(&client);
//!     async move { client.run(inbound).await }
//! });
//! let joined = client.create_session().await?;
//! ```

use std::sync::Mutex;
use std::time::Duration;

use canvas_core::{
    Core, DocumentCommand, DocumentMaterial, Fragment, ObjectId, SessionCommand, SessionId,
    SessionSnapshot, SystemCommand, SystemEvent,
};
use tokio::sync::{broadcast, mpsc};

use crate::correlator::{CommandCorrelator, ReplyMode};
use crate::drain::drain_pending;
use crate::error::SyncError;
use crate::invalidation::{InvalidationHub, ListenerId};
use crate::lock;
use crate::router::{EventRouter, RouteOutcome, RoutedEvent};
use crate::session::SessionSnapshotHub;
use crate::transport::Transport;

/// Sync client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long a reply-expecting command may wait (None = forever)
    pub reply_timeout: Option<Duration>,
    /// Broadcast channel capacity for routed events
    pub event_capacity: usize,
    /// Log every submitted command as JSON
    pub log_commands: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reply_timeout: None,
            event_capacity: 256,
            log_commands: true,
        }
    }
}

pub struct SyncClient<C, T> {
    core: Mutex<C>,
    transport: T,
    correlator: CommandCorrelator,
    router: EventRouter,
    invalidation: InvalidationHub,
    sessions: SessionSnapshotHub,
    config: SyncConfig,
}

impl<C: Core, T: Transport> SyncClient<C, T> {
    pub fn new(core: C, transport: T, config: SyncConfig) -> Self {
        Self {
            core: Mutex::new(core),
            transport,
            correlator: CommandCorrelator::new(config.log_commands),
            router: EventRouter::new(config.event_capacity),
            invalidation: InvalidationHub::new(),
            sessions: SessionSnapshotHub::new(),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `f` with the core locked. Do not call back into the client from `f`.
    pub fn with_core<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        let core = lock(&self.core);
        f(&*core)
    }

    // ─── Session management (reply-expecting) ──────────

    pub async fn create_session(&self) -> Result<SystemEvent, SyncError> {
        self.request(SystemCommand::CreateSession).await
    }

    pub async fn join_session(&self, session_id: SessionId) -> Result<SystemEvent, SyncError> {
        self.request(SystemCommand::JoinSession { session_id }).await
    }

    pub async fn leave_session(&self) -> Result<SystemEvent, SyncError> {
        self.request(SystemCommand::LeaveSession).await
    }

    async fn request(&self, command: SystemCommand) -> Result<SystemEvent, SyncError> {
        let reply = self
            .correlator
            .submit(&self.core, &self.transport, &command, ReplyMode::Expect)?;
        // Expect always opens a slot
        let Some(reply) = reply else {
            return Err(SyncError::Abandoned);
        };
        self.correlator.wait(reply, self.config.reply_timeout).await
    }

    // ─── Drawing and document edits ────────────────────

    /// Send a fragment without waiting for its echo.
    pub fn send_fragment(&self, fragment: Fragment) -> Result<(), SyncError> {
        let command = SystemCommand::SessionCommand(SessionCommand::Fragment(fragment));
        self.correlator
            .submit(&self.core, &self.transport, &command, ReplyMode::FireAndForget)?;
        Ok(())
    }

    /// Apply a local document edit, notify invalidation listeners, then send
    /// whatever frames the core queued. Returns the number of frames sent.
    pub fn push_document_command(&self, command: DocumentCommand) -> Result<usize, SyncError> {
        lock(&self.core).push_local_document_mutation(command)?;
        self.invalidation.publish(&self.core);
        drain_pending(&self.core, &self.transport)
    }

    pub fn materialize_document(&self) -> DocumentMaterial {
        lock(&self.core).materialize_document()
    }

    pub fn materialize_session(&self) -> SessionSnapshot {
        lock(&self.core).materialize_session()
    }

    // ─── Listeners ─────────────────────────────────────

    pub fn add_invalidation_listener<F>(
        &self,
        object_id: impl Into<ObjectId>,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&ObjectId) + Send + Sync + 'static,
    {
        self.invalidation.add_listener(object_id, listener)
    }

    pub fn remove_invalidation_listener(&self, object_id: &ObjectId, listener: ListenerId) -> bool {
        self.invalidation.remove_listener(object_id, listener)
    }

    pub fn add_session_snapshot_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        self.sessions.add_listener(listener)
    }

    pub fn remove_session_snapshot_listener(&self, listener: ListenerId) -> bool {
        self.sessions.remove_listener(listener)
    }

    /// Every domain event routed from now on, own echoes included.
    pub fn subscribe(&self) -> broadcast::Receiver<RoutedEvent> {
        self.router.subscribe()
    }

    // ─── Inbound ───────────────────────────────────────

    pub fn route(&self, frame: &[u8]) -> RouteOutcome {
        self.router.route(
            frame,
            &self.core,
            &self.correlator,
            &self.invalidation,
            &self.sessions,
        )
    }

    /// Route inbound frames in arrival order until the stream ends.
    ///
    /// On exit every pending reply is abandoned, so no caller waits forever
    /// on a dead connection.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Vec<u8>>) {
        let mut routed = 0u64;
        while let Some(frame) = inbound.recv().await {
            self.route(&frame);
            routed += 1;
        }
        let abandoned = self.correlator.abandon_all();
        log::info!("Inbound stream closed after {routed} frame(s), {abandoned} reply(ies) abandoned");
    }

    /// Number of reply-expecting commands still awaiting a reply.
    pub fn pending_commands(&self) -> usize {
        self.correlator.pending_count()
    }
}
