//! Command correlation: matching replies to the callers that asked.
//!
//! Every reply-expecting command gets a oneshot slot keyed by the command id
//! the core assigned at encode time. The router resolves the slot when a
//! `ByMyself` event with that id arrives. Fire-and-forget commands never get
//! a slot, so an echo of them finds nothing to resolve.
//!
//! ```text
//!  Created ──► Sent ──┬──► Resolved   (reply-expecting)
//!                     ├──► Rejected
//!                     └──► Fired      (fire-and-forget, terminal)
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use canvas_core::{CommandId, Core, SystemCommand, SystemError, SystemEvent};
use log::Level;
use tokio::sync::oneshot;

use crate::error::SyncError;
use crate::lock;
use crate::transport::Transport;

type Resolver = oneshot::Sender<Result<SystemEvent, SystemError>>;
type ReplyReceiver = oneshot::Receiver<Result<SystemEvent, SystemError>>;

/// Whether a submitted command waits for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Expect,
    FireAndForget,
}

/// Handle to the reply of one submitted command.
#[derive(Debug)]
pub struct PendingReply {
    command_id: CommandId,
    rx: ReplyReceiver,
}

impl PendingReply {
    pub fn command_id(&self) -> CommandId {
        self.command_id
    }
}

pub struct CommandCorrelator {
    /// Pending resolvers, keyed by command id
    pending: Mutex<HashMap<CommandId, Resolver>>,
    log_commands: bool,
}

impl CommandCorrelator {
    pub fn new(log_commands: bool) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            log_commands,
        }
    }

    /// Encode `command` through the core and send it.
    ///
    /// With [`ReplyMode::Expect`] a slot is registered before the frame is
    /// sent, so a reply routed on another task cannot overtake it. The id is
    /// read under the same core lock as the encode.
    pub fn submit<C, T>(
        &self,
        core: &Mutex<C>,
        transport: &T,
        command: &SystemCommand,
        mode: ReplyMode,
    ) -> Result<Option<PendingReply>, SyncError>
    where
        C: Core,
        T: Transport + ?Sized,
    {
        self.log_command(command);

        let (frame, command_id) = {
            let mut core = lock(core);
            let frame = core.encode_command(command)?;
            (frame, core.last_command_id())
        };

        let reply = match mode {
            ReplyMode::Expect => Some(self.register(command_id)?),
            ReplyMode::FireAndForget => None,
        };

        if let Err(e) = transport.send(frame) {
            if reply.is_some() {
                self.forget(command_id);
            }
            return Err(e.into());
        }
        log::trace!("Sent command {command_id} ({mode:?})");

        Ok(reply)
    }

    /// Open a resolution slot for `command_id`.
    pub fn register(&self, command_id: CommandId) -> Result<PendingReply, SyncError> {
        let mut pending = lock(&self.pending);
        if pending.contains_key(&command_id) {
            return Err(SyncError::DuplicateCommandId(command_id));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(command_id, tx);
        Ok(PendingReply { command_id, rx })
    }

    /// Settle the slot for `command_id`. Returns `false` if there was none.
    ///
    /// The slot is removed from the map before the result is delivered.
    pub fn resolve(&self, command_id: CommandId, result: Result<SystemEvent, SystemError>) -> bool {
        let Some(resolver) = lock(&self.pending).remove(&command_id) else {
            return false;
        };
        if resolver.send(result).is_err() {
            log::debug!("Reply to command {command_id} arrived after the caller stopped waiting");
        }
        true
    }

    /// Drop the slot for `command_id` without settling it.
    pub fn forget(&self, command_id: CommandId) -> bool {
        lock(&self.pending).remove(&command_id).is_some()
    }

    /// Drop every slot; waiting callers get [`SyncError::Abandoned`].
    pub fn abandon_all(&self) -> usize {
        let mut pending = lock(&self.pending);
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, command_id: CommandId) -> bool {
        lock(&self.pending).contains_key(&command_id)
    }

    /// Wait for the reply. `None` waits forever.
    pub async fn wait(
        &self,
        reply: PendingReply,
        timeout: Option<Duration>,
    ) -> Result<SystemEvent, SyncError> {
        let PendingReply { command_id, mut rx } = reply;
        let received = match timeout {
            None => rx.await,
            Some(limit) => match tokio::time::timeout(limit, &mut rx).await {
                Ok(received) => received,
                Err(_) => return self.expire(command_id, limit, rx).await,
            },
        };
        settle(received)
    }

    /// The timer fired. Only a slot still in the map has really timed out.
    async fn expire(
        &self,
        command_id: CommandId,
        limit: Duration,
        rx: ReplyReceiver,
    ) -> Result<SystemEvent, SyncError> {
        if self.forget(command_id) {
            log::warn!("Command {command_id} got no reply within {limit:?}");
            return Err(SyncError::ReplyTimeout { command_id });
        }
        // Settled between the timer firing and the removal. The resolver is
        // already out of the map, so it is sent or dropped without delay.
        log::debug!("Command {command_id} settled as its wait timed out");
        settle(rx.await)
    }

    fn log_command(&self, command: &SystemCommand) {
        if !self.log_commands {
            return;
        }
        // Fragments are high-frequency drawing traffic
        let level = if command.is_fragment() {
            Level::Debug
        } else {
            Level::Info
        };
        if !log::log_enabled!(level) {
            return;
        }
        match serde_json::to_string_pretty(command) {
            Ok(json) => log::log!(level, "{json}"),
            Err(e) => log::warn!("Failed to format command for logging: {e}"),
        }
    }
}

fn settle(
    received: Result<Result<SystemEvent, SystemError>, oneshot::error::RecvError>,
) -> Result<SystemEvent, SyncError> {
    match received {
        Ok(Ok(event)) => Ok(event),
        Ok(Err(error)) => Err(SyncError::CommandRejected(error)),
        Err(_) => Err(SyncError::Abandoned),
    }
}

impl Default for CommandCorrelator {
    fn default() -> Self {
        Self::new(true)
    }
}
