//! `CanvasSystem`, the client-side core.
//!
//! Owns the command id source, the document replica and the session roster.
//! Inbound frames mutate it through [`Core::apply_inbound_frame`]; what
//! changed is reported through the two drain calls:
//!
//! - document objects → [`Core::drain_invalidated_object_ids`] (pull: the
//!   consumer re-materializes)
//! - roster → [`Core::drain_changed_session_snapshot`] (push: the full
//!   snapshot is handed out)
//!
//! Outside a session, local document edits land in a leader document and
//! produce no network traffic. Inside a session they are applied
//! optimistically and queued as `Transaction` session commands.

use std::collections::{BTreeSet, VecDeque};
use std::num::Wrapping;

use crate::codec::{self, CodecError};
use crate::core::{Core, CoreError};
use crate::document::ReplicaDocument;
use crate::message::{
    CommandId, CommandResult, ConnectionId, DocumentCommand, DocumentMaterial, IdentifiableCommand,
    IdentifiableEvent, ObjectId, SessionCommand, SessionEvent, SessionId, SessionSnapshot,
    SystemCommand, SystemEvent,
};

/// Replica state that exists only while joined to a session.
#[derive(Debug)]
struct SessionState {
    session_id: SessionId,
    snapshot: SessionSnapshot,
    document: ReplicaDocument,
}

pub struct CanvasSystem {
    command_id_source: Wrapping<CommandId>,
    connection_id: Option<ConnectionId>,
    local_document: ReplicaDocument,
    session: Option<SessionState>,
    invalidated_object_ids: BTreeSet<ObjectId>,
    session_snapshot_changed: bool,
    pending_outbound: VecDeque<Vec<u8>>,
}

impl CanvasSystem {
    pub fn new() -> Self {
        Self {
            command_id_source: Wrapping(0),
            connection_id: None,
            local_document: ReplicaDocument::default(),
            session: None,
            invalidated_object_ids: BTreeSet::new(),
            session_snapshot_changed: false,
            pending_outbound: VecDeque::new(),
        }
    }

    /// Connection id announced by the relay, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.session_id)
    }

    /// Number of local transactions awaiting ack.
    pub fn pending_transactions(&self) -> usize {
        self.document().pending_len()
    }

    fn new_command_id(&mut self) -> CommandId {
        self.command_id_source += Wrapping(1);
        // 0 is never handed out, even after wrapping
        if self.command_id_source.0 == 0 {
            self.command_id_source += Wrapping(1);
        }
        self.command_id_source.0
    }

    fn document(&self) -> &ReplicaDocument {
        match &self.session {
            Some(session) => &session.document,
            None => &self.local_document,
        }
    }

    fn invalidate(&mut self, ids: impl IntoIterator<Item = ObjectId>) {
        self.invalidated_object_ids.extend(ids);
    }

    fn handle_system_event(&mut self, event: SystemEvent) -> Result<(), CoreError> {
        match event {
            SystemEvent::Connected { connection_id } => {
                log::info!("Connected as {connection_id}");
                self.connection_id = Some(connection_id);
            }
            SystemEvent::JoinedSession {
                session_id,
                initial_state,
                document_snapshot,
            } => {
                log::info!("Joined session {session_id}");
                let document = ReplicaDocument::new(document_snapshot);
                let document_id = document.document_id().clone();
                self.session = Some(SessionState {
                    session_id,
                    snapshot: initial_state,
                    document,
                });
                self.invalidate([document_id]);
                self.session_snapshot_changed = true;
            }
            SystemEvent::LeftSession => {
                if let Some(session) = self.session.take() {
                    log::info!("Left session {}", session.session_id);
                    let local_id = self.local_document.document_id().clone();
                    self.invalidate([session.document.document_id().clone(), local_id]);
                    self.session_snapshot_changed = true;
                }
            }
            SystemEvent::SessionEvent(event) => self.handle_session_event(event)?,
        }
        Ok(())
    }

    fn handle_session_event(&mut self, event: SessionEvent) -> Result<(), CoreError> {
        let session = self.session.as_mut().ok_or(CoreError::NotInSession)?;
        let invalidated = match event {
            SessionEvent::Fragment(fragment) => {
                log::trace!("Fragment: {fragment:?}");
                BTreeSet::new()
            }
            SessionEvent::SomeoneJoined(connection_id) => {
                if !session.snapshot.connections.contains(&connection_id) {
                    session.snapshot.connections.push(connection_id);
                }
                self.session_snapshot_changed = true;
                BTreeSet::new()
            }
            SessionEvent::SomeoneLeft(connection_id) => {
                session.snapshot.connections.retain(|c| *c != connection_id);
                self.session_snapshot_changed = true;
                BTreeSet::new()
            }
            SessionEvent::SessionStateChanged(snapshot) => {
                session.snapshot = snapshot;
                self.session_snapshot_changed = true;
                BTreeSet::new()
            }
            SessionEvent::TransactionAck(tx_id) => session.document.ack(&tx_id)?,
            SessionEvent::TransactionNack(tx_id, reason) => {
                log::warn!("Transaction {tx_id} rejected: {reason:?}");
                session.document.nack(&tx_id)?
            }
            SessionEvent::OthersTransaction(tx) => session.document.apply_remote(&tx),
        };
        self.invalidate(invalidated);
        Ok(())
    }
}

impl Default for CanvasSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Core for CanvasSystem {
    fn encode_command(&mut self, command: &SystemCommand) -> Result<Vec<u8>, CoreError> {
        let command_id = self.new_command_id();
        let frame = codec::encode_command(&IdentifiableCommand {
            command_id,
            system_command: command.clone(),
        })?;
        Ok(frame)
    }

    fn last_command_id(&self) -> CommandId {
        self.command_id_source.0
    }

    fn decode_event(&self, frame: &[u8]) -> Result<IdentifiableEvent, CodecError> {
        codec::decode_event(frame)
    }

    fn apply_inbound_frame(&mut self, frame: &[u8]) -> Result<(), CoreError> {
        match codec::decode_event(frame)? {
            IdentifiableEvent::BySystem { system_event }
            | IdentifiableEvent::ByMyself {
                result: CommandResult::SystemEvent(system_event),
                ..
            } => self.handle_system_event(system_event),
            IdentifiableEvent::ByMyself {
                command_id,
                result: CommandResult::Error(error),
            } => {
                log::debug!("Command {command_id} failed: {error}");
                Ok(())
            }
        }
    }

    fn materialize_document(&self) -> DocumentMaterial {
        self.document().materialize()
    }

    fn materialize_session(&self) -> SessionSnapshot {
        self.session
            .as_ref()
            .map(|s| s.snapshot.clone())
            .unwrap_or_default()
    }

    fn drain_invalidated_object_ids(&mut self) -> Vec<ObjectId> {
        log::trace!("Objects being invalidated: {:?}", self.invalidated_object_ids);
        std::mem::take(&mut self.invalidated_object_ids)
            .into_iter()
            .collect()
    }

    fn drain_changed_session_snapshot(&mut self) -> Option<SessionSnapshot> {
        if !std::mem::take(&mut self.session_snapshot_changed) {
            return None;
        }
        Some(self.materialize_session())
    }

    fn push_local_document_mutation(&mut self, command: DocumentCommand) -> Result<(), CoreError> {
        if !self.invalidated_object_ids.is_empty() {
            log::warn!("Invalidated object ids must be drained after each command");
        }

        if self.session.is_none() {
            let tx = self.local_document.transaction_for(command);
            let invalidated = self.local_document.apply_remote(&tx);
            self.invalidate(invalidated);
            return Ok(());
        }

        let command_id = self.new_command_id();
        let session = self.session.as_mut().ok_or(CoreError::NotInSession)?;
        let tx = session.document.transaction_for(command);
        let frame = codec::encode_command(&IdentifiableCommand {
            command_id,
            system_command: SystemCommand::SessionCommand(SessionCommand::Transaction(tx.clone())),
        })?;
        let invalidated = session.document.begin(tx);
        self.invalidate(invalidated);
        self.pending_outbound.push_back(frame);
        Ok(())
    }

    fn drain_next_pending_outbound_frame(&mut self) -> Option<Vec<u8>> {
        self.pending_outbound.pop_front()
    }

    fn requeue_pending_outbound_frame(&mut self, frame: Vec<u8>) {
        self.pending_outbound.push_front(frame);
    }
}
