//! Typed messages shared by both sides of the wire.
//!
//! Commands flow client → relay, identifiable events flow relay → client.
//! Every frame carries exactly one of these, bincode-encoded (see
//! [`crate::codec`]). The serde representation is externally tagged, so the
//! JSON view of a command looks like `{"JoinSession":{"session_id":7}}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ConnectionId = u16;
pub type SessionId = u32;
/// Correlation handle assigned by the core at encode time.
pub type CommandId = u32;
pub type TransactionId = Uuid;

/// Opaque name of an invalidatable unit of shared state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id (UUID v4 text).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single drawn line segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Fragment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Full participant roster of a session. Never a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub connections: Vec<ConnectionId>,
}

impl SessionSnapshot {
    pub fn new(connections: Vec<ConnectionId>) -> Self {
        Self { connections }
    }
}

/// Command envelope sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiableCommand {
    pub command_id: CommandId,
    pub system_command: SystemCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemCommand {
    CreateSession,
    JoinSession { session_id: SessionId },
    LeaveSession,
    SessionCommand(SessionCommand),
}

impl SystemCommand {
    /// Fragments are the high-frequency drawing traffic.
    pub fn is_fragment(&self) -> bool {
        matches!(self, Self::SessionCommand(SessionCommand::Fragment(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    Fragment(Fragment),
    Transaction(Transaction),
}

/// Inbound event, tagged by origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentifiableEvent {
    /// Reply to a command this client issued.
    ByMyself {
        command_id: CommandId,
        result: CommandResult,
    },
    /// Originated elsewhere (another participant or the relay itself).
    BySystem { system_event: SystemEvent },
}

impl IdentifiableEvent {
    /// The embedded domain event, from either arm. `None` for error replies.
    pub fn system_event(&self) -> Option<&SystemEvent> {
        match self {
            Self::BySystem { system_event } => Some(system_event),
            Self::ByMyself {
                result: CommandResult::SystemEvent(system_event),
                ..
            } => Some(system_event),
            Self::ByMyself {
                result: CommandResult::Error(_),
                ..
            } => None,
        }
    }

    pub fn into_system_event(self) -> Option<SystemEvent> {
        match self {
            Self::BySystem { system_event }
            | Self::ByMyself {
                result: CommandResult::SystemEvent(system_event),
                ..
            } => Some(system_event),
            Self::ByMyself { .. } => None,
        }
    }

    pub fn command_id(&self) -> Option<CommandId> {
        match self {
            Self::ByMyself { command_id, .. } => Some(*command_id),
            Self::BySystem { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandResult {
    SystemEvent(SystemEvent),
    Error(SystemError),
}

impl From<CommandResult> for Result<SystemEvent, SystemError> {
    fn from(result: CommandResult) -> Self {
        match result {
            CommandResult::SystemEvent(event) => Ok(event),
            CommandResult::Error(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemEvent {
    Connected {
        connection_id: ConnectionId,
    },
    JoinedSession {
        session_id: SessionId,
        #[serde(default)]
        initial_state: SessionSnapshot,
        #[serde(default)]
        document_snapshot: DocumentSnapshot,
    },
    LeftSession,
    SessionEvent(SessionEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    Fragment(Fragment),
    SomeoneJoined(ConnectionId),
    SomeoneLeft(ConnectionId),
    SessionStateChanged(SessionSnapshot),
    TransactionAck(TransactionId),
    TransactionNack(TransactionId, RollbackReason),
    OthersTransaction(Transaction),
}

/// Domain-level failure for one command. Opaque to the sync layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum SystemError {
    #[error("invalid session id")]
    InvalidSessionId,
    #[error("not in a session")]
    NotInSession,
    #[error("fatal: {reason}")]
    FatalError { reason: String },
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackReason {
    Conflict,
    Invalid,
}

/// Local edit to the shared document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentCommand {
    UpdateDocumentTitle { title: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropKind {
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropKey(pub ObjectId, pub PropKind);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    String(String),
    Float(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentMutation {
    CreateObject(ObjectId, ObjectKind),
    UpdateObject(PropKey, PropValue),
    DeleteObject(ObjectId),
}

impl DocumentMutation {
    pub fn object_id(&self) -> &ObjectId {
        match self {
            Self::CreateObject(id, _) | Self::DeleteObject(id) => id,
            Self::UpdateObject(PropKey(id, _), _) => id,
        }
    }
}

/// Atomic batch of document mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub items: Vec<DocumentMutation>,
}

impl Transaction {
    pub fn new(items: Vec<DocumentMutation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            items,
        }
    }
}

/// Committed document state handed to a joining client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// `None` means "let the replica pick an id".
    pub document_id: Option<ObjectId>,
    pub string_props: Vec<(PropKey, String)>,
    pub float_props: Vec<(PropKey, f32)>,
}

/// Read-only view of the document for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMaterial {
    pub id: ObjectId,
    pub title: String,
}
