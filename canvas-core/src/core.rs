//! The operation contract the synchronization layer drives.
//!
//! The sync layer treats the core as opaque: it never inspects replica
//! state directly, only through these calls. [`crate::CanvasSystem`] is the
//! implementation shipped with this crate.

use thiserror::Error;

use crate::codec::CodecError;
use crate::message::{
    CommandId, DocumentCommand, DocumentMaterial, IdentifiableEvent, ObjectId, SessionSnapshot,
    SystemCommand, TransactionId,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TransactionId),
    #[error("Not in a session")]
    NotInSession,
}

pub trait Core {
    /// Encode a command into a wire frame, assigning it a fresh command id.
    fn encode_command(&mut self, command: &SystemCommand) -> Result<Vec<u8>, CoreError>;

    /// The id assigned by the most recent encode.
    fn last_command_id(&self) -> CommandId;

    fn decode_event(&self, frame: &[u8]) -> Result<IdentifiableEvent, CodecError>;

    /// Apply an inbound frame to the replica.
    fn apply_inbound_frame(&mut self, frame: &[u8]) -> Result<(), CoreError>;

    fn materialize_document(&self) -> DocumentMaterial;

    fn materialize_session(&self) -> SessionSnapshot;

    /// Ids invalidated since the last drain. Empties the set.
    fn drain_invalidated_object_ids(&mut self) -> Vec<ObjectId>;

    /// The roster, if it changed since the last drain.
    fn drain_changed_session_snapshot(&mut self) -> Option<SessionSnapshot>;

    /// Apply a local document edit directly, queueing any frames the edit
    /// must send to the network.
    fn push_local_document_mutation(&mut self, command: DocumentCommand) -> Result<(), CoreError>;

    fn drain_next_pending_outbound_frame(&mut self) -> Option<Vec<u8>>;

    /// Put back a drained frame that could not be sent. It becomes the next
    /// frame drained.
    fn requeue_pending_outbound_frame(&mut self, frame: Vec<u8>);
}
