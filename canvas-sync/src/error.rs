use canvas_core::{CommandId, CoreError, SystemError};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced to callers of the sync layer.
///
/// Only `CommandRejected` reflects the relay's answer; the rest are local
/// failures of the caller's own submission or wait.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Command rejected: {0}")]
    CommandRejected(SystemError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("No reply to command {command_id} before timeout")]
    ReplyTimeout { command_id: CommandId },
    #[error("Reply abandoned: client shut down")]
    Abandoned,
    #[error("Command id {0} already has a pending reply")]
    DuplicateCommandId(CommandId),
}
