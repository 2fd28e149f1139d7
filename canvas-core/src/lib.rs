//! # canvas-core: Messages and client core for realtime-canvas
//!
//! Everything that crosses the wire, and the replica that interprets it.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!  commands ─┤  codec (bincode frames)      ├─► relay
//!            └──────────────┬───────────────┘
//!                           │ IdentifiableEvent
//!                           ▼
//!            ┌──────────────────────────────┐
//!            │  CanvasSystem (impl Core)    │
//!            │   ├── ReplicaDocument        │
//!            │   └── SessionSnapshot        │
//!            └──────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`message`]: Typed commands, events and document values
//! - [`codec`]: Binary wire codec plus JSON views
//! - [`core`]: The `Core` contract driven by `canvas-sync`
//! - [`document`]: Optimistic document replica
//! - [`system`]: `CanvasSystem`, the shipped `Core` implementation

pub mod codec;
pub mod core;
pub mod document;
pub mod message;
pub mod system;

pub use codec::CodecError;
pub use crate::core::{Core, CoreError};
pub use document::{DocumentStorage, ReplicaDocument};
pub use message::{
    CommandId, CommandResult, ConnectionId, DocumentCommand, DocumentMaterial, DocumentMutation,
    DocumentSnapshot, Fragment, IdentifiableCommand, IdentifiableEvent, ObjectId, ObjectKind,
    PropKey, PropKind, PropValue, RollbackReason, SessionCommand, SessionEvent, SessionId,
    SessionSnapshot, SystemCommand, SystemError, SystemEvent, Transaction, TransactionId,
};
pub use system::CanvasSystem;
