//! Wire types exchanged with the host repository.
//!
//! An [`ExportStack`] describes the commits the host handed over for
//! editing; an [`ImportStack`] is the ordered action list the engine hands
//! back to realize the edits. Both are plain serde values; the transport
//! that carries them is the host's concern.

pub mod export;
pub mod import;

pub use export::{ExportCommit, ExportFile, ExportStack, StackDate};
pub use import::{ImportAction, ImportCommit, ImportStack, Mark};
