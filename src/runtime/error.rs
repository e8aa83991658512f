use thiserror::Error;

use super::{codelet::AccessMode, handle::HandleId};
use crate::num::DataType;

/// Recoverable failures of the task runtime, surfaced synchronously at the
/// call that caused them. Invariant violations inside the engine are defects
/// and panic instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("codelet {0} is not registered")]
    UnknownCodelet(String),
    #[error("codelet {name} has no {dtype} implementation on an enabled backend")]
    Unsupported { name: String, dtype: DataType },
    #[error("codelet {name} declares {expect} buffers, got {found}")]
    BufferCount {
        name: String,
        expect: usize,
        found: usize,
    },
    #[error("mode {found} is not accepted by buffer slot {slot} of codelet {name}")]
    Mode {
        name: String,
        slot: usize,
        found: AccessMode,
    },
    #[error("handle {0} is used after release")]
    Released(HandleId),
    #[error("handle {0} is still referenced by {1} pending tasks")]
    Busy(HandleId, usize),
    #[error("handle {0} is bound to one task twice with a write access")]
    Aliased(HandleId),
    #[error("node {0} is out of range for a group of {1}")]
    Node(usize, usize),
    #[error("handle {0} has no valid copy to transfer from")]
    Transfer(HandleId),
    #[error("task queue is closed")]
    QueueClosed,
    #[error("buffer of {found} bytes does not match handle size {expect}")]
    Size { expect: usize, found: usize },
}
