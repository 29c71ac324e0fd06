use thiserror::Error;

/// All errors produced by this crate.
///
/// Corruption, loss, and duplicate-delivery are *not* represented here:
/// those faults are handled entirely inside the protocol loops and never
/// surface to callers. Only deadline-driven operations and genuine
/// internal-invariant violations produce an `RdtError`.
#[derive(Debug, Error)]
pub enum RdtError {
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    #[error("connect timed out waiting for SYN|ACK")]
    ConnectTimeout,

    #[error("accept timed out waiting for ESTABLISHED")]
    AcceptTimeout,

    #[error("endpoint is closed")]
    Closed,

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RdtError>;
