use crate::event::source::SourceMnemonicError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `tickflow`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("sequence {sequence} exceeds maximum of {max}")]
    SequenceOutOfRange { sequence: i64, max: i64 },

    #[error("invalid event source mnemonic: {0}")]
    InvalidSourceMnemonic(String),
}

impl FeedError {
    /// Construct an [`FeedError::InvalidArgument`] from anything printable.
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Construct an [`FeedError::IllegalState`] from anything printable.
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState(message.into())
    }

    /// Determine whether this error indicates a programmer error that left internal state
    /// unchanged, as opposed to a transport fault.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, FeedError::Transport(_))
    }
}

impl From<SourceMnemonicError> for FeedError {
    fn from(value: SourceMnemonicError) -> Self {
        Self::InvalidSourceMnemonic(value.to_string())
    }
}
