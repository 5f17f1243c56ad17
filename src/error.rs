//! Crate error type.

use thiserror::Error;

use crate::models::ActivityId;
use crate::validation::ValidationError;

/// Broad class of an [`ActivityError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recoverable: reject the update and keep prior state.
    Validation,
    /// The stream uses a tag or version this build cannot read.
    UnknownFormat,
    /// The stream is damaged.
    Corrupt,
    /// The referenced activity does not exist.
    NotFound,
}

/// Errors raised by activity operations and persistence.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unknown activity type tag {tag}")]
    UnknownActivityType { tag: u8 },
    #[error("unsupported format version {version} (current is {current})")]
    UnsupportedVersion { version: u32, current: u32 },
    #[error("stream truncated at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("corrupt stream: {0}")]
    Corrupt(String),
    #[error("activity {0} not found")]
    NotFound(ActivityId),
    #[error("no activity with external id {0:?}")]
    ExternalIdNotFound(String),
}

impl ActivityError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnknownActivityType { .. } | Self::UnsupportedVersion { .. } => {
                ErrorKind::UnknownFormat
            }
            Self::Truncated { .. } | Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::NotFound(_) | Self::ExternalIdNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Whether the caller can reject the update and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, ActivityError>;
