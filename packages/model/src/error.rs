//! Error types for the XUK data model.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

/// Broad classification of a [`ModelError`].
///
/// Callers use this to decide how to surface a failure: precondition and
/// domain errors are edit rejections, state errors are programming errors,
/// serialization errors are file-open/save failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    State,
    Structural,
    Domain,
    Serialization,
    Cancelled,
    Io,
    Listener,
}

#[derive(Error, Debug)]
pub enum ModelError {
    // Precondition violations
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Media data not found: {0}")]
    MediaDataNotFound(String),

    #[error("Data provider not found: {0}")]
    DataProviderNotFound(String),

    #[error("Listener not registered: {0}")]
    ListenerNotFound(u64),

    // State violations
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),

    #[error("Node {0} has no channels property")]
    NoChannelsProperty(String),

    #[error("No transaction in progress")]
    NoTransaction,

    #[error("A transaction is already in progress")]
    TransactionInProgress,

    // Structural violations
    #[error("Node {0} already has a parent")]
    HasParent(String),

    #[error("Node {node} belongs to a different presentation")]
    DifferentPresentation { node: String },

    #[error("Index {index} out of bounds (count: {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Attaching {node} under {parent} would create a cycle")]
    CycleDetected { node: String, parent: String },

    #[error("Node {0} is the presentation root and cannot be attached")]
    RootCannotBeAttached(String),

    #[error("Duplicate channel name: {0}")]
    DuplicateChannel(String),

    #[error("Channel does not exist: {0}")]
    ChannelNotFound(String),

    #[error("Channel {0} does not exist on this property")]
    ChannelNotOnProperty(String),

    #[error("Channel {0} is still used by the tree")]
    ChannelInUse(String),

    #[error("Node {node} already has a {kind} property")]
    DuplicateProperty { node: String, kind: &'static str },

    #[error("Node {node} has no {kind} property")]
    PropertyNotFound { node: String, kind: &'static str },

    #[error("Data provider {0} has open streams")]
    DataProviderInUse(String),

    #[error("Duplicate uid: {0}")]
    DuplicateUid(String),

    // Domain violations
    #[error("Sequence does not allow mixing {existing:?} with {rejected:?}")]
    SequenceTypeMismatch {
        existing: crate::media::MediaType,
        rejected: crate::media::MediaType,
    },

    #[error("Clip begin {begin} is after clip end {end}")]
    ClipOrder {
        begin: crate::media::Time,
        end: crate::media::Time,
    },

    #[error("Channel {channel} ({kind:?}) rejects {media:?} media")]
    MediaRejected {
        channel: String,
        kind: crate::channel::ChannelKind,
        media: crate::media::MediaType,
    },

    #[error("Invalid time value: {0:?}")]
    InvalidTime(String),

    #[error("Invalid URI {uri:?}: {message}")]
    InvalidUri { uri: String, message: String },

    // Serialization
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Listener failed: {0}")]
    Listener(String),
}

impl ModelError {
    pub fn node_not_found(id: impl std::fmt::Display) -> Self {
        Self::NodeNotFound(id.to_string())
    }

    pub fn index_out_of_bounds(index: usize, count: usize) -> Self {
        Self::IndexOutOfBounds { index, count }
    }

    pub fn deserialization(message: impl std::fmt::Display) -> Self {
        Self::Deserialization(message.to_string())
    }

    pub fn serialization(message: impl std::fmt::Display) -> Self {
        Self::Serialization(message.to_string())
    }

    pub fn invalid_uri(uri: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    pub fn listener(message: impl std::fmt::Display) -> Self {
        Self::Listener(message.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::MissingArgument(_)
            | ModelError::NodeNotFound(_)
            | ModelError::MediaDataNotFound(_)
            | ModelError::DataProviderNotFound(_)
            | ModelError::ListenerNotFound(_) => ErrorKind::Precondition,

            ModelError::NotInitialized(_)
            | ModelError::AlreadyInitialized(_)
            | ModelError::NoChannelsProperty(_)
            | ModelError::NoTransaction
            | ModelError::TransactionInProgress => ErrorKind::State,

            ModelError::HasParent(_)
            | ModelError::DifferentPresentation { .. }
            | ModelError::IndexOutOfBounds { .. }
            | ModelError::CycleDetected { .. }
            | ModelError::RootCannotBeAttached(_)
            | ModelError::DuplicateChannel(_)
            | ModelError::ChannelNotFound(_)
            | ModelError::ChannelNotOnProperty(_)
            | ModelError::ChannelInUse(_)
            | ModelError::DuplicateProperty { .. }
            | ModelError::PropertyNotFound { .. }
            | ModelError::DataProviderInUse(_)
            | ModelError::DuplicateUid(_) => ErrorKind::Structural,

            ModelError::SequenceTypeMismatch { .. }
            | ModelError::ClipOrder { .. }
            | ModelError::MediaRejected { .. }
            | ModelError::InvalidTime(_)
            | ModelError::InvalidUri { .. } => ErrorKind::Domain,

            ModelError::Deserialization(_) | ModelError::Serialization(_) => {
                ErrorKind::Serialization
            }
            ModelError::Cancelled => ErrorKind::Cancelled,
            ModelError::Io(_) => ErrorKind::Io,
            ModelError::Listener(_) => ErrorKind::Listener,
        }
    }

    /// True for the cancellation outcome, which carries no corruption.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ModelError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ModelError::HasParent("n1".to_string()).kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            ModelError::AlreadyInitialized("media factory").kind(),
            ErrorKind::State
        );
        assert_eq!(ModelError::deserialization("eof").kind(), ErrorKind::Serialization);
        assert!(ModelError::Cancelled.is_cancelled());
        assert!(!ModelError::deserialization("eof").is_cancelled());
    }

    #[test]
    fn test_error_messages() {
        let err = ModelError::index_out_of_bounds(4, 2);
        assert_eq!(err.to_string(), "Index 4 out of bounds (count: 2)");

        let err = ModelError::DuplicateChannel("audio1".to_string());
        assert_eq!(err.to_string(), "Duplicate channel name: audio1");
    }
}
