//! crates/deliberation_core/src/error.rs
//!
//! The error taxonomy surfaced by the voting session to its host.

use crate::domain::CommentId;
use crate::ports::PortError;
use std::fmt;

/// The comment field a validation rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentField {
    Text,
    Conversation,
}

impl CommentField {
    /// The field name used by the backend (`txt`, `zid`).
    pub fn wire_name(self) -> &'static str {
        match self {
            CommentField::Text => "txt",
            CommentField::Conversation => "zid",
        }
    }

    pub fn from_wire(name: &str) -> Self {
        match name {
            "zid" => CommentField::Conversation,
            _ => CommentField::Text,
        }
    }
}

impl fmt::Display for CommentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRule {
    Empty,
    TooShort { words: usize, min: usize },
    TooLong { words: usize, max: usize },
    TooManyCharacters { chars: usize, max: usize },
    /// Server-side validation failure, with the backend's message.
    Rejected(String),
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Empty => f.write_str("Please enter a comment"),
            ValidationRule::TooShort { words, min } => write!(
                f,
                "Comment must be at least {min} words ({} more words needed)",
                min.saturating_sub(*words)
            ),
            ValidationRule::TooLong { words, max } => write!(
                f,
                "Comment must not exceed {max} words ({} words over limit)",
                words.saturating_sub(*max)
            ),
            ValidationRule::TooManyCharacters { max, .. } => {
                write!(f, "Comment cannot exceed {max} characters")
            }
            ValidationRule::Rejected(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {rule}")]
pub struct ValidationError {
    pub field: CommentField,
    pub rule: ValidationRule,
}

/// Every failure a session operation can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Sign-in required")]
    AuthRequired,

    /// A previous submission or advance is still in flight.
    #[error("Busy: a previous submission is still in flight")]
    Busy,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Rejected by the remote service: {reason}")]
    RemoteRejected { reason: String },

    #[error("Failed to load conversation: {reason}")]
    FetchFailed { reason: String },

    #[error("View {required} comments before adding your own (viewed {viewed})")]
    ContributionLocked { viewed: usize, required: usize },

    #[error("Comment {0} is not part of this conversation")]
    UnknownComment(CommentId),
}

impl SessionError {
    /// Converts a network-originating failure of a mutating call.
    pub fn from_port(err: PortError) -> Self {
        match err {
            PortError::Unauthorized => SessionError::AuthRequired,
            PortError::Invalid { field, message } => SessionError::Validation(ValidationError {
                field: CommentField::from_wire(&field),
                rule: ValidationRule::Rejected(message),
            }),
            PortError::Rejected(reason)
            | PortError::NotFound(reason)
            | PortError::Unexpected(reason) => SessionError::RemoteRejected { reason },
        }
    }

    /// Converts a failure of the conversation fetch.
    pub fn fetch_failed(err: PortError) -> Self {
        SessionError::FetchFailed {
            reason: err.to_string(),
        }
    }
}
