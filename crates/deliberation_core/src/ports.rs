//! crates/deliberation_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's external collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the transport used to reach the deliberation backend.

use crate::domain::{
    Comment, CommentId, Conversation, ConversationId, CreatedComment, Identity, VoteValue,
};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The reason the vote service gives when the identical vote already exists.
pub const ALREADY_VOTED_REASON: &str = "already voted this way";

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, backend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rejected by the remote service: {0}")]
    Rejected(String),
    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// True when the vote service reports that the same vote is already stored.
    pub fn is_already_voted(&self) -> bool {
        match self {
            PortError::Rejected(reason) => reason.trim().eq_ignore_ascii_case(ALREADY_VOTED_REASON),
            _ => false,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The two terminal successes of a vote submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteReceipt {
    /// A previous vote by this user was replaced.
    Updated,
    /// This was the user's first vote on the comment.
    Recorded,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Fetches a conversation with its comments, their votes and the caller's own votes.
    async fn get_conversation(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
    ) -> PortResult<Conversation>;

    /// The comments the caller skipped in this conversation, in the backend's order.
    async fn skipped_comments(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
    ) -> PortResult<Vec<Comment>>;
}

#[async_trait]
pub trait VoteService: Send + Sync {
    async fn submit_vote(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
        comment_id: CommentId,
        value: VoteValue,
    ) -> PortResult<VoteReceipt>;
}

#[async_trait]
pub trait CommentService: Send + Sync {
    async fn submit_comment(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
        text: &str,
        is_seed: bool,
    ) -> PortResult<CreatedComment>;
}

#[async_trait]
pub trait StarService: Send + Sync {
    async fn list_stars(&self, identity: &Identity) -> PortResult<Vec<CommentId>>;

    async fn star(&self, identity: &Identity, comment_id: CommentId) -> PortResult<()>;

    async fn unstar(&self, identity: &Identity, comment_id: CommentId) -> PortResult<()>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves a session token issued by the identity provider into the signed-in user.
    /// `session_cookie` is the cookie name the token must be presented under.
    async fn resolve(&self, session_cookie: &str, session_token: &str) -> PortResult<Identity>;
}
