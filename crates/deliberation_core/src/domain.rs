//! crates/deliberation_core/src/domain.rs
//!
//! Defines the pure, core data structures for the voting engine.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;

//=========================================================================================
// Identifiers
//=========================================================================================

/// Identifier of a comment (`tid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentId(pub i64);

/// Identifier of a conversation (`zid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub i64);

/// Identifier of a participant (`uid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//=========================================================================================
// Votes
//=========================================================================================

/// A participant's reaction to a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteValue {
    Disagree,
    Neutral,
    Agree,
}

impl VoteValue {
    /// The signed value used on the wire: -1, 0 or +1.
    pub fn as_i8(self) -> i8 {
        match self {
            VoteValue::Disagree => -1,
            VoteValue::Neutral => 0,
            VoteValue::Agree => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Vote value must be -1, 0 or 1, got {0}")]
pub struct InvalidVoteValue(pub i64);

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::Disagree),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Agree),
            other => Err(InvalidVoteValue(other)),
        }
    }
}

/// A single vote cast by one participant on one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub comment_id: CommentId,
    pub conversation_id: ConversationId,
    pub voter: UserId,
    pub value: VoteValue,
    pub cast_at: DateTime<Utc>,
}

/// Aggregated vote counts for one comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub agree: usize,
    pub neutral: usize,
    pub disagree: usize,
}

impl VoteTally {
    pub fn from_votes<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Self {
        votes
            .into_iter()
            .fold(VoteTally::default(), |mut tally, vote| {
                match vote.value {
                    VoteValue::Agree => tally.agree += 1,
                    VoteValue::Neutral => tally.neutral += 1,
                    VoteValue::Disagree => tally.disagree += 1,
                }
                tally
            })
    }

    pub fn total(&self) -> usize {
        self.agree + self.neutral + self.disagree
    }
}

//=========================================================================================
// Comments and Conversations
//=========================================================================================

/// Moderation state of a comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlagStatus {
    #[default]
    None,
    Pending,
    Accepted,
    Flagged,
}

impl FlagStatus {
    /// Parses the backend's moderation string. Matching is exact; absent or
    /// unknown values (including other casings) are `None`.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("pending") => FlagStatus::Pending,
            Some("accepted") => FlagStatus::Accepted,
            Some("flagged") => FlagStatus::Flagged,
            _ => FlagStatus::None,
        }
    }

    /// Accepted flags and flagged comments are hidden from the voting queue.
    pub fn is_visible(self) -> bool {
        !matches!(self, FlagStatus::Accepted | FlagStatus::Flagged)
    }
}

/// A short text statement open for voting.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub conversation_id: ConversationId,
    pub author: Option<UserId>,
    pub text: String,
    pub flag_status: FlagStatus,
    pub is_seed: bool,
    pub votes: Vec<Vote>,
    /// The viewing user's vote, when the backend resolved it up front.
    pub user_vote: Option<Vote>,
}

/// Everything about a conversation except its comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHeader {
    pub id: ConversationId,
    pub topic: String,
    pub description: String,
    pub tags: Vec<String>,
    pub info_images: Vec<String>,
    pub is_active: bool,
}

/// A conversation snapshot as fetched at session start.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub header: ConversationHeader,
    pub comments: Vec<Comment>,
}

/// Returned by the comment service once a new comment is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedComment {
    pub id: Option<CommentId>,
    pub conversation_id: ConversationId,
}

//=========================================================================================
// Identity
//=========================================================================================

/// The signed-in participant driving a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    /// Name of the cookie the backend reads the token from.
    pub session_cookie: String,
    /// Opaque token issued by the identity provider, forwarded to the backend.
    pub session_token: String,
}

impl Identity {
    /// The `name=value` pair sent in the backend's `Cookie` header.
    pub fn cookie_header(&self) -> String {
        format!("{}={}", self.session_cookie, self.session_token)
    }
}
