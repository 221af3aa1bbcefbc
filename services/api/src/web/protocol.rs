//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! gateway for the comment voting session.

use deliberation_core::{
    error::SessionError,
    gesture::{SwipeFeedback, SwipeTint},
    ConversationHeader, CursorState, SessionMode, SessionView, VoteSettled,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Viewport width assumed when the client does not report one.
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1024.0;

fn default_viewport_width() -> f64 {
    DEFAULT_VIEWPORT_WIDTH
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a voting session. This must be the first message sent on the connection.
    Init {
        conversation_id: i64,
        #[serde(default = "default_viewport_width")]
        viewport_width: f64,
    },

    /// Votes on a comment: -1 disagree, 0 neutral, 1 agree.
    Vote { comment_id: i64, value: i64 },

    /// Moves past the current comment without voting.
    Skip,

    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },

    /// A tap on the current comment card.
    Tap,

    SubmitComment {
        text: String,
        #[serde(default)]
        is_seed: bool,
    },

    ToggleStar { comment_id: i64 },

    /// Refetches the conversation and starts over on the fresh snapshot.
    Reload,

    /// Opens a second pass over the comments the participant skipped.
    ReviewSkipped,

    /// Leaves the skipped-comments review and returns to the main queue.
    ResumeConversation,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms that the session started on the requested conversation.
    SessionInitialized {
        session_id: Uuid,
        conversation: ConversationPayload,
        starred: Vec<i64>,
    },

    /// The full session view, sent after every transition.
    State(SessionPayload),

    /// How far the card follows an in-progress swipe.
    SwipeFeedback {
        offset_percent: f64,
        tint: TintPayload,
    },

    VoteSettled {
        comment_id: i64,
        outcome: VoteOutcome,
    },

    CommentCreated { comment_id: Option<i64> },

    StarUpdated { comment_id: i64, starred: bool },

    /// Reports a failure to the client, which should display the message.
    Error {
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },
}

impl ServerMessage {
    pub fn from_session_error(err: &SessionError) -> Self {
        let field = match err {
            SessionError::Validation(v) => Some(v.field.wire_name().to_string()),
            _ => None,
        };
        let message = match err {
            SessionError::Validation(v) => v.rule.to_string(),
            other => other.to_string(),
        };
        ServerMessage::Error {
            code: ErrorCode::from(err),
            message,
            field,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: ErrorCode::BadRequest,
            message: message.into(),
            field: None,
        }
    }

    pub fn swipe_feedback(feedback: SwipeFeedback) -> Self {
        ServerMessage::SwipeFeedback {
            offset_percent: feedback.offset_percent,
            tint: feedback.tint.into(),
        }
    }

    /// Puts the card back in place after a gesture ends.
    pub fn swipe_reset() -> Self {
        ServerMessage::SwipeFeedback {
            offset_percent: 0.0,
            tint: TintPayload::None,
        }
    }
}

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConversationPayload {
    pub id: i64,
    pub topic: String,
    pub description: String,
    pub tags: Vec<String>,
    pub info_images: Vec<String>,
    pub is_active: bool,
}

impl From<&ConversationHeader> for ConversationPayload {
    fn from(header: &ConversationHeader) -> Self {
        Self {
            id: header.id.0,
            topic: header.topic.clone(),
            description: header.description.clone(),
            tags: header.tags.clone(),
            info_images: header.info_images.clone(),
            is_active: header.is_active,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CommentPayload {
    pub id: i64,
    pub text: String,
    pub is_seed: bool,
    pub author: Option<i64>,
    pub agree: usize,
    pub neutral: usize,
    pub disagree: usize,
    pub user_vote: Option<i8>,
    pub starred: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload {
    pub session_id: Uuid,
    pub generation: u64,
    pub mode: ModePayload,
    pub conversation_id: i64,
    pub current: Option<CommentPayload>,
    pub visible_count: usize,
    pub total_count: usize,
    pub position: usize,
    pub viewed: usize,
    pub exhausted: bool,
    pub is_advancing: bool,
    pub can_contribute: bool,
    pub should_prompt_contribution: bool,
}

impl SessionPayload {
    /// Builds the payload; `is_starred` answers for the current comment.
    pub fn from_view(view: SessionView, is_starred: impl Fn(i64) -> bool) -> Self {
        Self {
            session_id: view.session_id,
            generation: view.generation,
            mode: view.mode.into(),
            conversation_id: view.conversation_id.0,
            current: view.current.map(|c| CommentPayload {
                id: c.id.0,
                starred: is_starred(c.id.0),
                text: c.text,
                is_seed: c.is_seed,
                author: c.author.map(|a| a.0),
                agree: c.tally.agree,
                neutral: c.tally.neutral,
                disagree: c.tally.disagree,
                user_vote: c.user_vote.map(|v| v.as_i8()),
            }),
            visible_count: view.visible_count,
            total_count: view.total_count,
            position: view.position,
            viewed: view.viewed,
            exhausted: view.state == CursorState::Exhausted,
            is_advancing: view.is_advancing,
            can_contribute: view.can_contribute,
            should_prompt_contribution: view.should_prompt_contribution,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModePayload {
    Queue,
    SkippedReview,
}

impl From<SessionMode> for ModePayload {
    fn from(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Queue => ModePayload::Queue,
            SessionMode::SkippedReview => ModePayload::SkippedReview,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TintPayload {
    None,
    Agree,
    Disagree,
}

impl From<SwipeTint> for TintPayload {
    fn from(tint: SwipeTint) -> Self {
        match tint {
            SwipeTint::None => TintPayload::None,
            SwipeTint::Agree => TintPayload::Agree,
            SwipeTint::Disagree => TintPayload::Disagree,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Recorded,
    Updated,
    AlreadyVoted,
}

impl VoteOutcome {
    /// `None` for stale settlements, which are never reported.
    pub fn from_settled(settled: VoteSettled) -> Option<Self> {
        match settled {
            VoteSettled::Recorded => Some(VoteOutcome::Recorded),
            VoteSettled::Updated => Some(VoteOutcome::Updated),
            VoteSettled::AlreadyVoted => Some(VoteOutcome::AlreadyVoted),
            VoteSettled::Stale => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthRequired,
    Busy,
    Validation,
    RemoteRejected,
    FetchFailed,
    ContributionLocked,
    UnknownComment,
    BadRequest,
}

impl From<&SessionError> for ErrorCode {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::AuthRequired => ErrorCode::AuthRequired,
            SessionError::Busy => ErrorCode::Busy,
            SessionError::Validation(_) => ErrorCode::Validation,
            SessionError::RemoteRejected { .. } => ErrorCode::RemoteRejected,
            SessionError::FetchFailed { .. } => ErrorCode::FetchFailed,
            SessionError::ContributionLocked { .. } => ErrorCode::ContributionLocked,
            SessionError::UnknownComment(_) => ErrorCode::UnknownComment,
        }
    }
}
