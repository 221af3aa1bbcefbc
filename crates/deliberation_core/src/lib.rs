pub mod compose;
pub mod coordinator;
pub mod cursor;
pub mod domain;
pub mod error;
pub mod gate;
pub mod gesture;
pub mod ledger;
pub mod ports;
pub mod session;
pub mod shuffle;
pub mod stars;

pub use coordinator::{PendingVote, VoteSettled};
pub use cursor::CursorState;
pub use domain::{
    Comment, CommentId, Conversation, ConversationHeader, ConversationId, CreatedComment,
    FlagStatus, Identity, UserId, Vote, VoteTally, VoteValue,
};
pub use error::{CommentField, SessionError, ValidationError, ValidationRule};
pub use ports::{
    CommentService, ConversationService, IdentityService, PortError, PortResult, StarService,
    VoteReceipt, VoteService,
};
pub use session::{
    AdvanceTicket, CommentView, IntentOutcome, SessionMode, SessionView, VoteSubmission,
    VotingSession, ADVANCE_DELAY, REVIEW_ADVANCE_DELAY,
};
