//! crates/deliberation_core/src/session.rs
//!
//! The voting session: one participant's pass over one conversation's
//! visible comments. Groups the snapshot, presentation order, cursor and
//! vote coordinator into a single value driven by explicit transitions.
//!
//! Advancing after a vote or a skip is a two-step transition. The session
//! hands out an [`AdvanceTicket`] and the host redeems it with
//! [`VotingSession::finish_advance`] once [`ADVANCE_DELAY`] has elapsed.
//! While a ticket is outstanding further votes and skips are `Busy`.
//!
//! A session runs in one of two [`SessionMode`]s. The main queue shuffles the
//! visible comments and gates contribution. A skipped-comments review walks
//! the comments the participant skipped earlier, in the backend's order, with
//! no gate and a slower [`REVIEW_ADVANCE_DELAY`].

use crate::{
    compose::CommentDraft,
    coordinator::{PendingVote, VoteBegin, VoteCoordinator, VoteSettled},
    cursor::{CursorState, SessionCursor},
    domain::{
        Comment, CommentId, Conversation, ConversationHeader, ConversationId, Identity, UserId,
        VoteTally, VoteValue,
    },
    error::SessionError,
    gate,
    gesture::{self, GestureIntent, Surface},
    ledger::VoteLedger,
    ports::{ConversationService, PortResult, VoteReceipt},
    shuffle,
};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Visual pacing between a vote or skip and the next comment.
pub const ADVANCE_DELAY: Duration = Duration::from_millis(300);

/// Advance pacing while reviewing skipped comments.
pub const REVIEW_ADVANCE_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// The conversation's visible comments, shuffled once per snapshot.
    Queue,
    /// A second pass over the comments the participant skipped.
    SkippedReview,
}

impl SessionMode {
    /// Pause between a vote or skip and the next comment in this mode.
    pub fn advance_delay(self) -> Duration {
        match self {
            SessionMode::Queue => ADVANCE_DELAY,
            SessionMode::SkippedReview => REVIEW_ADVANCE_DELAY,
        }
    }
}

/// Redeemed with `finish_advance` once the advance animation has played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceTicket {
    generation: u64,
}

impl AdvanceTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteSubmission {
    /// Same value as before; the session only moves on.
    Unchanged { advance: AdvanceTicket },
    /// Written to the ledger; `pending` must be dispatched and settled.
    Dispatched {
        pending: PendingVote,
        advance: AdvanceTicket,
    },
}

impl VoteSubmission {
    pub fn advance(&self) -> AdvanceTicket {
        match self {
            VoteSubmission::Unchanged { advance } => *advance,
            VoteSubmission::Dispatched { advance, .. } => *advance,
        }
    }

    pub fn pending(&self) -> Option<&PendingVote> {
        match self {
            VoteSubmission::Unchanged { .. } => None,
            VoteSubmission::Dispatched { pending, .. } => Some(pending),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Nothing on screen, or the gesture asked for nothing.
    Ignored,
    Voted(VoteSubmission),
    Advanced,
}

/// The current comment as the presentation layer shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub id: CommentId,
    pub text: String,
    pub is_seed: bool,
    pub author: Option<UserId>,
    pub tally: VoteTally,
    pub user_vote: Option<VoteValue>,
}

/// Everything the presentation layer needs, recomputed after each transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub session_id: Uuid,
    pub generation: u64,
    pub mode: SessionMode,
    pub conversation_id: ConversationId,
    pub current: Option<CommentView>,
    pub visible_count: usize,
    pub total_count: usize,
    pub position: usize,
    pub viewed: usize,
    pub state: CursorState,
    pub is_advancing: bool,
    pub can_contribute: bool,
    pub should_prompt_contribution: bool,
}

pub struct VotingSession {
    id: Uuid,
    mode: SessionMode,
    identity: Option<Identity>,
    header: ConversationHeader,
    ledger: VoteLedger,
    /// Ledger positions of the comments open for voting.
    visible: Vec<usize>,
    /// Permutation of `0..visible.len()`, fixed for the snapshot.
    order: Vec<usize>,
    cursor: SessionCursor,
    coordinator: VoteCoordinator,
    generation: u64,
    advancing: bool,
}

impl VotingSession {
    pub fn start<R: Rng + ?Sized>(
        conversation: Conversation,
        identity: Option<Identity>,
        rng: &mut R,
    ) -> Self {
        let mut session = Self::empty(SessionMode::Queue, conversation.header.clone(), identity);
        session.install(conversation, rng);
        info!(
            session_id = %session.id,
            conversation_id = %session.header.id,
            visible = session.visible.len(),
            total = session.ledger.len(),
            "Voting session started"
        );
        session
    }

    /// Starts a review of previously skipped comments. The comments keep the
    /// order they were given in.
    pub fn start_review(
        header: ConversationHeader,
        skipped: Vec<Comment>,
        identity: Option<Identity>,
    ) -> Self {
        let mut session = Self::empty(SessionMode::SkippedReview, header.clone(), identity);
        session.install_ordered(Conversation {
            header,
            comments: skipped,
        });
        info!(
            session_id = %session.id,
            conversation_id = %session.header.id,
            skipped = session.visible.len(),
            "Skipped-comments review started"
        );
        session
    }

    /// Fetches the caller's skipped comments and starts a review over them.
    pub async fn fetch_review(
        service: &dyn ConversationService,
        identity: Identity,
        header: ConversationHeader,
    ) -> Result<Self, SessionError> {
        let skipped = service
            .skipped_comments(&identity, header.id)
            .await
            .map_err(SessionError::fetch_failed)?;
        Ok(Self::start_review(header, skipped, Some(identity)))
    }

    fn empty(mode: SessionMode, header: ConversationHeader, identity: Option<Identity>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            identity,
            header,
            ledger: VoteLedger::default(),
            visible: Vec::new(),
            order: Vec::new(),
            cursor: SessionCursor::new(0),
            coordinator: VoteCoordinator::default(),
            generation: 0,
            advancing: false,
        }
    }

    /// Fetches the conversation and starts a session for `identity`.
    pub async fn fetch<R: Rng + ?Sized>(
        service: &dyn ConversationService,
        identity: Identity,
        conversation_id: ConversationId,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let conversation = service
            .get_conversation(&identity, conversation_id)
            .await
            .map_err(SessionError::fetch_failed)?;
        Ok(Self::start(conversation, Some(identity), rng))
    }

    /// Replaces the snapshot, e.g. after the participant added a comment.
    /// Outstanding tickets and pending votes from the old snapshot become stale.
    pub fn reload<R: Rng + ?Sized>(&mut self, conversation: Conversation, rng: &mut R) {
        self.generation += 1;
        self.install(conversation, rng);
        info!(
            session_id = %self.id,
            generation = self.generation,
            visible = self.visible.len(),
            "Voting session reloaded"
        );
    }

    fn install<R: Rng + ?Sized>(&mut self, conversation: Conversation, rng: &mut R) {
        self.install_ordered(conversation);
        if self.mode == SessionMode::Queue {
            self.order = shuffle::presentation_order(self.visible.len(), rng);
        }
    }

    fn install_ordered(&mut self, conversation: Conversation) {
        self.header = conversation.header;
        self.ledger = VoteLedger::new(conversation.comments);
        self.visible = self
            .ledger
            .comments()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.flag_status.is_visible())
            .map(|(i, _)| i)
            .collect();
        self.order = (0..self.visible.len()).collect();
        self.cursor.reset(self.visible.len());
        self.coordinator.clear();
        self.advancing = false;
    }

    //=====================================================================================
    // Accessors
    //=====================================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn header(&self) -> &ConversationHeader {
        &self.header
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn cursor(&self) -> &SessionCursor {
        &self.cursor
    }

    pub fn coordinator(&self) -> &VoteCoordinator {
        &self.coordinator
    }

    pub fn is_advancing(&self) -> bool {
        self.advancing
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn total_count(&self) -> usize {
        self.ledger.len()
    }

    /// The visible comments in presentation order.
    pub fn queue(&self) -> impl Iterator<Item = &Comment> + '_ {
        self.order
            .iter()
            .map(move |&slot| &self.ledger.comments()[self.visible[slot]])
    }

    pub fn current_comment(&self) -> Option<&Comment> {
        let slot = *self.order.get(self.cursor.position())?;
        self.visible
            .get(slot)
            .map(|&i| &self.ledger.comments()[i])
    }

    pub fn user_vote(&self, comment_id: CommentId) -> Option<VoteValue> {
        let identity = self.identity.as_ref()?;
        self.ledger
            .user_vote(comment_id, identity.user_id)
            .map(|v| v.value)
    }

    /// The review pass is not gated.
    pub fn can_contribute(&self) -> bool {
        match self.mode {
            SessionMode::Queue => gate::can_contribute(self.cursor.viewed(), self.visible.len()),
            SessionMode::SkippedReview => true,
        }
    }

    pub fn should_prompt_contribution(&self) -> bool {
        match self.mode {
            SessionMode::Queue => {
                gate::should_prompt_contribution(self.cursor.position(), self.visible.len())
            }
            SessionMode::SkippedReview => false,
        }
    }

    //=====================================================================================
    // Transitions
    //=====================================================================================

    /// Votes on a comment, writing the ledger before the remote call is made.
    pub fn submit_vote(
        &mut self,
        comment_id: CommentId,
        value: VoteValue,
    ) -> Result<VoteSubmission, SessionError> {
        if self.identity.is_none() {
            return Err(SessionError::AuthRequired);
        }
        if self.advancing {
            return Err(SessionError::Busy);
        }

        let begin = self.coordinator.begin(
            &mut self.ledger,
            self.generation,
            self.header.id,
            self.identity.as_ref(),
            comment_id,
            value,
        )?;
        let advance = self.begin_advance();

        Ok(match begin {
            VoteBegin::Unchanged => VoteSubmission::Unchanged { advance },
            VoteBegin::Dispatch(pending) => {
                debug!(%comment_id, ?value, "Vote applied optimistically");
                VoteSubmission::Dispatched { pending, advance }
            }
        })
    }

    /// Reconciles a dispatched vote with the vote service's answer.
    pub fn settle_vote(
        &mut self,
        pending: PendingVote,
        result: PortResult<VoteReceipt>,
    ) -> Result<VoteSettled, SessionError> {
        self.coordinator
            .settle(&mut self.ledger, self.generation, pending, result)
    }

    /// Moves on without voting, after the advance animation.
    pub fn skip(&mut self) -> Result<AdvanceTicket, SessionError> {
        if self.advancing {
            return Err(SessionError::Busy);
        }
        Ok(self.begin_advance())
    }

    /// Moves on at once (swipe up). Returns false when the queue is exhausted.
    pub fn advance_immediately(&mut self) -> Result<bool, SessionError> {
        if self.advancing {
            return Err(SessionError::Busy);
        }
        Ok(self.cursor.advance())
    }

    /// Completes an animated advance. Tickets from a replaced snapshot are ignored.
    pub fn finish_advance(&mut self, ticket: AdvanceTicket) -> bool {
        if ticket.generation != self.generation || !self.advancing {
            return false;
        }
        self.advancing = false;
        self.cursor.advance()
    }

    fn begin_advance(&mut self) -> AdvanceTicket {
        self.advancing = true;
        AdvanceTicket {
            generation: self.generation,
        }
    }

    /// Routes a gesture's intent to the current comment.
    pub fn apply_intent(&mut self, intent: GestureIntent) -> Result<IntentOutcome, SessionError> {
        let Some(comment_id) = self.current_comment().map(|c| c.id) else {
            return Ok(IntentOutcome::Ignored);
        };
        match intent {
            GestureIntent::Vote(value) => self
                .submit_vote(comment_id, value)
                .map(IntentOutcome::Voted),
            GestureIntent::Advance => {
                self.advance_immediately()?;
                Ok(IntentOutcome::Advanced)
            }
        }
    }

    /// A tap on the current comment.
    pub fn tap(&mut self, surface: Surface) -> Result<IntentOutcome, SessionError> {
        let Some(comment_id) = self.current_comment().map(|c| c.id) else {
            return Ok(IntentOutcome::Ignored);
        };
        match gesture::tap_intent(surface, self.user_vote(comment_id)) {
            Some(intent) => self.apply_intent(intent),
            None => Ok(IntentOutcome::Ignored),
        }
    }

    /// Validates a new comment against identity, the contribution gate and the length rules.
    pub fn prepare_comment(&self, text: &str, is_seed: bool) -> Result<CommentDraft, SessionError> {
        if self.identity.is_none() {
            return Err(SessionError::AuthRequired);
        }
        if !self.can_contribute() {
            return Err(SessionError::ContributionLocked {
                viewed: self.cursor.viewed(),
                required: gate::CONTRIBUTION_THRESHOLD.min(self.visible.len()),
            });
        }
        CommentDraft::new(self.identity.as_ref(), self.header.id, text, is_seed)
    }

    pub fn view(&self) -> SessionView {
        let current = self.current_comment().map(|c| CommentView {
            id: c.id,
            text: c.text.clone(),
            is_seed: c.is_seed,
            author: c.author,
            tally: self.ledger.tally(c.id),
            user_vote: self.user_vote(c.id),
        });

        SessionView {
            session_id: self.id,
            generation: self.generation,
            mode: self.mode,
            conversation_id: self.header.id,
            current,
            visible_count: self.visible.len(),
            total_count: self.ledger.len(),
            position: self.cursor.position(),
            viewed: self.cursor.viewed(),
            state: self.cursor.state(),
            is_advancing: self.advancing,
            can_contribute: self.can_contribute(),
            should_prompt_contribution: self.should_prompt_contribution(),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
