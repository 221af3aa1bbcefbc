//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the state owned by one connection.

use crate::{
    config::Config,
    web::{
        protocol::{ClientMessage, ConversationPayload, ServerMessage, SessionPayload, VoteOutcome},
        tasks::{Effect, TaskEvent},
    },
};
use deliberation_core::{
    gesture::{GestureInterpreter, Point},
    stars::StarSet,
    AdvanceTicket, CommentId, CommentService, ConversationService, Identity, IdentityService, IntentOutcome,
    SessionError, StarService, VoteService, VoteSubmission, VoteValue, VotingSession,
};
use rand::rngs::StdRng;
use std::sync::Arc;
use uuid::Uuid;
use tracing::{debug, info, warn};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub conversations: Arc<dyn ConversationService>,
    pub votes: Arc<dyn VoteService>,
    pub comments: Arc<dyn CommentService>,
    pub stars: Arc<dyn StarService>,
    pub identity: Arc<dyn IdentityService>,
}

impl AppState {
    /// Wires every port to a single adapter that implements all of them.
    pub fn with_backend<B>(config: Arc<Config>, backend: Arc<B>) -> Self
    where
        B: ConversationService
            + VoteService
            + CommentService
            + StarService
            + IdentityService
            + 'static,
    {
        Self {
            config,
            conversations: backend.clone(),
            votes: backend.clone(),
            comments: backend.clone(),
            stars: backend.clone(),
            identity: backend,
        }
    }
}

//=========================================================================================
// ConnectionState (Specific to One WebSocket Connection)
//=========================================================================================

/// What the event loop must do after handling one input.
#[derive(Debug, Default)]
pub struct Reaction {
    pub messages: Vec<ServerMessage>,
    pub effects: Vec<Effect>,
}

impl Reaction {
    fn message(message: ServerMessage) -> Self {
        Self {
            messages: vec![message],
            effects: Vec::new(),
        }
    }
}

/// The state for a single, active WebSocket connection. Owned by its event loop.
///
/// Intents go to the skipped-comments review while one is open, otherwise to
/// the main session. Stars and the in-flight comment are shared by both.
pub struct ConnectionState {
    identity: Identity,
    session: VotingSession,
    review: Option<VotingSession>,
    /// Set between `review_skipped` and the skipped comments arriving.
    review_requested: bool,
    stars: StarSet,
    gesture: GestureInterpreter,
    comment_in_flight: bool,
    rng: StdRng,
}

impl ConnectionState {
    pub fn new(
        identity: Identity,
        session: VotingSession,
        stars: StarSet,
        viewport_width: f64,
        rng: StdRng,
    ) -> Self {
        Self {
            identity,
            session,
            review: None,
            review_requested: false,
            stars,
            gesture: GestureInterpreter::new(viewport_width),
            comment_in_flight: false,
            rng,
        }
    }

    pub fn session(&self) -> &VotingSession {
        &self.session
    }

    pub fn review(&self) -> Option<&VotingSession> {
        self.review.as_ref()
    }

    /// The session intents are routed to.
    fn active(&self) -> &VotingSession {
        self.review.as_ref().unwrap_or(&self.session)
    }

    fn active_mut(&mut self) -> &mut VotingSession {
        self.review.as_mut().unwrap_or(&mut self.session)
    }

    /// The main session or the open review, if `session_id` names one of them.
    fn session_by_id(&mut self, session_id: Uuid) -> Option<&mut VotingSession> {
        if self.session.id() == session_id {
            return Some(&mut self.session);
        }
        self.review.as_mut().filter(|review| review.id() == session_id)
    }

    pub fn stars(&self) -> &StarSet {
        &self.stars
    }

    /// The messages that open a freshly started session.
    pub fn greeting(&self) -> Vec<ServerMessage> {
        vec![
            ServerMessage::SessionInitialized {
                session_id: self.session.id(),
                conversation: ConversationPayload::from(self.session.header()),
                starred: self.stars.starred().into_iter().map(|id| id.0).collect(),
            },
            self.state_message(),
        ]
    }

    fn state_message(&self) -> ServerMessage {
        let stars = &self.stars;
        ServerMessage::State(SessionPayload::from_view(self.active().view(), |id| {
            stars.is_starred(CommentId(id))
        }))
    }

    //=====================================================================================
    // Client Messages
    //=====================================================================================

    pub fn handle_client_message(&mut self, message: ClientMessage) -> Reaction {
        match message {
            ClientMessage::Init { .. } => {
                warn!("Received subsequent Init message, which is ignored.");
                Reaction::default()
            }
            ClientMessage::Vote { comment_id, value } => match VoteValue::try_from(value) {
                Ok(value) => match self.active_mut().submit_vote(CommentId(comment_id), value) {
                    Ok(submission) => self.submitted(submission),
                    Err(e) => self.rejected(e),
                },
                Err(e) => Reaction::message(ServerMessage::bad_request(e.to_string())),
            },
            ClientMessage::Skip => match self.active_mut().skip() {
                Ok(ticket) => Reaction {
                    messages: vec![self.state_message()],
                    effects: vec![self.advance_effect(ticket)],
                },
                Err(e) => self.rejected(e),
            },
            ClientMessage::PointerDown { x, y } => {
                self.gesture.begin(Point::new(x, y));
                Reaction::default()
            }
            ClientMessage::PointerMove { x, y } => match self.gesture.update(Point::new(x, y)) {
                Some(feedback) => Reaction::message(ServerMessage::swipe_feedback(feedback)),
                None => Reaction::default(),
            },
            ClientMessage::PointerUp { x, y } => {
                let was_active = self.gesture.is_active();
                let mut reaction = match self.gesture.end(Point::new(x, y)) {
                    Some(intent) => {
                        debug!(?intent, "Gesture recognised");
                        match self.active_mut().apply_intent(intent) {
                            Ok(outcome) => self.intent_applied(outcome),
                            Err(e) => self.rejected(e),
                        }
                    }
                    None => Reaction::default(),
                };
                if was_active {
                    reaction.messages.insert(0, ServerMessage::swipe_reset());
                }
                reaction
            }
            ClientMessage::Tap => {
                let surface = self.gesture.surface();
                match self.active_mut().tap(surface) {
                    Ok(outcome) => self.intent_applied(outcome),
                    Err(e) => self.rejected(e),
                }
            }
            ClientMessage::SubmitComment { text, is_seed } => {
                if self.comment_in_flight {
                    return self.rejected(SessionError::Busy);
                }
                match self.active().prepare_comment(&text, is_seed) {
                    Ok(draft) => {
                        self.comment_in_flight = true;
                        Reaction {
                            messages: Vec::new(),
                            effects: vec![Effect::SubmitComment(draft)],
                        }
                    }
                    Err(e) => self.rejected(e),
                }
            }
            ClientMessage::ToggleStar { comment_id } => {
                match self
                    .stars
                    .toggle(Some(&self.identity), CommentId(comment_id))
                {
                    Ok(toggle) => Reaction {
                        messages: vec![ServerMessage::StarUpdated {
                            comment_id,
                            starred: toggle.starred,
                        }],
                        effects: vec![Effect::PushStar {
                            identity: self.identity.clone(),
                            toggle,
                        }],
                    },
                    Err(e) => self.rejected(e),
                }
            }
            ClientMessage::Reload => Reaction {
                messages: Vec::new(),
                effects: vec![self.reload_effect()],
            },
            ClientMessage::ReviewSkipped => {
                self.review_requested = true;
                Reaction {
                    messages: Vec::new(),
                    effects: vec![Effect::FetchSkipped {
                        identity: self.identity.clone(),
                        conversation_id: self.session.header().id,
                    }],
                }
            }
            ClientMessage::ResumeConversation => {
                self.review_requested = false;
                if let Some(review) = self.review.take() {
                    info!(review_id = %review.id(), "Left skipped-comments review");
                    self.gesture.cancel();
                }
                Reaction::message(self.state_message())
            }
        }
    }

    fn advance_effect(&self, ticket: AdvanceTicket) -> Effect {
        let active = self.active();
        Effect::ScheduleAdvance {
            session_id: active.id(),
            ticket,
            mode: active.mode(),
        }
    }

    fn reload_effect(&self) -> Effect {
        Effect::Reload {
            identity: self.identity.clone(),
            conversation_id: self.session.header().id,
        }
    }

    fn submitted(&self, submission: VoteSubmission) -> Reaction {
        let mut effects = vec![self.advance_effect(submission.advance())];
        if let VoteSubmission::Dispatched { pending, .. } = submission {
            effects.push(Effect::DispatchVote {
                session_id: self.active().id(),
                pending,
            });
        }
        Reaction {
            messages: vec![self.state_message()],
            effects,
        }
    }

    fn intent_applied(&self, outcome: IntentOutcome) -> Reaction {
        match outcome {
            IntentOutcome::Ignored => Reaction::default(),
            IntentOutcome::Voted(submission) => self.submitted(submission),
            IntentOutcome::Advanced => Reaction::message(self.state_message()),
        }
    }

    fn rejected(&self, err: SessionError) -> Reaction {
        if err == SessionError::Busy {
            debug!("Dropping intent while a previous one is in flight");
            return Reaction::default();
        }
        warn!(error = %err, "Intent rejected");
        Reaction::message(ServerMessage::from_session_error(&err))
    }

    //=====================================================================================
    // Task Completions
    //=====================================================================================

    pub fn handle_task_event(&mut self, event: TaskEvent) -> Reaction {
        match event {
            TaskEvent::VoteResolved {
                session_id,
                pending,
                result,
            } => {
                let comment_id = pending.comment_id;
                let Some(session) = self.session_by_id(session_id) else {
                    warn!(%session_id, %comment_id, "Dropping vote settlement for a closed session");
                    return Reaction::default();
                };
                match session.settle_vote(pending, result) {
                    Ok(settled) => match VoteOutcome::from_settled(settled) {
                        Some(outcome) => Reaction {
                            messages: vec![
                                ServerMessage::VoteSettled {
                                    comment_id: comment_id.0,
                                    outcome,
                                },
                                self.state_message(),
                            ],
                            effects: Vec::new(),
                        },
                        None => {
                            warn!(%comment_id, "Dropping stale vote settlement");
                            Reaction::default()
                        }
                    },
                    Err(e) => Reaction {
                        messages: vec![ServerMessage::from_session_error(&e), self.state_message()],
                        effects: Vec::new(),
                    },
                }
            }
            TaskEvent::AdvanceElapsed { session_id, ticket } => {
                let Some(session) = self.session_by_id(session_id) else {
                    warn!(%session_id, "Dropping advance for a closed session");
                    return Reaction::default();
                };
                if ticket.generation() != session.generation() {
                    warn!(
                        ticket = ticket.generation(),
                        current = session.generation(),
                        "Dropping stale advance"
                    );
                    return Reaction::default();
                }
                session.finish_advance(ticket);
                Reaction::message(self.state_message())
            }
            TaskEvent::CommentResolved(result) => {
                self.comment_in_flight = false;
                match result {
                    Ok(created) => Reaction {
                        messages: vec![ServerMessage::CommentCreated {
                            comment_id: created.id.map(|id| id.0),
                        }],
                        effects: vec![self.reload_effect()],
                    },
                    Err(e) => Reaction::message(ServerMessage::from_session_error(&e)),
                }
            }
            TaskEvent::StarResolved { toggle, result } => {
                match self.stars.settle(toggle, result) {
                    Ok(()) => Reaction::default(),
                    Err(e) => Reaction {
                        messages: vec![
                            ServerMessage::StarUpdated {
                                comment_id: toggle.comment_id.0,
                                starred: self.stars.is_starred(toggle.comment_id),
                            },
                            ServerMessage::from_session_error(&e),
                        ],
                        effects: Vec::new(),
                    },
                }
            }
            TaskEvent::Reloaded(result) => match result {
                Ok(conversation) => {
                    self.session.reload(conversation, &mut self.rng);
                    self.review = None;
                    self.review_requested = false;
                    self.gesture.cancel();
                    info!(session_id = %self.session.id(), "Session reloaded");
                    Reaction::message(self.state_message())
                }
                Err(e) => {
                    warn!(error = %e, "Reload failed, keeping the current snapshot");
                    Reaction::message(ServerMessage::from_session_error(
                        &SessionError::fetch_failed(e),
                    ))
                }
            },
            TaskEvent::SkippedLoaded(result) => {
                if !self.review_requested {
                    debug!("Dropping skipped comments, the review was abandoned");
                    return Reaction::default();
                }
                self.review_requested = false;
                match result {
                    Ok(skipped) => {
                        let review = VotingSession::start_review(
                            self.session.header().clone(),
                            skipped,
                            Some(self.identity.clone()),
                        );
                        self.review = Some(review);
                        self.gesture.cancel();
                        Reaction::message(self.state_message())
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to load skipped comments");
                        Reaction::message(ServerMessage::from_session_error(
                            &SessionError::fetch_failed(e),
                        ))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
