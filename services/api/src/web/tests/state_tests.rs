use super::*;
use crate::web::protocol::{ErrorCode, ModePayload, TintPayload};
use deliberation_core::{
    AdvanceTicket, Comment, Conversation, ConversationHeader, ConversationId, CreatedComment,
    FlagStatus, PendingVote, PortError, SessionMode, UserId, VoteReceipt,
};
use rand::{rngs::StdRng, SeedableRng};

fn identity() -> Identity {
    Identity {
        user_id: UserId(42),
        session_cookie: "next-auth.session-token".to_string(),
        session_token: "token".to_string(),
    }
}

fn conversation(comments: usize) -> Conversation {
    Conversation {
        header: ConversationHeader {
            id: ConversationId(5),
            topic: "Transit".to_string(),
            description: "Bus lanes downtown".to_string(),
            tags: Vec::new(),
            info_images: Vec::new(),
            is_active: true,
        },
        comments: (1..=comments as i64).map(statement).collect(),
    }
}

fn statement(tid: i64) -> Comment {
    Comment {
        id: CommentId(tid),
        conversation_id: ConversationId(5),
        author: None,
        text: format!("statement {tid}"),
        flag_status: FlagStatus::None,
        is_seed: false,
        votes: Vec::new(),
        user_vote: None,
    }
}

fn connection(comments: usize) -> ConnectionState {
    let mut rng = StdRng::seed_from_u64(11);
    let session = VotingSession::start(conversation(comments), Some(identity()), &mut rng);
    ConnectionState::new(identity(), session, StarSet::default(), 1024.0, rng)
}

/// The comment on screen: the review's while one is open.
fn current_id(state: &ConnectionState) -> i64 {
    let active = state.review().unwrap_or(state.session());
    active.current_comment().unwrap().id.0
}

fn error_code(message: &ServerMessage) -> Option<ErrorCode> {
    match message {
        ServerMessage::Error { code, .. } => Some(*code),
        _ => None,
    }
}

fn state_payload(message: &ServerMessage) -> &SessionPayload {
    match message {
        ServerMessage::State(payload) => payload,
        other => panic!("expected a state message, got {other:?}"),
    }
}

/// Votes on the current comment and returns the pending vote and advance ticket.
fn vote_current(state: &mut ConnectionState, value: i64) -> (Reaction, i64) {
    let id = current_id(state);
    let reaction = state.handle_client_message(ClientMessage::Vote {
        comment_id: id,
        value,
    });
    (reaction, id)
}

/// A scheduled advance as the event loop would redeem it.
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    session_id: Uuid,
    ticket: AdvanceTicket,
    mode: SessionMode,
}

impl Scheduled {
    fn elapsed(self) -> TaskEvent {
        TaskEvent::AdvanceElapsed {
            session_id: self.session_id,
            ticket: self.ticket,
        }
    }
}

/// A dispatched vote as the event loop would settle it.
#[derive(Debug, Clone)]
struct Dispatched {
    session_id: Uuid,
    pending: PendingVote,
}

impl Dispatched {
    fn resolved(self, result: deliberation_core::PortResult<VoteReceipt>) -> TaskEvent {
        TaskEvent::VoteResolved {
            session_id: self.session_id,
            pending: self.pending,
            result,
        }
    }
}

fn take_effects(reaction: Reaction) -> (Option<Scheduled>, Option<Dispatched>) {
    let mut scheduled = None;
    let mut dispatched = None;
    for effect in reaction.effects {
        match effect {
            Effect::ScheduleAdvance {
                session_id,
                ticket,
                mode,
            } => {
                scheduled = Some(Scheduled {
                    session_id,
                    ticket,
                    mode,
                })
            }
            Effect::DispatchVote {
                session_id,
                pending,
            } => dispatched = Some(Dispatched { session_id, pending }),
            other => panic!("unexpected effect {other:?}"),
        }
    }
    (scheduled, dispatched)
}

#[test]
fn greeting_announces_the_session_then_its_state() {
    let state = connection(3);
    let greeting = state.greeting();
    assert_eq!(greeting.len(), 2);
    let ServerMessage::SessionInitialized { conversation, .. } = &greeting[0] else {
        panic!("expected session_initialized first");
    };
    assert_eq!(conversation.topic, "Transit");
    assert_eq!(state_payload(&greeting[1]).visible_count, 3);
}

#[test]
fn vote_is_optimistic_then_settled_and_advanced() {
    let mut state = connection(3);
    let (reaction, id) = vote_current(&mut state, 1);

    assert_eq!(reaction.messages.len(), 1);
    let payload = state_payload(&reaction.messages[0]);
    assert!(payload.is_advancing);
    assert_eq!(payload.current.as_ref().unwrap().user_vote, Some(1));

    let (ticket, pending) = take_effects(reaction);
    let reaction = state.handle_task_event(pending.unwrap().resolved(Ok(VoteReceipt::Recorded)));
    assert_eq!(
        reaction.messages[0],
        ServerMessage::VoteSettled {
            comment_id: id,
            outcome: VoteOutcome::Recorded
        }
    );

    let reaction = state.handle_task_event(ticket.unwrap().elapsed());
    let payload = state_payload(&reaction.messages[0]);
    assert_eq!(payload.position, 1);
    assert!(!payload.is_advancing);
}

#[test]
fn intents_during_an_advance_are_dropped_silently() {
    let mut state = connection(3);
    let (_, _) = vote_current(&mut state, 1);

    let reaction = state.handle_client_message(ClientMessage::Skip);
    assert!(reaction.messages.is_empty());
    assert!(reaction.effects.is_empty());
}

#[test]
fn refused_vote_is_reported_and_rolled_back() {
    let mut state = connection(2);
    let (reaction, id) = vote_current(&mut state, -1);
    let (_, pending) = take_effects(reaction);

    let reaction = state.handle_task_event(
        pending
            .unwrap()
            .resolved(Err(PortError::Rejected("Conversation is closed".to_string()))),
    );
    assert_eq!(error_code(&reaction.messages[0]), Some(ErrorCode::RemoteRejected));
    assert_eq!(state.session().user_vote(CommentId(id)), None);
}

#[test]
fn out_of_range_vote_value_is_a_bad_request() {
    let mut state = connection(2);
    let (reaction, _) = vote_current(&mut state, 4);
    assert_eq!(error_code(&reaction.messages[0]), Some(ErrorCode::BadRequest));
    assert!(reaction.effects.is_empty());
}

#[test]
fn advance_from_a_replaced_snapshot_is_dropped() {
    let mut state = connection(3);
    let reaction = state.handle_client_message(ClientMessage::Skip);
    let (ticket, _) = take_effects(reaction);

    let reaction = state.handle_task_event(TaskEvent::Reloaded(Ok(conversation(3))));
    assert_eq!(state_payload(&reaction.messages[0]).generation, 1);

    let reaction = state.handle_task_event(ticket.unwrap().elapsed());
    assert!(reaction.messages.is_empty());
    assert_eq!(state.session().cursor().position(), 0);
}

#[test]
fn failed_reload_keeps_the_current_snapshot() {
    let mut state = connection(3);
    let session_id = state.session().id();
    let reaction =
        state.handle_task_event(TaskEvent::Reloaded(Err(PortError::NotFound("gone".into()))));
    assert_eq!(error_code(&reaction.messages[0]), Some(ErrorCode::FetchFailed));
    assert_eq!(state.session().id(), session_id);
    assert_eq!(state.session().generation(), 0);
}

#[test]
fn comment_is_locked_until_enough_comments_were_viewed() {
    let mut state = connection(12);
    let text = vec!["idea"; 80].join(" ");
    let reaction = state.handle_client_message(ClientMessage::SubmitComment {
        text,
        is_seed: false,
    });
    assert_eq!(
        error_code(&reaction.messages[0]),
        Some(ErrorCode::ContributionLocked)
    );
}

#[test]
fn comment_submission_is_exclusive_and_reloads_when_created() {
    let mut state = connection(1);
    let reaction = state.handle_client_message(ClientMessage::Skip);
    let (ticket, _) = take_effects(reaction);
    state.handle_task_event(ticket.unwrap().elapsed());

    let text = vec!["idea"; 80].join(" ");
    let reaction = state.handle_client_message(ClientMessage::SubmitComment {
        text: text.clone(),
        is_seed: false,
    });
    assert!(matches!(reaction.effects[0], Effect::SubmitComment(_)));

    let again = state.handle_client_message(ClientMessage::SubmitComment {
        text,
        is_seed: false,
    });
    assert!(again.messages.is_empty());
    assert!(again.effects.is_empty());

    let reaction = state.handle_task_event(TaskEvent::CommentResolved(Ok(CreatedComment {
        id: Some(CommentId(77)),
        conversation_id: ConversationId(5),
    })));
    assert_eq!(
        reaction.messages[0],
        ServerMessage::CommentCreated {
            comment_id: Some(77)
        }
    );
    assert!(matches!(reaction.effects[0], Effect::Reload { .. }));
}

#[test]
fn short_comment_is_reported_on_the_text_field() {
    let mut state = connection(1);
    let reaction = state.handle_client_message(ClientMessage::Skip);
    let (ticket, _) = take_effects(reaction);
    state.handle_task_event(ticket.unwrap().elapsed());

    let reaction = state.handle_client_message(ClientMessage::SubmitComment {
        text: "too short".to_string(),
        is_seed: false,
    });
    let ServerMessage::Error { code, field, .. } = &reaction.messages[0] else {
        panic!("expected an error");
    };
    assert_eq!(*code, ErrorCode::Validation);
    assert_eq!(field.as_deref(), Some("txt"));
}

#[test]
fn failed_star_toggle_is_reverted() {
    let mut state = connection(2);
    let reaction = state.handle_client_message(ClientMessage::ToggleStar { comment_id: 1 });
    assert_eq!(
        reaction.messages[0],
        ServerMessage::StarUpdated {
            comment_id: 1,
            starred: true
        }
    );
    let Effect::PushStar { toggle, .. } = reaction.effects[0].clone() else {
        panic!("expected a star push");
    };

    let reaction = state.handle_task_event(TaskEvent::StarResolved {
        toggle,
        result: Err(PortError::Unexpected("timeout".into())),
    });
    assert_eq!(
        reaction.messages[0],
        ServerMessage::StarUpdated {
            comment_id: 1,
            starred: false
        }
    );
    assert!(!state.stars().is_starred(CommentId(1)));
}

#[test]
fn horizontal_swipe_gives_feedback_then_votes() {
    let mut state = connection(3);
    state.handle_client_message(ClientMessage::PointerDown { x: 500.0, y: 300.0 });

    let reaction = state.handle_client_message(ClientMessage::PointerMove { x: 300.0, y: 305.0 });
    let ServerMessage::SwipeFeedback { tint, offset_percent } = reaction.messages[0] else {
        panic!("expected swipe feedback");
    };
    assert_eq!(tint, TintPayload::Disagree);
    assert!(offset_percent < 0.0);

    let id = current_id(&state);
    let reaction = state.handle_client_message(ClientMessage::PointerUp { x: 350.0, y: 300.0 });
    assert_eq!(reaction.messages[0], ServerMessage::swipe_reset());
    assert_eq!(
        state.session().user_vote(CommentId(id)),
        Some(VoteValue::Disagree)
    );
    let (ticket, pending) = take_effects(reaction);
    assert!(ticket.is_some());
    assert_eq!(pending.unwrap().pending.value, VoteValue::Disagree);
}

#[test]
fn pointer_up_without_a_press_does_nothing() {
    let mut state = connection(3);
    let reaction = state.handle_client_message(ClientMessage::PointerUp { x: 0.0, y: 0.0 });
    assert!(reaction.messages.is_empty());
    assert!(reaction.effects.is_empty());
}

/// Opens a review over `skipped` and returns the reaction to its arrival.
fn open_review(state: &mut ConnectionState, skipped: Vec<i64>) -> Reaction {
    let reaction = state.handle_client_message(ClientMessage::ReviewSkipped);
    assert!(reaction.messages.is_empty());
    let Effect::FetchSkipped {
        conversation_id, ..
    } = &reaction.effects[0]
    else {
        panic!("expected a skipped-comments fetch");
    };
    assert_eq!(*conversation_id, ConversationId(5));

    state.handle_task_event(TaskEvent::SkippedLoaded(Ok(skipped
        .into_iter()
        .map(statement)
        .collect())))
}

#[test]
fn skipped_review_votes_in_backend_order_then_resumes() {
    let mut state = connection(4);
    let skip = take_effects(state.handle_client_message(ClientMessage::Skip)).0;
    state.handle_task_event(skip.unwrap().elapsed());
    let main_position = state.session().cursor().position();

    let reaction = open_review(&mut state, vec![3, 1]);
    let payload = state_payload(&reaction.messages[0]);
    assert_eq!(payload.mode, ModePayload::SkippedReview);
    assert_eq!(payload.current.as_ref().unwrap().id, 3);
    assert!(payload.can_contribute);
    let review_id = state.review().unwrap().id();

    let (reaction, id) = vote_current(&mut state, 1);
    assert_eq!(id, 3);
    let (scheduled, dispatched) = take_effects(reaction);
    let scheduled = scheduled.unwrap();
    let dispatched = dispatched.unwrap();
    assert_eq!(scheduled.session_id, review_id);
    assert_eq!(scheduled.mode, SessionMode::SkippedReview);
    assert_eq!(dispatched.session_id, review_id);

    state.handle_task_event(dispatched.resolved(Ok(VoteReceipt::Recorded)));
    let reaction = state.handle_task_event(scheduled.elapsed());
    let payload = state_payload(&reaction.messages[0]);
    assert_eq!(payload.current.as_ref().unwrap().id, 1);
    assert_eq!(
        state.review().unwrap().user_vote(CommentId(3)),
        Some(VoteValue::Agree)
    );
    assert_eq!(state.session().user_vote(CommentId(3)), None);

    let reaction = state.handle_client_message(ClientMessage::ResumeConversation);
    let payload = state_payload(&reaction.messages[0]);
    assert_eq!(payload.mode, ModePayload::Queue);
    assert_eq!(payload.position, main_position);
    assert!(state.review().is_none());
}

#[test]
fn main_vote_settles_while_reviewing() {
    let mut state = connection(3);
    let (reaction, id) = vote_current(&mut state, -1);
    let (scheduled, dispatched) = take_effects(reaction);
    let scheduled = scheduled.unwrap();
    assert_eq!(scheduled.mode, SessionMode::Queue);

    open_review(&mut state, vec![2]);
    let reaction = state.handle_task_event(
        dispatched
            .unwrap()
            .resolved(Err(PortError::Rejected("Conversation is closed".to_string()))),
    );
    assert_eq!(error_code(&reaction.messages[0]), Some(ErrorCode::RemoteRejected));
    assert_eq!(state.session().user_vote(CommentId(id)), None);

    state.handle_task_event(scheduled.elapsed());
    assert_eq!(state.session().cursor().position(), 1);
    assert_eq!(state.review().unwrap().cursor().position(), 0);
}

#[test]
fn advance_from_a_closed_review_is_dropped() {
    let mut state = connection(3);
    open_review(&mut state, vec![1, 2]);
    let (scheduled, _) = take_effects(state.handle_client_message(ClientMessage::Skip));
    state.handle_client_message(ClientMessage::ResumeConversation);

    let reaction = state.handle_task_event(scheduled.unwrap().elapsed());
    assert!(reaction.messages.is_empty());
    assert_eq!(state.session().cursor().position(), 0);
}

#[test]
fn skipped_comments_arriving_after_resume_are_ignored() {
    let mut state = connection(3);
    state.handle_client_message(ClientMessage::ReviewSkipped);
    state.handle_client_message(ClientMessage::ResumeConversation);

    let reaction = state.handle_task_event(TaskEvent::SkippedLoaded(Ok(vec![statement(2)])));
    assert!(reaction.messages.is_empty());
    assert!(state.review().is_none());
}

#[test]
fn failed_skipped_fetch_stays_on_the_queue() {
    let mut state = connection(3);
    state.handle_client_message(ClientMessage::ReviewSkipped);
    let reaction = state.handle_task_event(TaskEvent::SkippedLoaded(Err(PortError::Unauthorized)));
    assert_eq!(error_code(&reaction.messages[0]), Some(ErrorCode::FetchFailed));
    assert!(state.review().is_none());
}

#[test]
fn reload_closes_the_review() {
    let mut state = connection(3);
    open_review(&mut state, vec![1]);
    let reaction = state.handle_task_event(TaskEvent::Reloaded(Ok(conversation(3))));
    assert_eq!(state_payload(&reaction.messages[0]).mode, ModePayload::Queue);
    assert!(state.review().is_none());
}
