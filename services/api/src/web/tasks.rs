//! services/api/src/web/tasks.rs
//!
//! Background work for one connection. Every remote call and every advance
//! timer runs as its own task and posts a `TaskEvent` back to the connection's
//! event loop, which is the only place the session is mutated.
//!
//! Votes and advances name the session they belong to, so results for the
//! main queue and for a skipped-comments review never cross.

use crate::web::state::AppState;
use deliberation_core::{
    compose::{self, CommentDraft},
    coordinator,
    stars::{self, StarToggle},
    AdvanceTicket, Comment, Conversation, ConversationId, CreatedComment, Identity, PendingVote,
    PortResult, SessionError, SessionMode, VoteReceipt,
};
use std::sync::Arc;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Work the event loop asks to be started after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    DispatchVote {
        session_id: Uuid,
        pending: PendingVote,
    },
    ScheduleAdvance {
        session_id: Uuid,
        ticket: AdvanceTicket,
        mode: SessionMode,
    },
    SubmitComment(CommentDraft),
    PushStar {
        identity: Identity,
        toggle: StarToggle,
    },
    Reload {
        identity: Identity,
        conversation_id: ConversationId,
    },
    FetchSkipped {
        identity: Identity,
        conversation_id: ConversationId,
    },
}

/// A finished piece of background work, delivered to the event loop.
#[derive(Debug)]
pub enum TaskEvent {
    VoteResolved {
        session_id: Uuid,
        pending: PendingVote,
        result: PortResult<VoteReceipt>,
    },
    AdvanceElapsed {
        session_id: Uuid,
        ticket: AdvanceTicket,
    },
    CommentResolved(Result<CreatedComment, SessionError>),
    StarResolved {
        toggle: StarToggle,
        result: PortResult<()>,
    },
    Reloaded(PortResult<Conversation>),
    SkippedLoaded(PortResult<Vec<Comment>>),
}

/// Starts the task for `effect`. The task stops early once `token` is cancelled.
pub fn spawn_effect(
    app_state: Arc<AppState>,
    effect: Effect,
    events: UnboundedSender<TaskEvent>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let work = run_effect(&app_state, effect);
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Connection closed, background task cancelled");
            }
            event = work => {
                if events.send(event).is_err() {
                    debug!("Event loop gone, dropping task result");
                }
            }
        }
    })
}

async fn run_effect(app_state: &AppState, effect: Effect) -> TaskEvent {
    match effect {
        Effect::DispatchVote {
            session_id,
            pending,
        } => {
            let result = coordinator::dispatch(app_state.votes.as_ref(), &pending).await;
            TaskEvent::VoteResolved {
                session_id,
                pending,
                result,
            }
        }
        Effect::ScheduleAdvance {
            session_id,
            ticket,
            mode,
        } => {
            let delay = match mode {
                SessionMode::Queue => app_state.config.advance_delay,
                SessionMode::SkippedReview => mode.advance_delay(),
            };
            tokio::time::sleep(delay).await;
            TaskEvent::AdvanceElapsed { session_id, ticket }
        }
        Effect::SubmitComment(draft) => {
            TaskEvent::CommentResolved(compose::submit_comment(app_state.comments.as_ref(), &draft).await)
        }
        Effect::PushStar { identity, toggle } => {
            let result = stars::push_toggle(app_state.stars.as_ref(), &identity, toggle).await;
            TaskEvent::StarResolved { toggle, result }
        }
        Effect::Reload {
            identity,
            conversation_id,
        } => TaskEvent::Reloaded(
            app_state
                .conversations
                .get_conversation(&identity, conversation_id)
                .await,
        ),
        Effect::FetchSkipped {
            identity,
            conversation_id,
        } => TaskEvent::SkippedLoaded(
            app_state
                .conversations
                .skipped_comments(&identity, conversation_id)
                .await,
        ),
    }
}
