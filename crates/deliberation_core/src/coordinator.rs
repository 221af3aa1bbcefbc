//! crates/deliberation_core/src/coordinator.rs
//!
//! Optimistic vote application. A vote is written to the ledger before the
//! remote call is made, and rolled back if the vote service rejects it.

use crate::{
    domain::{CommentId, ConversationId, Identity, Vote, VoteValue},
    error::SessionError,
    ledger::{PriorEntry, VoteLedger},
    ports::{PortResult, VoteReceipt, VoteService},
};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, warn};

/// A vote written optimistically and awaiting the vote service's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVote {
    pub generation: u64,
    pub conversation_id: ConversationId,
    pub comment_id: CommentId,
    pub value: VoteValue,
    pub identity: Identity,
    prior: PriorEntry,
}

impl PendingVote {
    /// The voter's value before this submission, if any.
    pub fn previous_value(&self) -> Option<VoteValue> {
        self.prior.value()
    }
}

#[derive(Debug)]
pub(crate) enum VoteBegin {
    /// The voter already holds this value; nothing to send.
    Unchanged,
    Dispatch(PendingVote),
}

/// How a dispatched vote ended without a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteSettled {
    Recorded,
    Updated,
    /// The identical vote was already stored remotely; kept as-is.
    AlreadyVoted,
    /// Issued against a snapshot that has since been replaced; ignored.
    Stale,
}

/// Tracks which comments have a vote in flight.
#[derive(Debug, Clone, Default)]
pub struct VoteCoordinator {
    in_flight: HashSet<CommentId>,
}

impl VoteCoordinator {
    pub fn is_in_flight(&self, comment_id: CommentId) -> bool {
        self.in_flight.contains(&comment_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn begin(
        &mut self,
        ledger: &mut VoteLedger,
        generation: u64,
        conversation_id: ConversationId,
        identity: Option<&Identity>,
        comment_id: CommentId,
        value: VoteValue,
    ) -> Result<VoteBegin, SessionError> {
        let identity = identity.ok_or(SessionError::AuthRequired)?;
        if self.in_flight.contains(&comment_id) {
            return Err(SessionError::Busy);
        }
        if !ledger.contains(comment_id) {
            return Err(SessionError::UnknownComment(comment_id));
        }

        let existing = ledger
            .user_vote(comment_id, identity.user_id)
            .map(|v| v.value);
        if existing == Some(value) {
            debug!(%comment_id, ?value, "Vote unchanged, skipping dispatch");
            return Ok(VoteBegin::Unchanged);
        }

        let vote = Vote {
            comment_id,
            conversation_id,
            voter: identity.user_id,
            value,
            cast_at: Utc::now(),
        };
        let prior = ledger
            .record(vote)
            .ok_or(SessionError::UnknownComment(comment_id))?;
        self.in_flight.insert(comment_id);

        Ok(VoteBegin::Dispatch(PendingVote {
            generation,
            conversation_id,
            comment_id,
            value,
            identity: identity.clone(),
            prior,
        }))
    }

    pub(crate) fn settle(
        &mut self,
        ledger: &mut VoteLedger,
        current_generation: u64,
        pending: PendingVote,
        result: PortResult<VoteReceipt>,
    ) -> Result<VoteSettled, SessionError> {
        if pending.generation != current_generation {
            warn!(
                comment_id = %pending.comment_id,
                issued = pending.generation,
                current = current_generation,
                "Dropping vote resolution for a replaced snapshot"
            );
            return Ok(VoteSettled::Stale);
        }
        self.in_flight.remove(&pending.comment_id);

        match result {
            Ok(VoteReceipt::Recorded) => Ok(VoteSettled::Recorded),
            Ok(VoteReceipt::Updated) => Ok(VoteSettled::Updated),
            Err(e) if e.is_already_voted() => Ok(VoteSettled::AlreadyVoted),
            Err(e) => {
                warn!(comment_id = %pending.comment_id, error = %e, "Vote rejected, rolling back");
                ledger.restore(pending.comment_id, pending.identity.user_id, pending.prior);
                Err(SessionError::from_port(e))
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.in_flight.clear();
    }
}

/// Sends a pending vote to the vote service.
pub async fn dispatch(service: &dyn VoteService, pending: &PendingVote) -> PortResult<VoteReceipt> {
    service
        .submit_vote(
            &pending.identity,
            pending.conversation_id,
            pending.comment_id,
            pending.value,
        )
        .await
}
