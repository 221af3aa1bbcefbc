//! crates/deliberation_core/src/ledger.rs
//!
//! Client-side projection of the votes on a conversation snapshot.

use crate::domain::{Comment, CommentId, UserId, Vote, VoteTally, VoteValue};
use std::collections::{HashMap, HashSet};

/// What a (comment, voter) entry looked like before an optimistic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorEntry {
    /// The voter's entry in the comment's vote list, with its position.
    pub listed: Option<(usize, Vote)>,
    /// The backend-resolved vote cached on the comment.
    pub cached: Option<Vote>,
}

impl PriorEntry {
    /// The value the voter had before the write, as the session saw it.
    pub fn value(&self) -> Option<VoteValue> {
        self.cached
            .as_ref()
            .or(self.listed.as_ref().map(|(_, v)| v))
            .map(|v| v.value)
    }
}

/// Owns the comment snapshot and keeps at most one vote per (comment, voter).
///
/// Only the vote coordinator writes to the ledger.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    comments: Vec<Comment>,
    index: HashMap<CommentId, usize>,
}

impl VoteLedger {
    /// Builds the ledger from a snapshot. A comment id that appears more than
    /// once keeps only its last copy, at that copy's position.
    pub fn new(comments: Vec<Comment>) -> Self {
        let mut seen = HashSet::new();
        let mut comments: Vec<Comment> = comments
            .into_iter()
            .rev()
            .filter(|c| seen.insert(c.id))
            .collect();
        comments.reverse();

        let mut index = HashMap::with_capacity(comments.len());
        for (position, comment) in comments.iter_mut().enumerate() {
            dedupe_votes(&mut comment.votes);
            index.insert(comment.id, position);
        }
        Self { comments, index }
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn get(&self, comment_id: CommentId) -> Option<&Comment> {
        self.index.get(&comment_id).map(|&i| &self.comments[i])
    }

    pub fn contains(&self, comment_id: CommentId) -> bool {
        self.index.contains_key(&comment_id)
    }

    /// The voter's current vote: the backend-resolved cache first, then the vote list.
    pub fn user_vote(&self, comment_id: CommentId, voter: UserId) -> Option<&Vote> {
        let comment = self.get(comment_id)?;
        comment
            .user_vote
            .as_ref()
            .filter(|v| v.voter == voter)
            .or_else(|| comment.votes.iter().find(|v| v.voter == voter))
    }

    pub fn tally(&self, comment_id: CommentId) -> VoteTally {
        self.get(comment_id)
            .map(|c| VoteTally::from_votes(&c.votes))
            .unwrap_or_default()
    }

    /// Number of vote entries held for one (comment, voter) pair.
    pub fn entries_for(&self, comment_id: CommentId, voter: UserId) -> usize {
        self.get(comment_id)
            .map(|c| c.votes.iter().filter(|v| v.voter == voter).count())
            .unwrap_or(0)
    }

    /// Replaces the voter's entry with `vote`, returning what was there before.
    /// `None` when the comment is not part of this snapshot.
    pub(crate) fn record(&mut self, vote: Vote) -> Option<PriorEntry> {
        let &i = self.index.get(&vote.comment_id)?;
        let comment = &mut self.comments[i];

        let listed = comment
            .votes
            .iter()
            .position(|v| v.voter == vote.voter)
            .map(|pos| (pos, comment.votes.remove(pos)));
        let cached = comment
            .user_vote
            .take()
            .filter(|v| v.voter == vote.voter);

        comment.votes.push(vote.clone());
        comment.user_vote = Some(vote);
        Some(PriorEntry { listed, cached })
    }

    /// Puts the voter's entry back to what `prior` captured.
    pub(crate) fn restore(&mut self, comment_id: CommentId, voter: UserId, prior: PriorEntry) {
        let Some(&i) = self.index.get(&comment_id) else {
            return;
        };
        let comment = &mut self.comments[i];

        comment.votes.retain(|v| v.voter != voter);
        if let Some((pos, listed)) = prior.listed {
            let pos = pos.min(comment.votes.len());
            comment.votes.insert(pos, listed);
        }
        comment.user_vote = prior.cached;
    }
}

/// Keeps the last vote of each voter.
fn dedupe_votes(votes: &mut Vec<Vote>) {
    let mut seen = HashSet::new();
    let mut kept: Vec<Vote> = votes
        .drain(..)
        .rev()
        .filter(|v| seen.insert(v.voter))
        .collect();
    kept.reverse();
    *votes = kept;
}
