//! crates/deliberation_core/src/stars.rs
//!
//! Comments a participant has starred, toggled optimistically.

use crate::{
    domain::{CommentId, Identity},
    error::SessionError,
    ports::{PortResult, StarService},
};
use std::collections::HashSet;
use tracing::warn;

/// A toggle applied locally and awaiting the star service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarToggle {
    pub comment_id: CommentId,
    /// The state the toggle moved to.
    pub starred: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StarSet {
    starred: HashSet<CommentId>,
    in_flight: HashSet<CommentId>,
}

impl StarSet {
    pub fn new(starred: impl IntoIterator<Item = CommentId>) -> Self {
        Self {
            starred: starred.into_iter().collect(),
            in_flight: HashSet::new(),
        }
    }

    pub fn is_starred(&self, comment_id: CommentId) -> bool {
        self.starred.contains(&comment_id)
    }

    /// Starred ids in ascending order.
    pub fn starred(&self) -> Vec<CommentId> {
        let mut ids: Vec<_> = self.starred.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn toggle(
        &mut self,
        identity: Option<&Identity>,
        comment_id: CommentId,
    ) -> Result<StarToggle, SessionError> {
        if identity.is_none() {
            return Err(SessionError::AuthRequired);
        }
        if !self.in_flight.insert(comment_id) {
            return Err(SessionError::Busy);
        }
        let starred = if self.starred.remove(&comment_id) {
            false
        } else {
            self.starred.insert(comment_id);
            true
        };
        Ok(StarToggle {
            comment_id,
            starred,
        })
    }

    /// Applies the star service's verdict, reverting the toggle on failure.
    pub fn settle(&mut self, toggle: StarToggle, result: PortResult<()>) -> Result<(), SessionError> {
        self.in_flight.remove(&toggle.comment_id);
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(comment_id = %toggle.comment_id, error = %e, "Star update failed, reverting");
                if toggle.starred {
                    self.starred.remove(&toggle.comment_id);
                } else {
                    self.starred.insert(toggle.comment_id);
                }
                Err(SessionError::from_port(e))
            }
        }
    }
}

pub async fn push_toggle(
    service: &dyn StarService,
    identity: &Identity,
    toggle: StarToggle,
) -> PortResult<()> {
    if toggle.starred {
        service.star(identity, toggle.comment_id).await
    } else {
        service.unstar(identity, toggle.comment_id).await
    }
}
