//! crates/deliberation_core/src/cursor.rs
//!
//! Tracks which comment of the presentation order is on screen.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Browsing,
    Exhausted,
}

/// Position within the presentation order plus the viewed counter used for gating.
///
/// The cursor never moves backwards and never passes `len`; advancing an
/// exhausted cursor is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCursor {
    position: usize,
    viewed: usize,
    len: usize,
}

impl SessionCursor {
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            viewed: 0,
            len,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn viewed(&self) -> usize {
        self.viewed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn state(&self) -> CursorState {
        if self.position < self.len {
            CursorState::Browsing
        } else {
            CursorState::Exhausted
        }
    }

    /// Moves past the current comment. Returns false when already exhausted.
    pub fn advance(&mut self) -> bool {
        if self.position >= self.len {
            return false;
        }
        self.position += 1;
        self.viewed += 1;
        true
    }

    /// Starts over for a freshly fetched snapshot of `len` visible comments.
    pub fn reset(&mut self, len: usize) {
        *self = Self::new(len);
    }
}
