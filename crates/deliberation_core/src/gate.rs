//! crates/deliberation_core/src/gate.rs
//!
//! Decides when a participant may add a comment of their own.

/// Number of comments a participant views before contributing.
pub const CONTRIBUTION_THRESHOLD: usize = 10;

/// Eligible after viewing ten comments, or all of them in a shorter conversation.
pub fn can_contribute(viewed: usize, visible_count: usize) -> bool {
    viewed >= CONTRIBUTION_THRESHOLD || viewed >= visible_count
}

/// The compose surface is offered once the queue runs out, regardless of the threshold.
pub fn should_prompt_contribution(cursor: usize, visible_count: usize) -> bool {
    cursor >= visible_count
}
