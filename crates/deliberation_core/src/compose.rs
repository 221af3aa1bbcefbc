//! crates/deliberation_core/src/compose.rs
//!
//! Client-side checks and submission for a participant's own comment.

use crate::{
    domain::{ConversationId, CreatedComment, Identity},
    error::{CommentField, SessionError, ValidationError, ValidationRule},
    ports::CommentService,
};
use tracing::{info, warn};

pub const MIN_WORDS: usize = 70;
pub const MAX_WORDS: usize = 150;
pub const MAX_CHARACTERS: usize = 10_000;

/// Whitespace-delimited tokens of the trimmed text.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Checks a comment body, returning its word count when it passes.
pub fn validate_comment(text: &str) -> Result<usize, ValidationError> {
    let trimmed = text.trim();
    let rule = |rule| ValidationError {
        field: CommentField::Text,
        rule,
    };

    if trimmed.is_empty() {
        return Err(rule(ValidationRule::Empty));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_CHARACTERS {
        return Err(rule(ValidationRule::TooManyCharacters {
            chars,
            max: MAX_CHARACTERS,
        }));
    }
    let words = count_words(trimmed);
    if words < MIN_WORDS {
        return Err(rule(ValidationRule::TooShort {
            words,
            min: MIN_WORDS,
        }));
    }
    if words > MAX_WORDS {
        return Err(rule(ValidationRule::TooLong {
            words,
            max: MAX_WORDS,
        }));
    }
    Ok(words)
}

/// A validated comment ready for the comment service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub conversation_id: ConversationId,
    pub text: String,
    pub is_seed: bool,
    pub identity: Identity,
}

impl CommentDraft {
    pub fn new(
        identity: Option<&Identity>,
        conversation_id: ConversationId,
        text: &str,
        is_seed: bool,
    ) -> Result<Self, SessionError> {
        let identity = identity.ok_or(SessionError::AuthRequired)?;
        validate_comment(text)?;
        Ok(Self {
            conversation_id,
            text: text.trim().to_string(),
            is_seed,
            identity: identity.clone(),
        })
    }
}

pub async fn submit_comment(
    service: &dyn CommentService,
    draft: &CommentDraft,
) -> Result<CreatedComment, SessionError> {
    match service
        .submit_comment(&draft.identity, draft.conversation_id, &draft.text, draft.is_seed)
        .await
    {
        Ok(created) => {
            info!(conversation_id = %draft.conversation_id, "Comment submitted");
            Ok(created)
        }
        Err(e) => {
            warn!(conversation_id = %draft.conversation_id, error = %e, "Comment submission failed");
            Err(SessionError::from_port(e))
        }
    }
}
