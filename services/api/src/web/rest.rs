//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{http::StatusCode, response::Json};
use deliberation_core::compose::{self, MAX_CHARACTERS, MAX_WORDS, MIN_WORDS};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        validate_comment_handler,
    ),
    components(
        schemas(ValidateCommentRequest, ValidateCommentResponse)
    ),
    tags(
        (name = "Deliberation Gateway API", description = "Endpoints supporting the comment voting session.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ValidateCommentRequest {
    pub text: String,
}

/// The result of checking a draft comment against the length rules.
#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
pub struct ValidateCommentResponse {
    pub valid: bool,
    pub word_count: usize,
    pub min_words: usize,
    pub max_words: usize,
    pub max_characters: usize,
    /// Why the draft is not accepted yet, ready to show next to the form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Check a draft comment before submitting it.
///
/// The same word and character limits are enforced again when the comment is
/// submitted over the WebSocket.
#[utoipa::path(
    post,
    path = "/comments/validate",
    request_body = ValidateCommentRequest,
    responses(
        (status = 200, description = "Validation result for the draft", body = ValidateCommentResponse)
    )
)]
pub async fn validate_comment_handler(
    Json(request): Json<ValidateCommentRequest>,
) -> (StatusCode, Json<ValidateCommentResponse>) {
    let word_count = compose::count_words(&request.text);
    let message = compose::validate_comment(&request.text)
        .err()
        .map(|e| e.rule.to_string());

    (
        StatusCode::OK,
        Json(ValidateCommentResponse {
            valid: message.is_none(),
            word_count,
            min_words: MIN_WORDS,
            max_words: MAX_WORDS,
            max_characters: MAX_CHARACTERS,
            message,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn validate(text: String) -> ValidateCommentResponse {
        let (status, Json(body)) =
            validate_comment_handler(Json(ValidateCommentRequest { text })).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn accepts_a_draft_within_the_limits() {
        let body = validate(vec!["word"; 100].join(" ")).await;
        assert!(body.valid);
        assert_eq!(body.word_count, 100);
        assert_eq!(body.message, None);
    }

    #[tokio::test]
    async fn reports_how_many_words_are_missing() {
        let body = validate(vec!["word"; 60].join(" ")).await;
        assert!(!body.valid);
        assert_eq!(
            body.message.as_deref(),
            Some("Comment must be at least 70 words (10 more words needed)")
        );
    }

    #[test]
    fn openapi_document_lists_the_validate_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/comments/validate"));
    }
}
