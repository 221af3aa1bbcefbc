//! services/api/src/adapters/upstream.rs
//!
//! This module contains the HTTP adapter for the deliberation backend. It is the
//! concrete implementation of the conversation, vote, comment, star and identity
//! ports from the `core` crate, using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deliberation_core::domain::{
    Comment, CommentId, Conversation, ConversationHeader, ConversationId, CreatedComment,
    FlagStatus, Identity, UserId, Vote, VoteValue,
};
use deliberation_core::ports::{
    CommentService, ConversationService, IdentityService, PortError, PortResult, StarService,
    VoteReceipt, VoteService,
};
use reqwest::{header, Client, Response, StatusCode, Url};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::Config;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the backend ports over HTTP.
#[derive(Clone)]
pub struct UpstreamAdapter {
    client: Client,
    base_url: Url,
}

impl UpstreamAdapter {
    /// Creates a new `UpstreamAdapter`.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Builds the HTTP client from the gateway configuration.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.upstream_timeout).build()?;
        Ok(Self::new(client, config.upstream_base_url.clone()))
    }

    fn url(&self, path: &str) -> PortResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PortError::Unexpected(format!("Invalid upstream path '{}': {}", path, e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> PortResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<HashMap<String, Vec<String>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRecord {
    zid: i64,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    info_images: Option<Vec<String>>,
    #[serde(default, rename = "is_active")]
    is_active: Option<bool>,
    #[serde(default)]
    comments: Vec<CommentRecord>,
}

impl ConversationRecord {
    fn to_domain(self) -> Conversation {
        let id = ConversationId(self.zid);
        Conversation {
            header: ConversationHeader {
                id,
                topic: self.topic.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
                tags: self.tags.unwrap_or_default(),
                info_images: self.info_images.unwrap_or_default(),
                is_active: self.is_active.unwrap_or(true),
            },
            comments: self.comments.into_iter().map(|c| c.to_domain(id)).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentRecord {
    tid: i64,
    #[serde(default)]
    zid: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    uid: Option<i64>,
    #[serde(default)]
    txt: String,
    #[serde(default)]
    flag_status: Option<String>,
    #[serde(default)]
    is_seed: Option<bool>,
    #[serde(default)]
    votes: Vec<VoteRecord>,
    #[serde(default)]
    user_vote: Option<VoteRecord>,
}

impl CommentRecord {
    fn to_domain(self, conversation_id: ConversationId) -> Comment {
        let id = CommentId(self.tid);
        let conversation_id = self.zid.map(ConversationId).unwrap_or(conversation_id);
        Comment {
            id,
            conversation_id,
            author: self.uid.map(UserId),
            text: self.txt,
            flag_status: FlagStatus::from_wire(self.flag_status.as_deref()),
            is_seed: self.is_seed.unwrap_or(false),
            votes: self
                .votes
                .into_iter()
                .filter_map(|v| v.to_domain(id, conversation_id))
                .collect(),
            user_vote: self
                .user_vote
                .and_then(|v| v.to_domain(id, conversation_id)),
        }
    }
}

#[derive(Deserialize)]
struct VoteRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    uid: Option<i64>,
    vote: i64,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
}

impl VoteRecord {
    /// Votes without a voter or outside {-1, 0, 1} are dropped at the boundary.
    fn to_domain(self, comment_id: CommentId, conversation_id: ConversationId) -> Option<Vote> {
        let Some(uid) = self.uid else {
            warn!(%comment_id, "Dropping vote without a voter id");
            return None;
        };
        let value = match VoteValue::try_from(self.vote) {
            Ok(value) => value,
            Err(e) => {
                warn!(%comment_id, error = %e, "Dropping out-of-range vote");
                return None;
            }
        };
        Some(Vote {
            comment_id,
            conversation_id,
            voter: UserId(uid),
            value,
            cast_at: self.modified.or(self.created).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkippedRecord {
    #[serde(default)]
    skipped_comments: Vec<CommentRecord>,
}

#[derive(Deserialize)]
struct CreatedRecord {
    #[serde(default)]
    tid: Option<i64>,
}

#[derive(Deserialize)]
struct StarRecord {
    tid: i64,
}

#[derive(Deserialize)]
struct AuthSessionRecord {
    user: Option<AuthUserRecord>,
}

#[derive(Deserialize)]
struct AuthUserRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<i64>,
}

#[derive(Serialize)]
struct VoteBody {
    zid: i64,
    tid: i64,
    vote: i8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody<'a> {
    zid: i64,
    txt: &'a str,
    is_seed: bool,
}

#[derive(Serialize)]
struct StarBody {
    tid: i64,
}

/// Accepts ids sent either as numbers or as numeric strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Maps a non-success response to the generic port error.
async fn error_from_response(response: Response) -> PortError {
    let status = response.status();
    let body: ErrorBody = response.json().await.unwrap_or_default();

    if let Some((field, messages)) = body.errors.and_then(|errors| errors.into_iter().next()) {
        return PortError::Invalid {
            field,
            message: messages
                .into_iter()
                .next()
                .unwrap_or_else(|| "Validation error".to_string()),
        };
    }

    let reason = body
        .message
        .or(body.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(reason),
        s if s.is_client_error() => PortError::Rejected(reason),
        _ => PortError::Unexpected(format!("{}: {}", status, reason)),
    }
}

//=========================================================================================
// Port Trait Implementations
//=========================================================================================

#[async_trait]
impl ConversationService for UpstreamAdapter {
    async fn get_conversation(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
    ) -> PortResult<Conversation> {
        let url = self.url(&format!("/api/v1/conversations/{}", conversation_id))?;
        let response = self
            .send(
                self.client
                    .get(url)
                    .header(header::COOKIE, identity.cookie_header()),
            )
            .await?;

        let envelope: Envelope<ConversationRecord> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let record = envelope
            .data
            .ok_or_else(|| PortError::NotFound(format!("conversation {}", conversation_id)))?;
        debug!(%conversation_id, comments = record.comments.len(), "Fetched conversation");
        Ok(record.to_domain())
    }

    async fn skipped_comments(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
    ) -> PortResult<Vec<Comment>> {
        let mut url = self.url("/api/v1/user/conversations/skipped-comments")?;
        url.query_pairs_mut()
            .append_pair("zid", &conversation_id.to_string());
        let response = self
            .send(
                self.client
                    .get(url)
                    .header(header::COOKIE, identity.cookie_header()),
            )
            .await?;

        let envelope: Envelope<SkippedRecord> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let comments: Vec<Comment> = envelope
            .data
            .map(|record| record.skipped_comments)
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.to_domain(conversation_id))
            .collect();
        debug!(%conversation_id, comments = comments.len(), "Fetched skipped comments");
        Ok(comments)
    }
}

#[async_trait]
impl VoteService for UpstreamAdapter {
    async fn submit_vote(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
        comment_id: CommentId,
        value: VoteValue,
    ) -> PortResult<VoteReceipt> {
        let url = self.url("/api/v1/votes")?;
        let body = VoteBody {
            zid: conversation_id.0,
            tid: comment_id.0,
            vote: value.as_i8(),
        };
        let response = self
            .send(
                self.client
                    .post(url)
                    .header(header::COOKIE, identity.cookie_header())
                    .json(&body),
            )
            .await?;

        let envelope: Envelope<serde_json::Value> = response
            .json()
            .await
            .unwrap_or(Envelope {
                data: None,
                message: None,
            });
        match envelope.message.as_deref() {
            Some(m) if m.eq_ignore_ascii_case("vote updated") => Ok(VoteReceipt::Updated),
            _ => Ok(VoteReceipt::Recorded),
        }
    }
}

#[async_trait]
impl CommentService for UpstreamAdapter {
    async fn submit_comment(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
        text: &str,
        is_seed: bool,
    ) -> PortResult<CreatedComment> {
        let url = self.url("/api/v1/comments")?;
        let body = CommentBody {
            zid: conversation_id.0,
            txt: text,
            is_seed,
        };
        let response = self
            .send(
                self.client
                    .post(url)
                    .header(header::COOKIE, identity.cookie_header())
                    .json(&body),
            )
            .await?;

        let created = response
            .json::<Envelope<CreatedRecord>>()
            .await
            .ok()
            .and_then(|e| e.data)
            .and_then(|record| record.tid)
            .map(CommentId);
        Ok(CreatedComment {
            id: created,
            conversation_id,
        })
    }
}

#[async_trait]
impl StarService for UpstreamAdapter {
    async fn list_stars(&self, identity: &Identity) -> PortResult<Vec<CommentId>> {
        let url = self.url("/api/v1/user/stars")?;
        let response = self
            .send(
                self.client
                    .get(url)
                    .header(header::COOKIE, identity.cookie_header()),
            )
            .await?;
        let envelope: Envelope<Vec<StarRecord>> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|s| CommentId(s.tid))
            .collect())
    }

    async fn star(&self, identity: &Identity, comment_id: CommentId) -> PortResult<()> {
        let url = self.url("/api/v1/user/stars")?;
        self.send(
            self.client
                .post(url)
                .header(header::COOKIE, identity.cookie_header())
                .json(&StarBody { tid: comment_id.0 }),
        )
        .await?;
        Ok(())
    }

    async fn unstar(&self, identity: &Identity, comment_id: CommentId) -> PortResult<()> {
        let url = self.url("/api/v1/user/stars")?;
        self.send(
            self.client
                .delete(url)
                .header(header::COOKIE, identity.cookie_header())
                .json(&StarBody { tid: comment_id.0 }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityService for UpstreamAdapter {
    async fn resolve(&self, session_cookie: &str, session_token: &str) -> PortResult<Identity> {
        let url = self.url("/api/auth/session")?;
        let response = self
            .send(
                self.client
                    .get(url)
                    .header(header::COOKIE, format!("{}={}", session_cookie, session_token)),
            )
            .await?;
        let record: AuthSessionRecord = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let user_id = record
            .user
            .and_then(|u| u.id)
            .ok_or(PortError::Unauthorized)?;
        Ok(Identity {
            user_id: UserId(user_id),
            session_cookie: session_cookie.to_string(),
            session_token: session_token.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "tests/upstream_tests.rs"]
mod tests;
