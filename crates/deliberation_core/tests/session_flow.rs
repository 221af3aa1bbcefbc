//! End-to-end session flows against in-memory ports.

use async_trait::async_trait;
use deliberation_core::{
    compose::submit_comment,
    coordinator::dispatch,
    Comment, CommentId, CommentService, Conversation, ConversationHeader, ConversationId,
    ConversationService, CreatedComment, FlagStatus, Identity, PortError, PortResult,
    CursorState, SessionError, SessionMode, UserId, ValidationRule, VoteReceipt, VoteService,
    VoteSettled, VoteSubmission, VoteValue, VotingSession,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{collections::HashMap, sync::Mutex};

fn identity() -> Identity {
    Identity {
        user_id: UserId(42),
        session_cookie: "next-auth.session-token".to_string(),
        session_token: "abc".to_string(),
    }
}

fn conversation(id: i64, comments: usize) -> Conversation {
    Conversation {
        header: ConversationHeader {
            id: ConversationId(id),
            topic: "Parks".to_string(),
            description: "Where should the new park go?".to_string(),
            tags: Vec::new(),
            info_images: Vec::new(),
            is_active: true,
        },
        comments: (1..=comments as i64)
            .map(|tid| Comment {
                id: CommentId(tid),
                conversation_id: ConversationId(id),
                author: None,
                text: format!("statement {tid}"),
                flag_status: FlagStatus::None,
                is_seed: false,
                votes: Vec::new(),
                user_vote: None,
            })
            .collect(),
    }
}

struct InMemoryBackend {
    conversations: HashMap<ConversationId, Conversation>,
    /// Comment ids whose votes the backend refuses.
    refuse: Vec<CommentId>,
    votes: Mutex<HashMap<(CommentId, UserId), VoteValue>>,
    comments: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    fn new(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations: conversations
                .into_iter()
                .map(|c| (c.header.id, c))
                .collect(),
            refuse: Vec::new(),
            votes: Mutex::new(HashMap::new()),
            comments: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConversationService for InMemoryBackend {
    async fn get_conversation(
        &self,
        _identity: &Identity,
        conversation_id: ConversationId,
    ) -> PortResult<Conversation> {
        self.conversations
            .get(&conversation_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("conversation {conversation_id}")))
    }

    /// Every comment the caller has no recorded vote on, newest first.
    async fn skipped_comments(
        &self,
        identity: &Identity,
        conversation_id: ConversationId,
    ) -> PortResult<Vec<Comment>> {
        let conversation = self.get_conversation(identity, conversation_id).await?;
        let votes = self.votes.lock().unwrap();
        Ok(conversation
            .comments
            .into_iter()
            .rev()
            .filter(|c| !votes.contains_key(&(c.id, identity.user_id)))
            .collect())
    }
}

#[async_trait]
impl VoteService for InMemoryBackend {
    async fn submit_vote(
        &self,
        identity: &Identity,
        _conversation_id: ConversationId,
        comment_id: CommentId,
        value: VoteValue,
    ) -> PortResult<VoteReceipt> {
        if self.refuse.contains(&comment_id) {
            return Err(PortError::Rejected("Conversation is closed".to_string()));
        }
        let mut votes = self.votes.lock().unwrap();
        match votes.insert((comment_id, identity.user_id), value) {
            Some(previous) if previous == value => {
                Err(PortError::Rejected("Already voted this way".to_string()))
            }
            Some(_) => Ok(VoteReceipt::Updated),
            None => Ok(VoteReceipt::Recorded),
        }
    }
}

#[async_trait]
impl CommentService for InMemoryBackend {
    async fn submit_comment(
        &self,
        _identity: &Identity,
        conversation_id: ConversationId,
        text: &str,
        _is_seed: bool,
    ) -> PortResult<CreatedComment> {
        if text.contains("forbidden") {
            return Err(PortError::Invalid {
                field: "txt".to_string(),
                message: "Invalid comment format".to_string(),
            });
        }
        let mut comments = self.comments.lock().unwrap();
        comments.push(text.to_string());
        Ok(CreatedComment {
            id: Some(CommentId(1000 + comments.len() as i64)),
            conversation_id,
        })
    }
}

#[tokio::test]
async fn fetch_vote_and_settle_round_trip() {
    let backend = InMemoryBackend::new(vec![conversation(5, 3)]);
    let mut rng = StdRng::seed_from_u64(3);
    let mut session = VotingSession::fetch(&backend, identity(), ConversationId(5), &mut rng)
        .await
        .unwrap();
    assert_eq!(session.visible_count(), 3);

    let current = session.current_comment().unwrap().id;
    let submission = session.submit_vote(current, VoteValue::Agree).unwrap();
    let VoteSubmission::Dispatched { pending, advance } = submission else {
        panic!("first vote should be dispatched");
    };
    session.finish_advance(advance);

    let result = dispatch(&backend, &pending).await;
    assert_eq!(session.settle_vote(pending, result), Ok(VoteSettled::Recorded));
    assert_eq!(session.user_vote(current), Some(VoteValue::Agree));
    assert_eq!(session.cursor().position(), 1);
}

#[tokio::test]
async fn refused_vote_is_rolled_back() {
    let mut backend = InMemoryBackend::new(vec![conversation(5, 2)]);
    backend.refuse.push(CommentId(2));
    let mut rng = StdRng::seed_from_u64(3);
    let mut session = VotingSession::fetch(&backend, identity(), ConversationId(5), &mut rng)
        .await
        .unwrap();

    let submission = session.submit_vote(CommentId(2), VoteValue::Disagree).unwrap();
    let pending = submission.pending().cloned().unwrap();
    let result = dispatch(&backend, &pending).await;

    assert_eq!(
        session.settle_vote(pending, result),
        Err(SessionError::RemoteRejected {
            reason: "Conversation is closed".to_string()
        })
    );
    assert_eq!(session.user_vote(CommentId(2)), None);
}

#[tokio::test]
async fn missing_conversation_fails_to_start() {
    let backend = InMemoryBackend::new(Vec::new());
    let mut rng = StdRng::seed_from_u64(3);
    let err = VotingSession::fetch(&backend, identity(), ConversationId(9), &mut rng)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::FetchFailed { .. }));
}

#[tokio::test]
async fn comment_submission_then_reload_resets_the_session() {
    let backend = InMemoryBackend::new(vec![conversation(5, 2)]);
    let mut rng = StdRng::seed_from_u64(3);
    let mut session = VotingSession::fetch(&backend, identity(), ConversationId(5), &mut rng)
        .await
        .unwrap();
    for _ in 0..2 {
        let ticket = session.skip().unwrap();
        session.finish_advance(ticket);
    }
    assert!(session.can_contribute());

    let text = vec!["proposal"; 75].join(" ");
    let draft = session.prepare_comment(&text, false).unwrap();
    let created = submit_comment(&backend, &draft).await.unwrap();
    assert_eq!(created.id, Some(CommentId(1001)));

    let refreshed = backend
        .get_conversation(&identity(), ConversationId(5))
        .await
        .unwrap();
    session.reload(refreshed, &mut rng);
    assert_eq!(session.cursor().position(), 0);
    assert_eq!(session.cursor().viewed(), 0);
    assert!(!session.can_contribute());
}

#[tokio::test]
async fn server_side_validation_is_reported_on_the_field() {
    let backend = InMemoryBackend::new(vec![conversation(5, 1)]);
    let mut rng = StdRng::seed_from_u64(3);
    let mut session = VotingSession::fetch(&backend, identity(), ConversationId(5), &mut rng)
        .await
        .unwrap();
    let ticket = session.skip().unwrap();
    session.finish_advance(ticket);

    let text = format!("forbidden {}", vec!["word"; 80].join(" "));
    let draft = session.prepare_comment(&text, false).unwrap();
    let Err(SessionError::Validation(err)) = submit_comment(&backend, &draft).await else {
        panic!("expected a validation error");
    };
    assert_eq!(err.field.wire_name(), "txt");
    assert_eq!(
        err.rule,
        ValidationRule::Rejected("Invalid comment format".to_string())
    );
}

#[tokio::test]
async fn skipped_comments_get_a_second_pass() {
    let backend = InMemoryBackend::new(vec![conversation(5, 4)]);
    let mut rng = StdRng::seed_from_u64(3);
    let mut session = VotingSession::fetch(&backend, identity(), ConversationId(5), &mut rng)
        .await
        .unwrap();

    let submission = session.submit_vote(CommentId(2), VoteValue::Agree).unwrap();
    let pending = submission.pending().cloned().unwrap();
    let result = dispatch(&backend, &pending).await;
    session.settle_vote(pending, result).unwrap();

    let mut review =
        VotingSession::fetch_review(&backend, identity(), session.header().clone())
            .await
            .unwrap();
    assert_eq!(review.mode(), SessionMode::SkippedReview);
    let ids: Vec<i64> = review.queue().map(|c| c.id.0).collect();
    assert_eq!(ids, vec![4, 3, 1]);

    let submission = review.submit_vote(CommentId(4), VoteValue::Disagree).unwrap();
    let VoteSubmission::Dispatched { pending, advance } = submission else {
        panic!("first vote should be dispatched");
    };
    assert!(review.finish_advance(advance));
    let result = dispatch(&backend, &pending).await;
    assert_eq!(review.settle_vote(pending, result), Ok(VoteSettled::Recorded));

    for _ in 0..2 {
        let ticket = review.skip().unwrap();
        review.finish_advance(ticket);
    }
    assert_eq!(review.cursor().state(), CursorState::Exhausted);

    // The main pass was untouched by the review.
    assert_eq!(session.user_vote(CommentId(4)), None);
    assert_eq!(session.cursor().position(), 0);

    let again = VotingSession::fetch_review(&backend, identity(), session.header().clone())
        .await
        .unwrap();
    assert_eq!(again.visible_count(), 2);
}
