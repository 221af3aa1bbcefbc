//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! The loop owns the connection's session and is the only place it changes;
//! background tasks report back over a channel.

use crate::{
    error::ApiError,
    web::{
        protocol::{ClientMessage, ServerMessage},
        state::{AppState, ConnectionState, Reaction},
        tasks::{spawn_effect, TaskEvent},
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use deliberation_core::{stars::StarSet, ConversationId, Identity, VotingSession};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsSender = SplitSink<WebSocket, Message>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    info!(user_id = %identity.user_id, "New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initialization Phase ---
    let (conversation_id, viewport_width) = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Init {
                conversation_id,
                viewport_width,
            }) => (ConversationId(conversation_id), viewport_width),
            _ => {
                error!("First message was not a valid Init message.");
                let _ = send_message(
                    &mut sender,
                    &ServerMessage::bad_request("The first message must be init"),
                )
                .await;
                return;
            }
        },
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    let mut state = match start_session(&app_state, identity, conversation_id, viewport_width).await {
        Ok(state) => state,
        Err(message) => {
            let _ = send_message(&mut sender, &message).await;
            return;
        }
    };
    for message in state.greeting() {
        if let Err(e) = send_message(&mut sender, &message).await {
            error!("Failed to send session greeting: {}", e);
            return;
        }
    }

    // --- 2. Main Event Loop ---
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<TaskEvent>();
    let token = CancellationToken::new();

    loop {
        let reaction = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => {
                        debug!(?message, "Client message received");
                        state.handle_client_message(message)
                    }
                    Err(e) => {
                        warn!("Failed to deserialize client message: {}", e);
                        Reaction {
                            messages: vec![ServerMessage::bad_request(e.to_string())],
                            effects: Vec::new(),
                        }
                    }
                },
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket receive failed: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
            Some(event) = events_rx.recv() => state.handle_task_event(event),
        };

        if let Err(e) = deliver(&app_state, reaction, &mut sender, &events_tx, &token).await {
            error!("Failed to deliver to client: {}", e);
            break;
        }
    }

    // --- 3. Cleanup ---
    token.cancel();
    info!(session_id = %state.session().id(), "WebSocket connection closed.");
}

/// Fetches the conversation and the user's stars for a new connection.
async fn start_session(
    app_state: &AppState,
    identity: Identity,
    conversation_id: ConversationId,
    viewport_width: f64,
) -> Result<ConnectionState, ServerMessage> {
    let mut rng = StdRng::from_entropy();
    let session = VotingSession::fetch(
        app_state.conversations.as_ref(),
        identity.clone(),
        conversation_id,
        &mut rng,
    )
    .await
    .map_err(|e| {
        error!(%conversation_id, error = %e, "Failed to start voting session");
        ServerMessage::from_session_error(&e)
    })?;

    let stars = match app_state.stars.list_stars(&identity).await {
        Ok(starred) => StarSet::new(starred),
        Err(e) => {
            warn!(error = %e, "Failed to load starred comments, starting with none");
            StarSet::default()
        }
    };

    Ok(ConnectionState::new(identity, session, stars, viewport_width, rng))
}

/// Spawns the reaction's effects, then sends its messages in order.
async fn deliver(
    app_state: &Arc<AppState>,
    reaction: Reaction,
    sender: &mut WsSender,
    events: &UnboundedSender<TaskEvent>,
    token: &CancellationToken,
) -> Result<(), ApiError> {
    for effect in reaction.effects {
        spawn_effect(app_state.clone(), effect, events.clone(), token.child_token());
    }
    for message in &reaction.messages {
        send_message(sender, message).await?;
    }
    Ok(())
}

async fn send_message(sender: &mut WsSender, message: &ServerMessage) -> Result<(), ApiError> {
    let json = serde_json::to_string(message)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
