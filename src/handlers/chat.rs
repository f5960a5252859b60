// src/handlers/chat.rs

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use crate::{
    chat::{ClientCommand, ServerEvent},
    error::AppError,
    models::user::Role,
    services::doubts,
    state::AppState,
    utils::jwt::{Claims, verify_jwt},
};

/// Browsers cannot set headers on a socket handshake, so the token rides in
/// the query string.
#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub token: String,
}

/// Upgrades `/ws?token=<jwt>` to the doubt chat socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
) -> Result<Response, AppError> {
    let claims = verify_jwt(&params.token, &state.config.jwt_secret)?;
    let user_id = claims.user_id()?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, claims, user_id))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims, user_id: i64) {
    let role = claims.role();
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.chat.subscribe();
    // Replies meant for this socket only (errors).
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerEvent>(16);

    tracing::info!(user_id, role = role.as_str(), "Chat socket connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) if event.is_visible_to(user_id, role) => event,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id, skipped, "Chat socket lagged behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(event) = direct_rx.recv() => event,
            };

            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let outcome = match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(cmd) => handle_command(&state, user_id, role, cmd).await,
                    Err(e) => Err(AppError::BadRequest(format!("Unrecognised event: {e}"))),
                };
                if let Err(err) = outcome {
                    let message = match err {
                        AppError::InternalServerError(_) => "Internal Server Error".to_string(),
                        AppError::BadRequest(m)
                        | AppError::AuthError(m)
                        | AppError::Forbidden(m)
                        | AppError::NotFound(m)
                        | AppError::Conflict(m)
                        | AppError::ServiceUnavailable(m) => m,
                    };
                    if direct_tx.send(ServerEvent::Error { message }).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    tracing::info!(user_id, "Chat socket disconnected");
}

/// Applies one client command and publishes the resulting event.
async fn handle_command(
    state: &AppState,
    user_id: i64,
    role: Role,
    cmd: ClientCommand,
) -> Result<(), AppError> {
    match cmd {
        ClientCommand::DoubtUpdate { doubt_id, text } | ClientCommand::AdminReply { doubt_id, text } => {
            let message = doubts::text_message(user_id, role, &text)?;
            let doubt = doubts::append_message(&state.pool, doubt_id, user_id, role, message).await?;
            state.chat.publish(ServerEvent::for_message(&doubt, role));
        }
        ClientCommand::CloseDoubt { doubt_id } => {
            let doubt = doubts::close(
                &state.pool,
                doubt_id,
                user_id,
                role,
                state.config.doubt_ttl_days,
            )
            .await?;
            state.chat.publish(ServerEvent::closed(&doubt));
        }
    }
    Ok(())
}
