//! Notification socket.
//!
//! The upgrade itself is public; the client authenticates in-band by
//! sending `{"action": "auth", "token": "<access token>"}` as its first
//! meaningful message. Until then every other message is ignored. A bad
//! or expired token gets a generic text reply and a policy-violation
//! close. After that the socket carries the principal's notifications and
//! accepts `{"action": "markAsRead", "id": "..."}`.

use std::fmt::Display;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;

use crate::auth::{Principal, TokenCodec, TokenError};
use crate::backend::Backend;
use crate::state::AppState;

const MAX_MESSAGE_SIZE: usize = 4 * 1024;
const AUTH_TIMEOUT: Duration = Duration::from_secs(60);

const REJECTED: &str = "Invalid access token";
const FETCH_FAILED: &str = "Failed to get notifications";
const MARK_FAILED: &str = "Failed to mark as read";

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ClientMessage {
    Auth { token: String },
    MarkAsRead { id: String },
}

#[derive(Debug)]
enum Handshake {
    Closed,
    TimedOut,
    Rejected(TokenError),
}

/// GET /ws
pub async fn notifications_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket: WebSocket| async move {
            let (outgoing, incoming) = socket.split();
            run_session(incoming, outgoing, &state.codec, state.backend.as_ref()).await;
        })
}

/// Drive one socket from handshake to close.
pub async fn run_session<R, W>(mut incoming: R, mut outgoing: W, codec: &TokenCodec, backend: &dyn Backend)
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let handshake = tokio::time::timeout(AUTH_TIMEOUT, authenticate(&mut incoming, codec))
        .await
        .unwrap_or(Err(Handshake::TimedOut));

    let principal = match handshake {
        Ok(principal) => principal,
        Err(Handshake::Closed) => {
            tracing::debug!("Notification socket closed before authenticating");
            return;
        }
        Err(reason) => {
            tracing::debug!("Rejecting notification socket: {:?}", reason);
            reject(&mut outgoing).await;
            return;
        }
    };

    tracing::info!(subject = %principal.subject_id, role = %principal.role, "Notification socket authenticated");
    if !push_notifications(&mut outgoing, backend, &principal).await {
        return;
    }

    while let Some(message) = incoming.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::MarkAsRead { id }) => {
                let sent = match backend.mark_notification_read(&principal, &id).await {
                    Ok(()) => push_notifications(&mut outgoing, backend, &principal).await,
                    Err(e) => {
                        tracing::warn!("Mark as read failed for {}: {}", principal.subject_id, e);
                        send(&mut outgoing, Message::Text(MARK_FAILED.to_string())).await
                    }
                };
                if !sent {
                    break;
                }
            }
            Ok(ClientMessage::Auth { .. }) => tracing::debug!("Socket already authenticated"),
            Err(e) => tracing::debug!("Ignoring unreadable socket message: {}", e),
        }
    }

    tracing::debug!(subject = %principal.subject_id, "Notification socket closed");
}

async fn authenticate<R>(incoming: &mut R, codec: &TokenCodec) -> Result<Principal, Handshake>
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(message) = incoming.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Auth { token }) => {
                return codec.validate_access_token(&token).map_err(Handshake::Rejected)
            }
            Ok(other) => tracing::debug!("Ignoring {:?} before authentication", other),
            Err(e) => tracing::debug!("Ignoring unreadable socket message: {}", e),
        }
    }
    Err(Handshake::Closed)
}

/// Returns false once the socket can no longer be written to.
async fn push_notifications<W>(outgoing: &mut W, backend: &dyn Backend, principal: &Principal) -> bool
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let text = match backend.notifications(principal).await {
        Ok(notifications) => notifications.to_string(),
        Err(e) => {
            tracing::warn!("Could not load notifications for {}: {}", principal.subject_id, e);
            FETCH_FAILED.to_string()
        }
    };
    send(outgoing, Message::Text(text)).await
}

async fn reject<W>(outgoing: &mut W)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    if send(outgoing, Message::Text(REJECTED.to_string())).await {
        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: REJECTED.into(),
        };
        send(outgoing, Message::Close(Some(frame))).await;
    }
}

async fn send<W>(outgoing: &mut W, message: Message) -> bool
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match outgoing.send(message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Notification socket write failed: {}", e);
            false
        }
    }
}
