//! Session / Connection Handler (§4.4): the Axum WebSocket endpoint.
//! One `handle_socket` task per connection, running the
//! `INIT -> JOINED -> CLOSED` state machine over the sync protocol.

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast;

use crate::backend::error::BackendError;
use crate::backend::offline;
use crate::backend::room::{RoomHandle, Session as RoomSession};
use crate::backend::server::state::AppState;
use crate::shared::error::SharedError;
use crate::shared::ids::{ClientId, DocumentId};
use crate::shared::message::{ClientMessage, ErrorCode, ServerMessage};

/// Parse an incoming text frame, replying with a `Shared` message error
/// (rather than silently dropping the frame) when it doesn't decode.
async fn parse_client_message(socket: &mut WebSocket, text: &str) -> Option<ClientMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => Some(message),
        Err(e) => {
            let err = BackendError::Shared(SharedError::message(format!("unreadable client message: {e}")));
            send_server_message(socket, &err.into_wire_message()).await;
            None
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Everything bound once `join_room` succeeds.
struct Joined {
    room: RoomHandle,
    document_id: DocumentId,
    client_id: ClientId,
    broadcast_rx: broadcast::Receiver<ServerMessage>,
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let joined = loop {
        match await_join(&mut socket, &state).await {
            Ok(joined) => break joined,
            Err(Some(err)) => {
                let closes = err.closes_connection();
                send_error(&mut socket, err).await;
                if closes {
                    return;
                }
                // §7 ServerError propagation: reply, log, allow retry — the
                // client may send another join_room on the same socket.
            }
            Err(None) => return, // join deadline elapsed or socket closed during INIT
        }
    };

    run_joined_loop(socket, state, joined).await;
}

/// Drive the INIT state: accept only `join_room`, reply `NotInRoom` to
/// anything else, and enforce the join deadline.
async fn await_join(socket: &mut WebSocket, state: &AppState) -> Result<Joined, Option<BackendError>> {
    let deadline = tokio::time::sleep(state.config.join_deadline);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return Err(None),
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { return Err(None) };
                let Message::Text(text) = message else { continue };
                let Some(client_message) = parse_client_message(socket, &text).await else { continue };

                match client_message {
                    ClientMessage::JoinRoom { document_id, client_id, token } => {
                        return perform_join(socket, state, document_id, client_id, token).await.map_err(Some);
                    }
                    _ => {
                        send_server_message(socket, &ServerMessage::Error {
                            message: "join_room required before any other message".into(),
                            code: ErrorCode::NotInRoom,
                        }).await;
                    }
                }
            }
        }
    }
}

/// `join_room` steps 1-9 (§4.4).
async fn perform_join(
    socket: &mut WebSocket,
    state: &AppState,
    document_id: DocumentId,
    client_id: ClientId,
    token: String,
) -> Result<Joined, BackendError> {
    let identity = state.verifier.verify(&token).map_err(|e| {
        let err = BackendError::auth_failed(e.to_string());
        tracing::warn!("join_room rejected for {client_id}: {err}");
        err
    })?;

    let user = state
        .users
        .get_user_by_open_id(&identity.open_id)
        .await
        .map_err(|e| {
            let err = BackendError::server_error(e.to_string());
            tracing::error!("user lookup failed for {client_id}: {err}");
            err
        })?
        .ok_or_else(|| {
            let err = BackendError::user_not_found(identity.open_id.clone());
            tracing::warn!("join_room rejected for {client_id}: {err}");
            err
        })?;

    let room = state
        .rooms
        .get_or_create(document_id, state.storage.as_ref(), state.metadata.as_ref())
        .await
        .map_err(|err| {
            tracing::warn!("join_room rejected for {client_id} on document {document_id}: {err}");
            err
        })?;

    state
        .metadata
        .check_document_access(document_id, user.id)
        .await
        .map_err(|e| {
            let err = BackendError::server_error(e.to_string());
            tracing::error!("access check failed for {client_id} on document {document_id}: {err}");
            err
        })?
        .ok_or_else(|| {
            let err = BackendError::access_denied(format!("user {} on document {document_id}", user.id));
            tracing::warn!("join_room rejected for {client_id}: {err}");
            err
        })?;

    let color = state.colors.assign();

    if let Err(e) = state
        .storage
        .create_session(document_id, user.id, client_id.clone(), color)
        .await
    {
        tracing::warn!("failed to persist session record for {client_id}: {e}");
    }

    let session = RoomSession {
        client_id: client_id.clone(),
        user_id: user.id,
        document_id,
        color: color.to_string(),
        name: Some(user.name.clone()),
        position: 0,
        selection: None,
        last_heartbeat: Instant::now(),
    };

    let admit_result = room.admit(session).await;
    let broadcast_rx = room.subscribe();

    send_server_message(
        socket,
        &ServerMessage::RoomJoined {
            document_id,
            client_id: client_id.clone(),
            users: admit_result.members,
            doc_state: admit_result.full_state,
            lamport_time: admit_result.lamport,
        },
    )
    .await;

    match offline::recover_queue(&room, state.storage.as_ref(), &client_id, document_id).await {
        Ok(outcome) if outcome.recovered > 0 || outcome.conflicts > 0 => {
            send_server_message(
                socket,
                &ServerMessage::OfflineRecovered {
                    recovered: outcome.recovered,
                    conflicts: outcome.conflicts,
                },
            )
            .await;
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("offline recovery failed for {client_id}: {e}"),
    }

    Ok(Joined {
        room,
        document_id,
        client_id,
        broadcast_rx,
    })
}

/// Drive the JOINED state: dispatch incoming client messages, forward
/// broadcasts, and enforce the heartbeat timeout.
async fn run_joined_loop(mut socket: WebSocket, state: AppState, joined: Joined) {
    let Joined {
        room,
        document_id,
        client_id,
        mut broadcast_rx,
    } = joined;

    let mut last_heartbeat = Instant::now();
    let mut heartbeat_check = tokio::time::interval(state.config.heartbeat_interval);

    loop {
        tokio::select! {
            _ = heartbeat_check.tick() => {
                if last_heartbeat.elapsed() > state.config.heartbeat_timeout {
                    tracing::info!("closing stale connection {client_id} on document {document_id}");
                    break;
                }
            }
            broadcast_message = broadcast_rx.recv() => {
                match broadcast_message {
                    Ok(message) => {
                        if is_self_originated_update(&message, &client_id) {
                            continue;
                        }
                        send_server_message(&mut socket, &message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                let Some(client_message) = parse_client_message(&mut socket, &text).await else { continue };

                match client_message {
                    ClientMessage::Ping {} => {
                        last_heartbeat = Instant::now();
                        room.touch_heartbeat(&client_id).await;
                        send_server_message(&mut socket, &ServerMessage::Pong {}).await;
                    }
                    ClientMessage::Update { update, .. } => {
                        // §7 UpdateFailed: reply to sender only, connection stays open.
                        if let Err(e) = room.apply_remote(&update, &client_id, state.storage.as_ref()).await {
                            send_server_message(&mut socket, &e.into_wire_message()).await;
                        }
                    }
                    ClientMessage::SyncStep1 { state_vector, .. } => {
                        match room.compute_diff(&state_vector).await {
                            Ok(diff) => {
                                send_server_message(&mut socket, &ServerMessage::SyncStep2 {
                                    client_id: client_id.clone(),
                                    update: diff,
                                }).await;
                            }
                            Err(e) => {
                                send_server_message(&mut socket, &e.into_wire_message()).await;
                            }
                        }
                    }
                    ClientMessage::CursorUpdate(payload) => {
                        room.update_cursor(&client_id, payload.position, payload.selection).await;
                        if let Err(e) = state.storage.update_session_cursor(&client_id, payload.position, payload.selection).await {
                            tracing::warn!("failed to persist cursor for {client_id}: {e}");
                        }
                    }
                    ClientMessage::JoinRoom { .. } => {
                        // Already joined; a repeat join_room is a no-op.
                    }
                }
            }
        }
    }

    disconnect(&room, &state, &client_id, document_id).await;
}

/// §4.4 `disconnect`: leave, persist, checkpoint-and-drop if now empty.
async fn disconnect(room: &RoomHandle, state: &AppState, client_id: &ClientId, document_id: DocumentId) {
    room.leave(client_id).await;
    if let Err(e) = state.storage.delete_session(client_id).await {
        tracing::warn!("failed to delete session record for {client_id}: {e}");
    }
    state.rooms.drop_if_empty(document_id, state.storage.as_ref()).await;
}

/// §4.4 `update` step 3: the origin already holds the bytes it sent, so
/// its own echo on the shared broadcast channel is suppressed.
fn is_self_originated_update(message: &ServerMessage, client_id: &ClientId) -> bool {
    matches!(message, ServerMessage::Update { client_id: origin, .. } if origin == client_id)
}

async fn send_server_message(socket: &mut WebSocket, message: &ServerMessage) {
    let Ok(text) = serde_json::to_string(message) else { return };
    let _ = socket.send(Message::Text(text.into())).await;
}

async fn send_error(socket: &mut WebSocket, err: BackendError) {
    send_server_message(socket, &err.into_wire_message()).await;
}
