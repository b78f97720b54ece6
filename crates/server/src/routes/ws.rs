use axum::{
    Extension, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use services::services::{
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
    realtime::{Actor, ClientEvent, ProjectEvent},
};
use tokio::sync::mpsc::unbounded_channel;
use uuid::Uuid;

use crate::AppState;

pub async fn realtime_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = unbounded_channel::<Message>();
    state
        .realtime()
        .register_connection(connection_id, Actor::from(&user), tx);
    tracing::info!(user = %user.name, %connection_id, "Realtime connection established");

    let (mut sink, mut stream) = socket.split();

    // Outbound half: drain the hub's queue into the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Inbound half. The event channel carries room membership and ephemeral
    // signals only; state changes go through the REST mutation pipeline.
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => handle_client_event(&state, connection_id, &user, event).await,
                Err(err) => {
                    tracing::debug!(%connection_id, error = %err, "Unparseable client event");
                    state.realtime().send_to(
                        connection_id,
                        &ProjectEvent::Error {
                            message: "Unrecognized event".to_string(),
                        },
                    );
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Teardown happens before any pending work for this connection resolves:
    // the registry entry and all room memberships go synchronously.
    state.realtime().disconnect(connection_id);
    writer.abort();
    tracing::info!(user = %user.name, %connection_id, "Realtime connection closed");
}

async fn handle_client_event(
    state: &AppState,
    connection_id: Uuid,
    user: &AuthUser,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinProject { project_id } => {
            match PermissionGate::authorize(
                &state.db().pool,
                user.id,
                project_id,
                ProjectAction::JoinRoom,
            )
            .await
            {
                Ok(_) => state.realtime().join_project(connection_id, project_id),
                Err(err) => {
                    tracing::debug!(user = %user.name, %project_id, error = %err, "Room join denied");
                    state.realtime().send_to(
                        connection_id,
                        &ProjectEvent::Error {
                            message: err.to_string(),
                        },
                    );
                }
            }
        }
        ClientEvent::LeaveProject { project_id } => {
            state.realtime().leave_project(connection_id, project_id);
        }
        ClientEvent::TypingStart {
            project_id,
            task_id,
        } => {
            if state.realtime().is_member(connection_id, project_id) {
                state.realtime().relay(
                    project_id,
                    connection_id,
                    &ProjectEvent::TypingStart {
                        task_id,
                        user: Actor::from(user),
                    },
                );
            }
        }
        ClientEvent::TypingStop {
            project_id,
            task_id,
        } => {
            if state.realtime().is_member(connection_id, project_id) {
                state.realtime().relay(
                    project_id,
                    connection_id,
                    &ProjectEvent::TypingStop {
                        task_id,
                        user_id: user.id,
                    },
                );
            }
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(realtime_ws))
}
