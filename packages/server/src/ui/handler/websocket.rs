//! WebSocket connection handler.
//!
//! One handler task per connection. The task owns the connection's room
//! binding (at most one room at any time) and translates inbound protocol
//! events into hub operations. Everything cross-connection goes through the
//! hub; other handlers never see this task's state.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, ExecutionRequest, RoomId, UserName},
    infrastructure::{dto::websocket::ClientEvent, hub::EventSink},
    ui::state::AppState,
};
use kobeya_shared::time::get_jst_timestamp;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// The room membership this connection currently holds.
struct Binding {
    room_id: RoomId,
    name: UserName,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::generate();
    tracing::info!("Connection '{}' established", connection_id);

    let (mut sender, mut receiver) = socket.split();

    // Channel the hub pushes outbound payloads into; the pump task forwards
    // them to the client in order.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound events are processed to completion, in order, one at a time.
    let mut binding: Option<Binding> = None;
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!("WebSocket error on '{}': {}", connection_id, e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        // Malformed input is dropped, never answered.
                        tracing::warn!(
                            "Dropping malformed event from '{}': {}",
                            connection_id,
                            e
                        );
                        continue;
                    }
                };
                handle_event(&state, connection_id, &tx, &mut binding, event).await;
            }
            Message::Ping(_) => {
                tracing::debug!("Received ping");
                // Ping/pong is handled automatically by the WebSocket protocol
            }
            Message::Close(_) => {
                tracing::info!("Connection '{}' requested close", connection_id);
                break;
            }
            _ => {}
        }
    }

    // Transport teardown acts as an implicit leave. `binding` was already
    // taken by an explicit leaveRoom, so this cannot double-remove or
    // re-broadcast a stale membership list.
    if let Some(binding) = binding.take() {
        state
            .hub
            .leave(
                connection_id,
                &binding.room_id,
                &binding.name,
                get_jst_timestamp(),
            )
            .await;
    }

    send_task.abort();
    tracing::info!("Connection '{}' disconnected", connection_id);
}

/// Apply one inbound event against the connection's binding state machine.
///
/// Events that require a binding are silently dropped while unbound; the
/// protocol has no error-reply events.
async fn handle_event(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    sink: &EventSink,
    binding: &mut Option<Binding>,
    event: ClientEvent,
) {
    match event {
        // The join payload's language field is accepted for wire
        // compatibility but does not overwrite room state.
        ClientEvent::Join {
            room_id,
            user_name,
            language: _,
        } => {
            let (room_id, name) =
                match (RoomId::try_from(room_id), UserName::try_from(user_name)) {
                    (Ok(room_id), Ok(name)) => (room_id, name),
                    _ => {
                        tracing::warn!(
                            "Dropping join with invalid room id or user name from '{}'",
                            connection_id
                        );
                        return;
                    }
                };

            // At most one room per connection: leave the old room first.
            if let Some(old) = binding.take() {
                state
                    .hub
                    .leave(connection_id, &old.room_id, &old.name, get_jst_timestamp())
                    .await;
            }

            state
                .hub
                .join(
                    connection_id,
                    sink.clone(),
                    room_id.clone(),
                    name.clone(),
                    get_jst_timestamp(),
                )
                .await;
            *binding = Some(Binding { room_id, name });
        }

        // The binding is authoritative for routing; the payload's roomId is
        // ignored so a connection can only ever write into its bound room.
        ClientEvent::CodeChange { room_id: _, code } => {
            let Some(binding) = binding.as_ref() else {
                tracing::debug!("Dropping codeChange from unbound connection '{}'", connection_id);
                return;
            };
            state
                .hub
                .set_code(connection_id, &binding.room_id, code)
                .await;
        }

        ClientEvent::Typing { .. } => {
            let Some(binding) = binding.as_ref() else {
                return;
            };
            state
                .hub
                .notify_typing(connection_id, &binding.room_id, &binding.name)
                .await;
        }

        ClientEvent::LanguageChange {
            room_id: _,
            language,
        } => {
            let Some(binding) = binding.as_ref() else {
                return;
            };
            state.hub.set_language(&binding.room_id, language).await;
        }

        ClientEvent::LeaveRoom => {
            // Taking the binding makes a later disconnect a no-op.
            if let Some(binding) = binding.take() {
                state
                    .hub
                    .leave(
                        connection_id,
                        &binding.room_id,
                        &binding.name,
                        get_jst_timestamp(),
                    )
                    .await;
            }
        }

        ClientEvent::CompileCode {
            code,
            room_id: _,
            language,
            version,
            input,
        } => {
            let Some(binding) = binding.as_ref() else {
                tracing::debug!(
                    "Dropping compileCode from unbound connection '{}'",
                    connection_id
                );
                return;
            };
            let room_id = binding.room_id.clone();

            // The stored buffer is untouched: the executed code is whatever
            // the requester currently holds locally. The provider call runs
            // outside any hub lock, so the room stays editable while the
            // request is in flight. One attempt, no retry.
            let request = ExecutionRequest {
                code,
                language,
                version,
                stdin: input,
            };
            let response = match state.execution.execute(request).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Execution request for room '{}' failed: {}", room_id, e);
                    // Error-shaped payload on the same response channel so the
                    // requester is never left waiting.
                    serde_json::json!({
                        "run": {"output": format!("Execution failed: {}", e)}
                    })
                }
            };
            state.hub.publish_execution_result(&room_id, response).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionError, MockExecutionGateway};
    use crate::infrastructure::SessionHub;
    use serde_json::{Value, json};

    fn test_state(execution: MockExecutionGateway) -> Arc<AppState> {
        Arc::new(AppState {
            hub: Arc::new(SessionHub::new()),
            execution: Arc::new(execution),
        })
    }

    fn connection() -> (
        ConnectionId,
        EventSink,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionId::generate(), tx, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            messages.push(serde_json::from_str(&raw).unwrap());
        }
        messages
    }

    fn join_event(room_id: &str, user_name: &str) -> ClientEvent {
        ClientEvent::Join {
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
            language: "javascript".to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_binds_connection_and_delivers_snapshot() {
        // given:
        let state = test_state(MockExecutionGateway::new());
        let (conn, tx, mut rx) = connection();
        let mut binding = None;

        // when:
        handle_event(&state, conn, &tx, &mut binding, join_event("r1", "alice")).await;

        // then:
        let bound = binding.as_ref().unwrap();
        assert_eq!(bound.room_id.as_str(), "r1");
        assert_eq!(bound.name.as_str(), "alice");

        let messages = drain(&mut rx);
        assert_eq!(messages[0]["type"], "codeUpdate");
        assert_eq!(messages[1]["type"], "userJoined");
    }

    #[tokio::test]
    async fn test_join_with_invalid_name_is_dropped() {
        // given:
        let state = test_state(MockExecutionGateway::new());
        let (conn, tx, mut rx) = connection();
        let mut binding = None;

        // when: empty user name fails validation
        handle_event(&state, conn, &tx, &mut binding, join_event("r1", "")).await;

        // then: still unbound, nothing delivered, no room created
        assert!(binding.is_none());
        assert!(drain(&mut rx).is_empty());
        assert!(state.hub.rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejoining_another_room_leaves_the_old_one() {
        // given: alice in r1, with bob watching r1
        let state = test_state(MockExecutionGateway::new());
        let (conn_a, tx_a, mut rx_a) = connection();
        let (conn_b, tx_b, mut rx_b) = connection();
        let mut binding_a = None;
        let mut binding_b = None;
        handle_event(&state, conn_a, &tx_a, &mut binding_a, join_event("r1", "alice")).await;
        handle_event(&state, conn_b, &tx_b, &mut binding_b, join_event("r1", "bob")).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        // when: alice joins r2 without an explicit leave
        handle_event(&state, conn_a, &tx_a, &mut binding_a, join_event("r2", "alice")).await;

        // then: bound to r2 only, and r1's membership no longer lists alice
        assert_eq!(binding_a.as_ref().unwrap().room_id.as_str(), "r2");
        let to_b = drain(&mut rx_b);
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0]["users"], json!(["bob"]));

        let r1 = state
            .hub
            .room(&RoomId::new("r1".to_string()).unwrap())
            .await
            .unwrap();
        assert_eq!(r1.participant_names(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_code_change_while_unbound_is_dropped() {
        // given:
        let state = test_state(MockExecutionGateway::new());
        let (conn, tx, mut rx) = connection();
        let mut binding = None;

        // when:
        handle_event(
            &state,
            conn,
            &tx,
            &mut binding,
            ClientEvent::CodeChange {
                room_id: "r1".to_string(),
                code: "x = 1".to_string(),
            },
        )
        .await;

        // then: no room, no delivery, no panic
        assert!(state.hub.rooms().await.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_code_change_routes_by_binding_not_payload() {
        // given: alice bound to r1, charlie in r2
        let state = test_state(MockExecutionGateway::new());
        let (conn_a, tx_a, mut rx_a) = connection();
        let (conn_c, tx_c, mut rx_c) = connection();
        let mut binding_a = None;
        let mut binding_c = None;
        handle_event(&state, conn_a, &tx_a, &mut binding_a, join_event("r1", "alice")).await;
        handle_event(&state, conn_c, &tx_c, &mut binding_c, join_event("r2", "charlie")).await;
        drain(&mut rx_a);
        drain(&mut rx_c);

        // when: alice's payload claims r2
        handle_event(
            &state,
            conn_a,
            &tx_a,
            &mut binding_a,
            ClientEvent::CodeChange {
                room_id: "r2".to_string(),
                code: "stolen".to_string(),
            },
        )
        .await;

        // then: the edit lands in the bound room, not the claimed one
        let r2 = state
            .hub
            .room(&RoomId::new("r2".to_string()).unwrap())
            .await
            .unwrap();
        assert_ne!(r2.code, "stolen");
        let r1 = state
            .hub
            .room(&RoomId::new("r1".to_string()).unwrap())
            .await
            .unwrap();
        assert_eq!(r1.code, "stolen");
        assert!(drain(&mut rx_c).is_empty());
    }

    #[tokio::test]
    async fn test_leave_then_disconnect_is_idempotent() {
        // given: alice and bob in r1
        let state = test_state(MockExecutionGateway::new());
        let (conn_a, tx_a, mut rx_a) = connection();
        let (conn_b, tx_b, mut rx_b) = connection();
        let mut binding_a = None;
        let mut binding_b = None;
        handle_event(&state, conn_a, &tx_a, &mut binding_a, join_event("r1", "alice")).await;
        handle_event(&state, conn_b, &tx_b, &mut binding_b, join_event("r1", "bob")).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        // when: explicit leave, then the disconnect path runs with the
        // binding already taken
        handle_event(&state, conn_a, &tx_a, &mut binding_a, ClientEvent::LeaveRoom).await;
        assert!(binding_a.is_none());
        if let Some(binding) = binding_a.take() {
            state
                .hub
                .leave(conn_a, &binding.room_id, &binding.name, 0)
                .await;
        }

        // then: exactly one membership broadcast reached bob
        let to_b = drain(&mut rx_b);
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0]["users"], json!(["bob"]));
    }

    #[tokio::test]
    async fn test_compile_broadcasts_result_to_whole_room() {
        // given: a provider that answers once
        let mut mock = MockExecutionGateway::new();
        mock.expect_execute()
            .times(1)
            .withf(|request| request.language == "python" && request.code == "print(1)")
            .returning(|_| Ok(json!({"run": {"output": "1\n", "code": 0}})));
        let state = test_state(mock);

        let (conn_a, tx_a, mut rx_a) = connection();
        let (conn_b, tx_b, mut rx_b) = connection();
        let mut binding_a = None;
        let mut binding_b = None;
        handle_event(&state, conn_a, &tx_a, &mut binding_a, join_event("r1", "alice")).await;
        handle_event(&state, conn_b, &tx_b, &mut binding_b, join_event("r1", "bob")).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        // when:
        handle_event(
            &state,
            conn_a,
            &tx_a,
            &mut binding_a,
            ClientEvent::CompileCode {
                code: "print(1)".to_string(),
                room_id: "r1".to_string(),
                language: "python".to_string(),
                version: "*".to_string(),
                input: String::new(),
            },
        )
        .await;

        // then: requester and the other member get the identical payload
        for rx in [&mut rx_a, &mut rx_b] {
            let messages = drain(rx);
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0]["type"], "codeResponse");
            assert_eq!(messages[0]["response"]["run"]["output"], "1\n");
        }

        // and the stored buffer is untouched
        let r1 = state
            .hub
            .room(&RoomId::new("r1".to_string()).unwrap())
            .await
            .unwrap();
        assert_ne!(r1.code, "print(1)");
    }

    #[tokio::test]
    async fn test_compile_failure_is_surfaced_to_the_room() {
        // given: a provider that fails
        let mut mock = MockExecutionGateway::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(ExecutionError::Status(503)));
        let state = test_state(mock);

        let (conn, tx, mut rx) = connection();
        let mut binding = None;
        handle_event(&state, conn, &tx, &mut binding, join_event("r1", "alice")).await;
        drain(&mut rx);

        // when:
        handle_event(
            &state,
            conn,
            &tx,
            &mut binding,
            ClientEvent::CompileCode {
                code: "print(1)".to_string(),
                room_id: "r1".to_string(),
                language: "python".to_string(),
                version: "*".to_string(),
                input: String::new(),
            },
        )
        .await;

        // then: an error-shaped payload on the same channel, not silence
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "codeResponse");
        let output = messages[0]["response"]["run"]["output"].as_str().unwrap();
        assert!(output.starts_with("Execution failed:"));
        assert!(output.contains("503"));
    }

    #[tokio::test]
    async fn test_compile_while_unbound_never_calls_the_provider() {
        // given:
        let mut mock = MockExecutionGateway::new();
        mock.expect_execute().never();
        let state = test_state(mock);

        let (conn, tx, mut rx) = connection();
        let mut binding = None;

        // when:
        handle_event(
            &state,
            conn,
            &tx,
            &mut binding,
            ClientEvent::CompileCode {
                code: "print(1)".to_string(),
                room_id: "r1".to_string(),
                language: "python".to_string(),
                version: "*".to_string(),
                input: String::new(),
            },
        )
        .await;

        // then:
        assert!(drain(&mut rx).is_empty());
    }
}
