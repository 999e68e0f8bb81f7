// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

//! The HTTP and WebSocket adapter around the rooms.
//!
//! Every room is owned by a single tokio task and driven through a message
//! channel, so all document and canvas mutations for one room happen
//! strictly one after another. Different rooms run independently. The
//! WebSocket side decodes client events, forwards them to the owning task,
//! and replies only to the originating session; roster announcements fan
//! out over a per-room broadcast channel.

use crate::document::DocumentError;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::room::{random_string, Room, ROOM_ID_LEN};
use crate::types::Operation;
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info};

const SESSION_ID_LEN: usize = 16;

// These messages are sent to the task that owns a room.
enum RoomMessage {
    Join {
        session_id: String,
        response_tx: oneshot::Sender<(Value, Value)>,
    },
    SubmitName {
        session_id: String,
        name: String,
    },
    SubmitOperations {
        session_id: String,
        changes: Vec<Operation>,
        response_tx: oneshot::Sender<Result<Vec<Operation>, DocumentError>>,
    },
    SubmitSegments {
        session_id: String,
        segments: Vec<Value>,
        response_tx: oneshot::Sender<Result<Vec<Value>, DocumentError>>,
    },
    GetContent {
        response_tx: oneshot::Sender<String>,
    },
}

impl fmt::Debug for RoomMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            RoomMessage::Join { .. } => "join",
            RoomMessage::SubmitName { .. } => "submit name",
            RoomMessage::SubmitOperations { .. } => "submit operations",
            RoomMessage::SubmitSegments { .. } => "submit segments",
            RoomMessage::GetContent { .. } => "get content",
        };
        write!(f, "{repr}")
    }
}

/// Handle to the task owning one room.
#[derive(Clone)]
pub struct RoomHandle {
    message_tx: mpsc::Sender<RoomMessage>,
    event_tx: broadcast::Sender<ServerEvent>,
}

impl RoomHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_tx.subscribe()
    }

    pub async fn join(&self, session_id: &str) -> (Value, Value) {
        let (response_tx, response_rx) = oneshot::channel();
        let message = RoomMessage::Join {
            session_id: session_id.to_owned(),
            response_tx,
        };
        // Ignore send errors, because response_rx.await will fail anyway.
        let _ = self.message_tx.send(message).await;
        response_rx.await.expect("room task has been killed")
    }

    pub async fn submit_name(&self, session_id: &str, name: String) {
        let message = RoomMessage::SubmitName {
            session_id: session_id.to_owned(),
            name,
        };
        self.message_tx
            .send(message)
            .await
            .expect("room task has been killed");
    }

    pub async fn submit_operations(
        &self,
        session_id: &str,
        changes: Vec<Operation>,
    ) -> Result<Vec<Operation>, DocumentError> {
        let (response_tx, response_rx) = oneshot::channel();
        let message = RoomMessage::SubmitOperations {
            session_id: session_id.to_owned(),
            changes,
            response_tx,
        };
        let _ = self.message_tx.send(message).await;
        response_rx.await.expect("room task has been killed")
    }

    pub async fn submit_segments(
        &self,
        session_id: &str,
        segments: Vec<Value>,
    ) -> Result<Vec<Value>, DocumentError> {
        let (response_tx, response_rx) = oneshot::channel();
        let message = RoomMessage::SubmitSegments {
            session_id: session_id.to_owned(),
            segments,
            response_tx,
        };
        let _ = self.message_tx.send(message).await;
        response_rx.await.expect("room task has been killed")
    }

    pub async fn content(&self) -> String {
        let (response_tx, response_rx) = oneshot::channel();
        let _ = self
            .message_tx
            .send(RoomMessage::GetContent { response_tx })
            .await;
        response_rx.await.expect("room task has been killed")
    }
}

struct RoomActor {
    room: Room,
    message_rx: mpsc::Receiver<RoomMessage>,
    event_tx: broadcast::Sender<ServerEvent>,
}

impl RoomActor {
    fn spawn() -> RoomHandle {
        let (message_tx, message_rx) = mpsc::channel(16);
        let (event_tx, _) = broadcast::channel(16);
        let actor = RoomActor {
            room: Room::new(),
            message_rx,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(actor.run());
        RoomHandle {
            message_tx,
            event_tx,
        }
    }

    async fn run(mut self) {
        while let Some(message) = self.message_rx.recv().await {
            debug!("handling room message: {message:?}");
            self.handle_message(message);
        }
        debug!("room task stopping, all handles dropped");
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                session_id,
                response_tx,
            } => {
                self.room.join(&session_id);
                let lines = Value::Array(self.room.drawing.history());
                let names_and_colors = json!(self.room.roster());
                let _ = response_tx.send((lines, names_and_colors));
            }
            RoomMessage::SubmitName { session_id, name } => {
                let color = self.room.add_member(&session_id, &name);
                debug!("session {session_id} is now named {name:?}");
                // Nobody listening is fine; new subscribers get the roster
                // on join.
                let _ = self.event_tx.send(ServerEvent::NewUserJoined {
                    session_id,
                    name,
                    color,
                });
            }
            RoomMessage::SubmitOperations {
                session_id,
                changes,
                response_tx,
            } => {
                let pull = changes.is_empty();
                let reply = self.submit_operations(&session_id, changes);
                if reply.is_ok() {
                    if pull {
                        debug!("session {session_id} updated to the latest revision");
                    } else {
                        debug!("session {session_id} submitted new changes");
                    }
                }
                let _ = response_tx.send(reply);
            }
            RoomMessage::SubmitSegments {
                session_id,
                segments,
                response_tx,
            } => {
                let reply = self.room.drawing.add_changes(segments, &session_id);
                let _ = response_tx.send(reply);
            }
            RoomMessage::GetContent { response_tx } => {
                let _ = response_tx.send(self.room.document.text());
            }
        }
    }

    fn submit_operations(
        &mut self,
        session_id: &str,
        changes: Vec<Operation>,
    ) -> Result<Vec<Operation>, DocumentError> {
        if changes.is_empty() && self.room.document.is_on_latest(session_id)? {
            // Nothing to pull, nothing to commit.
            return Ok(Vec::new());
        }
        self.room.document.submit(session_id, changes)
    }
}

/// The process-wide room registry.
#[derive(Default)]
pub struct ServerState {
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl ServerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an unused room id and spawn the task owning the new room.
    pub async fn create_room(&self) -> String {
        let mut rooms = self.rooms.write().await;
        let mut room_id = random_string(ROOM_ID_LEN);
        while rooms.contains_key(&room_id) {
            room_id = random_string(ROOM_ID_LEN);
        }
        rooms.insert(room_id.clone(), RoomActor::spawn());
        info!("created room {room_id}");
        room_id
    }

    pub async fn room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }
}

pub fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/create/", get(create_room))
        .route("/editor/", get(editor_page))
        .route("/editor/ws", get(websocket_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_room(State(state): State<Arc<ServerState>>) -> Html<String> {
    let room_id = state.create_room().await;
    Html(render_redirect(&room_id))
}

#[derive(Deserialize)]
struct EditorQuery {
    editor_id: Option<String>,
}

async fn editor_page(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<EditorQuery>,
) -> Html<String> {
    let Some(room_id) = query.editor_id else {
        return Html(render_home(false));
    };
    match state.room(&room_id).await {
        Some(handle) => {
            let text = handle.content().await;
            Html(render_editor(&room_id, &text))
        }
        None => Html(render_home(true)),
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let session_id = random_string(SESSION_ID_LEN);
    info!("session {session_id} connected");
    let (mut sender, mut receiver) = socket.split();
    let mut room: Option<RoomHandle> = None;
    let mut events: Option<broadcast::Receiver<ServerEvent>> = None;

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    // Pings and pongs are answered by axum itself.
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => {
                        debug!("websocket error for session {session_id}: {error:#}");
                        break;
                    }
                };
                let event = match ClientEvent::from_json(&text) {
                    Ok(event) => event,
                    Err(error) => {
                        error!("could not parse message from session {session_id}: {error:#}");
                        continue;
                    }
                };
                if handle_event(&state, &session_id, event, &mut sender, &mut room, &mut events)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            event = next_broadcast(&mut events) => {
                if sender.send(Message::text(event.to_json())).await.is_err() {
                    break;
                }
            }
        }
    }
    info!("session {session_id} disconnected");
}

/// Dispatch one decoded client event. `Err` means the socket is gone;
/// protocol violations are logged and swallowed so the connection lives on.
async fn handle_event(
    state: &ServerState,
    session_id: &str,
    event: ClientEvent,
    sender: &mut SplitSink<WebSocket, Message>,
    room: &mut Option<RoomHandle>,
    events: &mut Option<broadcast::Receiver<ServerEvent>>,
) -> Result<()> {
    match event {
        ClientEvent::Joined(room_id) => {
            let Some(handle) = state.room(&room_id).await else {
                error!("session {session_id} tried to join non-existent room {room_id:?}");
                return Ok(());
            };
            // Subscribe before joining so no roster update can slip
            // between the two.
            let subscription = handle.subscribe();
            let (lines, names_and_colors) = handle.join(session_id).await;
            info!("session {session_id} joined room {room_id}");
            let reply = ServerEvent::AfterJoin {
                session_id: session_id.to_owned(),
                lines,
                names_and_colors,
            };
            sender.send(Message::text(reply.to_json())).await?;
            *room = Some(handle);
            *events = Some(subscription);
        }
        ClientEvent::SubmitName(name) => {
            let Some(handle) = room else {
                error!("session {session_id} submitted a name without joining a room");
                return Ok(());
            };
            let name = if name.is_empty() {
                format!("Anon {}", random_string(5))
            } else {
                name
            };
            handle.submit_name(session_id, name).await;
        }
        ClientEvent::SendOperation(payload) => {
            let Some(handle) = room else {
                error!("session {session_id} submitted operations without joining a room");
                return Ok(());
            };
            let changes = match Operation::decode_batch(&payload, session_id) {
                Ok(changes) => changes,
                Err(error) => {
                    error!("rejecting operation batch from session {session_id}: {error}");
                    return Ok(());
                }
            };
            match handle.submit_operations(session_id, changes).await {
                Ok(reply) => {
                    let reply = ServerEvent::CallBack(Operation::encode_batch(&reply));
                    sender.send(Message::text(reply.to_json())).await?;
                }
                Err(error) => error!("dropping submission from session {session_id}: {error}"),
            }
        }
        ClientEvent::SendDrawing(payload) => {
            let Some(handle) = room else {
                error!("session {session_id} submitted a drawing without joining a room");
                return Ok(());
            };
            let Value::Array(segments) = payload else {
                error!("rejecting drawing batch from session {session_id}: not a JSON array");
                return Ok(());
            };
            match handle.submit_segments(session_id, segments).await {
                Ok(reply) => {
                    let reply = ServerEvent::DrawCallBack(Value::Array(reply));
                    sender.send(Message::text(reply.to_json())).await?;
                }
                Err(error) => error!("dropping drawing from session {session_id}: {error}"),
            }
        }
    }
    Ok(())
}

async fn next_broadcast(events: &mut Option<broadcast::Receiver<ServerEvent>>) -> ServerEvent {
    let Some(receiver) = events else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(event) => return event,
            // Skipping lagged roster updates is fine, the next join
            // delivers the full roster anyway.
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
        }
    }
}

fn render_redirect(room_id: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta http-equiv=\"refresh\" content=\"0; url=/editor/?editor_id={room_id}\">\n\
         <title>copad</title>\n</head>\n<body>\n\
         <p>Your room is ready: <a href=\"/editor/?editor_id={room_id}\">{room_id}</a></p>\n\
         </body>\n</html>\n"
    )
}

fn render_editor(room_id: &str, text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>copad — {room_id}</title>\n</head>\n\
         <body data-editor-id=\"{room_id}\">\n\
         <pre id=\"document\">{}</pre>\n\
         <script src=\"/static/editor.js\" defer></script>\n\
         </body>\n</html>\n",
        escape_html(text)
    )
}

fn render_home(is_error: bool) -> String {
    let notice = if is_error {
        "<p class=\"error\">That room does not exist.</p>\n"
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>copad</title>\n</head>\n<body>\n{notice}\
         <form action=\"/editor/\" method=\"get\">\n\
         <input name=\"editor_id\" placeholder=\"room id\">\n\
         <button>Open</button>\n</form>\n\
         <p><a href=\"/create/\">Create a new room</a></p>\n\
         </body>\n</html>\n"
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn join_submit_and_read_back() {
        let handle = RoomActor::spawn();
        let (lines, names_and_colors) = handle.join("alice").await;
        assert_eq!(lines, json!([]));
        assert_eq!(names_and_colors, json!([]));

        let reply = handle
            .submit_operations("alice", vec![insert(0, 0, 'a', "alice")])
            .await
            .expect("alice has joined");
        assert_eq!(reply, vec![]);
        assert_eq!(handle.content().await, "a");
    }

    #[tokio::test]
    async fn submissions_without_join_are_refused() {
        let handle = RoomActor::spawn();
        let result = handle
            .submit_operations("ghost", vec![insert(0, 0, 'a', "ghost")])
            .await;
        assert_eq!(
            result,
            Err(DocumentError::UnknownSession("ghost".to_owned()))
        );
        assert_eq!(handle.content().await, "");
    }

    #[tokio::test]
    async fn name_submissions_are_broadcast_with_a_color() {
        let handle = RoomActor::spawn();
        handle.join("alice").await;
        let mut events = handle.subscribe();

        handle.submit_name("alice", "ada".to_owned()).await;
        let event = events.recv().await.expect("broadcast is alive");
        assert_eq!(
            event,
            ServerEvent::NewUserJoined {
                session_id: "alice".to_owned(),
                name: "ada".to_owned(),
                color: "#AAFF00".to_owned(),
            }
        );

        // The roster reaches later joiners through the join reply.
        let (_, names_and_colors) = handle.join("bob").await;
        assert_eq!(names_and_colors, json!([["ada", "#AAFF00"]]));
    }

    #[tokio::test]
    async fn drawing_segments_pass_through() {
        let handle = RoomActor::spawn();
        handle.join("alice").await;
        handle.join("bob").await;

        let reply = handle
            .submit_segments("alice", vec![json!([[0, 0], [1, 1]])])
            .await
            .expect("alice has joined");
        assert_eq!(reply, Vec::<Value>::new());

        let reply = handle
            .submit_segments("bob", vec![])
            .await
            .expect("bob has joined");
        assert_eq!(reply, vec![json!([[0, 0], [1, 1]])]);
    }

    #[tokio::test]
    async fn registry_mints_fresh_room_ids() {
        let state = ServerState::new();
        let room_id = state.create_room().await;
        assert_eq!(room_id.len(), ROOM_ID_LEN);
        assert!(state.room(&room_id).await.is_some());
        assert!(state.room("nope!").await.is_none());
    }

    #[test]
    fn html_escaping_covers_the_document() {
        assert_eq!(
            escape_html("if a < b && b > c {}"),
            "if a &lt; b &amp;&amp; b &gt; c {}"
        );
    }
}
