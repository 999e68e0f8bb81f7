// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

//! The WebSocket event frames exchanged with editor clients.
//!
//! Every frame is a JSON object `{"event": ..., "data": ...}`. Operation
//! payloads inside `data` use the positional arrays defined in
//! [`crate::types`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// The client has loaded the page for a room and wants a session.
    Joined(String),
    /// The client picked a display name (possibly empty).
    SubmitName(String),
    /// A batch of local edit operations, or an empty batch to pull.
    SendOperation(Value),
    /// A batch of drawn segments, or an empty batch to pull.
    SendDrawing(Value),
}

impl ClientEvent {
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Reply to `joined`: the session id the server assigned, the full
    /// canvas history, and the current roster.
    AfterJoin {
        session_id: String,
        lines: Value,
        names_and_colors: Value,
    },
    /// Broadcast to the whole room when a member submits a name.
    NewUserJoined {
        session_id: String,
        name: String,
        color: String,
    },
    /// Reply to `send-operation`, only to the originating session.
    CallBack(Value),
    /// Reply to `send-drawing`, only to the originating session.
    DrawCallBack(Value),
}

impl ServerEvent {
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("server event failed to serialize to JSON")
    }
}
