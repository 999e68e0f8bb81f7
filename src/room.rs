// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

use crate::document::Document;
use crate::drawing::Drawing;
use crate::types::SessionId;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Colors handed to members in joining order, wrapping around.
pub const COLOR_PALETTE: [&str; 5] = ["#AAFF00", "#FFAA00", "#FF00AA", "#AA00FF", "#00AAFF"];

/// Length of the public room ids minted by `/create/`.
pub const ROOM_ID_LEN: usize = 5;

/// One collaborative session: a text document, a drawing canvas, and the
/// roster of named members.
#[derive(Debug, Default)]
pub struct Room {
    pub document: Document,
    pub drawing: Drawing,
    /// Kept in joining order so the roster reads the same for everyone.
    members: Vec<(SessionId, String, String)>,
    color_index: usize,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session with the document and the drawing at their
    /// current tips.
    pub fn join(&mut self, session_id: &str) {
        self.document.join(session_id);
        self.drawing.join(session_id);
    }

    /// Add a session to the roster under a display name. Returns the
    /// color assigned to it.
    pub fn add_member(&mut self, session_id: &str, name: &str) -> String {
        let color = self.next_color();
        if let Some(member) = self
            .members
            .iter_mut()
            .find(|(member_id, _, _)| member_id == session_id)
        {
            member.1 = name.to_owned();
            member.2 = color.clone();
        } else {
            self.members
                .push((session_id.to_owned(), name.to_owned(), color.clone()));
        }
        color
    }

    #[must_use]
    pub fn has_member(&self, session_id: &str) -> bool {
        self.members
            .iter()
            .any(|(member_id, _, _)| member_id == session_id)
    }

    /// `(name, color)` pairs in joining order.
    #[must_use]
    pub fn roster(&self) -> Vec<(String, String)> {
        self.members
            .iter()
            .map(|(_, name, color)| (name.clone(), color.clone()))
            .collect()
    }

    fn next_color(&mut self) -> String {
        let color = COLOR_PALETTE[self.color_index];
        self.color_index = (self.color_index + 1) % COLOR_PALETTE.len();
        color.to_owned()
    }
}

/// A random alphanumeric string, used for room ids, session ids and
/// anonymous names.
#[must_use]
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
