// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

//! The per-room revision log and synchronization protocol.
//!
//! Clients edit against some past revision and periodically submit their
//! local operations. The document transforms each submission against
//! everything committed since that client's base revision, commits the
//! transformed batch as a new revision, and replies with the operations the
//! client must replay to converge onto the server state.

use crate::ot::xform_multiple;
use crate::text::TextBuffer;
use crate::types::{Operation, SessionId};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// An atomic, authored batch of operations committed to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub changes: Vec<Operation>,
    pub author: SessionId,
    /// Index of this revision in its document's log; assigned at append
    /// time, never changes.
    pub revision_num: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The adapter must register a session with `join` before it submits.
    #[error("session {0:?} has not joined")]
    UnknownSession(SessionId),
}

#[derive(Debug, Default)]
pub struct Document {
    /// Append-only; `revisions[i].revision_num == i`.
    revisions: Vec<Revision>,
    /// Per session, the number of revisions it has acknowledged. A client
    /// at count `n` has seen exactly `revisions[..n]`.
    clients: HashMap<SessionId, usize>,
    text: TextBuffer,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session at the current tip. Idempotent: a repeat join
    /// snaps the session forward, discarding its acknowledged position.
    pub fn join(&mut self, session_id: &str) {
        self.clients.insert(session_id.to_owned(), self.revisions.len());
    }

    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.clients.contains_key(session_id)
    }

    pub fn is_on_latest(&self, session_id: &str) -> Result<bool, DocumentError> {
        let seen = self.acknowledged(session_id)?;
        Ok(seen == self.revisions.len())
    }

    #[must_use]
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    #[must_use]
    pub fn revision(&self, revision_num: usize) -> &Revision {
        &self.revisions[revision_num]
    }

    /// Every operation committed after the first `seen` revisions, in
    /// revision order then intra-revision order.
    pub fn changes_since(&self, seen: usize) -> impl Iterator<Item = &Operation> {
        self.revisions[seen..]
            .iter()
            .flat_map(|revision| revision.changes.iter())
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.render()
    }

    /// The central protocol operation.
    ///
    /// An empty submission is a pull: the session's base advances to the
    /// tip and it receives everything committed since its old base. A
    /// non-empty submission is transformed against those concurrent
    /// operations, committed as one new revision, applied to the text, and
    /// answered with the catch-up operations for the submitting client.
    pub fn submit(
        &mut self,
        session_id: &str,
        changes: Vec<Operation>,
    ) -> Result<Vec<Operation>, DocumentError> {
        let base = self.acknowledged(session_id)?;
        let concurrent: Vec<Operation> = self.changes_since(base).cloned().collect();
        if concurrent.len() > 50 {
            warn!(
                "session {session_id} is {} operations behind, it might have trouble catching up",
                concurrent.len()
            );
        }

        if changes.is_empty() {
            self.clients.insert(session_id.to_owned(), self.revisions.len());
            return Ok(concurrent);
        }

        let (for_client, for_server) = xform_multiple(changes, concurrent);
        for operation in &for_server {
            self.text.apply(operation);
        }
        let revision_num = self.add_revision(for_server, session_id);
        self.clients.insert(session_id.to_owned(), revision_num + 1);
        debug!(
            "session {session_id} committed revision {revision_num}, replying with {} operations",
            for_client.len()
        );

        Ok(for_client)
    }

    fn acknowledged(&self, session_id: &str) -> Result<usize, DocumentError> {
        self.clients
            .get(session_id)
            .copied()
            .ok_or_else(|| DocumentError::UnknownSession(session_id.to_owned()))
    }

    fn add_revision(&mut self, changes: Vec<Operation>, author: &str) -> usize {
        let revision_num = self.revisions.len();
        self.revisions.push(Revision {
            changes,
            author: author.to_owned(),
            revision_num,
        });
        revision_num
    }
}
