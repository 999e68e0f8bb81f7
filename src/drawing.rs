// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

//! The shared line-drawing canvas.
//!
//! Same revision-log bookkeeping as the text document, but drawn segments
//! never conflict, so there is nothing to transform: a submission is
//! appended as-is and answered with the segments committed since the
//! caller's base.

use crate::document::DocumentError;
use crate::types::SessionId;
use serde_json::Value;
use std::collections::HashMap;

/// An authored batch of segments committed to the canvas log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRevision {
    pub changes: Vec<Value>,
    pub author: SessionId,
    pub revision_num: usize,
}

#[derive(Debug, Default)]
pub struct Drawing {
    revisions: Vec<SegmentRevision>,
    clients: HashMap<SessionId, usize>,
}

impl Drawing {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, session_id: &str) {
        self.clients.insert(session_id.to_owned(), self.revisions.len());
    }

    /// Every segment ever drawn, in commit order. Sent to joining clients.
    #[must_use]
    pub fn history(&self) -> Vec<Value> {
        self.changes_since(0)
    }

    #[must_use]
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    #[must_use]
    pub fn revision(&self, revision_num: usize) -> &SegmentRevision {
        &self.revisions[revision_num]
    }

    fn changes_since(&self, seen: usize) -> Vec<Value> {
        self.revisions[seen..]
            .iter()
            .flat_map(|revision| revision.changes.iter().cloned())
            .collect()
    }

    /// Append the caller's new segments and return the segments other
    /// sessions committed since the caller's base.
    pub fn add_changes(
        &mut self,
        changes: Vec<Value>,
        author: &str,
    ) -> Result<Vec<Value>, DocumentError> {
        let base = self
            .clients
            .get(author)
            .copied()
            .ok_or_else(|| DocumentError::UnknownSession(author.to_owned()))?;
        let concurrent = self.changes_since(base);

        if !changes.is_empty() {
            let revision_num = self.revisions.len();
            self.revisions.push(SegmentRevision {
                changes,
                author: author.to_owned(),
                revision_num,
            });
        }
        self.clients.insert(author.to_owned(), self.revisions.len());

        Ok(concurrent)
    }
}
