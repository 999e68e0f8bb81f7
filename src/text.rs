// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

use crate::types::Operation;

/// The materialized document text: a grid of rows of characters.
///
/// The buffer always holds at least one (possibly empty) row. It performs no
/// clamping: operation coordinates are expected to be valid against the
/// current state, which the transform pipeline guarantees. An out-of-bounds
/// coordinate here means the transform rules were implemented incorrectly
/// and panics the owning task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    rows: Vec<Vec<char>>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self { rows: vec![Vec::new()] }
    }
}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> Self {
        Self {
            rows: text.split('\n').map(|row| row.chars().collect()).collect(),
        }
    }
}

impl TextBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Insert {
                position,
                character,
                ..
            } => {
                if *character == '\n' {
                    let right = self.rows[position.row].split_off(position.column as usize);
                    self.rows.insert(position.row + 1, right);
                } else {
                    self.rows[position.row].insert(position.column as usize, *character);
                }
            }
            Operation::Delete { position, .. } => {
                if position.is_row_join() {
                    assert!(position.row > 0, "cannot join row 0 into a previous row");
                    let row = self.rows.remove(position.row);
                    self.rows[position.row - 1].extend(row);
                } else {
                    self.rows[position.row].remove(position.column as usize);
                }
            }
            Operation::Identity { .. } => {}
        }
    }

    /// The rows joined by a single newline.
    #[must_use]
    pub fn render(&self) -> String {
        let rows: Vec<String> = self.rows.iter().map(|row| row.iter().collect()).collect();
        rows.join("\n")
    }
}
