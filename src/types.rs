// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};
use thiserror::Error;

pub type SessionId = String;

/// A coordinate into the document's character grid.
///
/// The derived ordering is lexicographic over `(row, column)`, which is
/// exactly the "happens at an earlier index" relation the transform
/// functions need. `column` is `-1` only on delete operations, where it
/// marks a row join (see [`Position::ROW_JOIN`]); it sorts before every
/// in-row column, including the join target's own column 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub row: usize,
    pub column: i32,
}

impl Position {
    /// Sentinel column of a delete that merges its row into the previous one.
    pub const ROW_JOIN: i32 = -1;

    #[must_use]
    pub const fn new(row: usize, column: i32) -> Self {
        Self { row, column }
    }

    #[must_use]
    pub const fn is_row_join(&self) -> bool {
        self.column == Self::ROW_JOIN
    }
}

/// A single edit against the shared document.
///
/// Operations are immutable values; transforming one yields a new
/// operation. `Identity` only ever appears as the result of two identical
/// deletes cancelling each other out, but once produced it is stored in the
/// revision log like any other operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert {
        position: Position,
        character: char,
        author: SessionId,
    },
    Delete {
        position: Position,
        author: SessionId,
    },
    Identity {
        author: SessionId,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("payload is not a JSON array of operations")]
    ExpectedBatch,
    #[error("operation is not a JSON array")]
    ExpectedArray,
    #[error("operation has no string tag")]
    MissingTag,
    #[error("unknown operation tag {0:?}")]
    UnknownTag(String),
    #[error("malformed position")]
    MalformedPosition,
    #[error("insert character must be a single code point")]
    MalformedCharacter,
    #[error("insert must not use the row-join column")]
    RowJoinInsert,
}

impl Operation {
    #[must_use]
    pub fn author(&self) -> &str {
        match self {
            Self::Insert { author, .. } | Self::Delete { author, .. } | Self::Identity { author } => {
                author
            }
        }
    }

    /// Encode as the positional array the clients speak:
    /// `["INS", [row, col], char, author]`, `["DEL", [row, col], author]`
    /// or `["ID", author]`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Insert {
                position,
                character,
                author,
            } => json!(["INS", [position.row, position.column], character, author]),
            Self::Delete { position, author } => {
                json!(["DEL", [position.row, position.column], author])
            }
            Self::Identity { author } => json!(["ID", author]),
        }
    }

    /// Decode one client-submitted operation. The connection's session id is
    /// imprinted as the author; any author field the client supplies is
    /// ignored. Clients may only submit inserts and deletes.
    pub fn from_wire(value: &Value, author: &str) -> Result<Self, WireError> {
        let parts = value.as_array().ok_or(WireError::ExpectedArray)?;
        let tag = parts
            .first()
            .and_then(Value::as_str)
            .ok_or(WireError::MissingTag)?;
        match tag {
            "INS" => {
                let position = position_from_wire(parts.get(1))?;
                if position.is_row_join() {
                    return Err(WireError::RowJoinInsert);
                }
                let character = parts
                    .get(2)
                    .and_then(Value::as_str)
                    .and_then(single_char)
                    .ok_or(WireError::MalformedCharacter)?;
                Ok(Self::Insert {
                    position,
                    character,
                    author: author.to_owned(),
                })
            }
            "DEL" => Ok(Self::Delete {
                position: position_from_wire(parts.get(1))?,
                author: author.to_owned(),
            }),
            other => Err(WireError::UnknownTag(other.to_owned())),
        }
    }

    /// Decode a whole submission. Any malformed element rejects the batch.
    pub fn decode_batch(payload: &Value, author: &str) -> Result<Vec<Self>, WireError> {
        payload
            .as_array()
            .ok_or(WireError::ExpectedBatch)?
            .iter()
            .map(|value| Self::from_wire(value, author))
            .collect()
    }

    #[must_use]
    pub fn encode_batch(operations: &[Self]) -> Value {
        Value::Array(operations.iter().map(Self::to_wire).collect())
    }
}

fn position_from_wire(value: Option<&Value>) -> Result<Position, WireError> {
    let pair = value
        .and_then(Value::as_array)
        .filter(|pair| pair.len() == 2)
        .ok_or(WireError::MalformedPosition)?;
    let row = pair[0].as_u64().ok_or(WireError::MalformedPosition)? as usize;
    let column = pair[1]
        .as_i64()
        .filter(|column| (i64::from(Position::ROW_JOIN)..=i64::from(i32::MAX)).contains(column))
        .ok_or(WireError::MalformedPosition)?;
    Ok(Position::new(row, column as i32))
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(character), None) => Some(character),
        _ => None,
    }
}

pub mod factories {
    use super::{Operation, Position};

    #[must_use]
    pub fn pos(row: usize, column: i32) -> Position {
        Position::new(row, column)
    }

    #[must_use]
    pub fn insert(row: usize, column: i32, character: char, author: &str) -> Operation {
        Operation::Insert {
            position: Position::new(row, column),
            character,
            author: author.to_owned(),
        }
    }

    #[must_use]
    pub fn delete(row: usize, column: i32, author: &str) -> Operation {
        Operation::Delete {
            position: Position::new(row, column),
            author: author.to_owned(),
        }
    }

    #[must_use]
    pub fn identity(author: &str) -> Operation {
        Operation::Identity {
            author: author.to_owned(),
        }
    }
}
