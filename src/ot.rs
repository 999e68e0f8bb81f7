// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

//! Operation transformation over grid coordinates.
//!
//! Two clients may edit concurrently from the same base revision. To
//! converge, each side replays the other side's operations after shifting
//! their coordinates past its own edits. [`xform`] does this for a single
//! pair of operations; [`xform_multiple`] lifts it to two whole sequences:
//!
//! ```text
//!        l1      l2
//!     * ----> * ----> *
//!     |       |       |
//!  r1 |       |       | r1'
//!     v  l1'  v  l2'  v
//!     * ----> * ----> *
//!     |       |       |
//!  r2 |       |       | r2'
//!     v l1''  v l2''  v
//!     * ----> * ----> *
//! ```
//!
//! The right edge (`r1'`, `r2'`) is what the left side must still apply;
//! the bottom edge (`l1''`, `l2''`) is what the right side must still
//! apply. Both paths around the grid meet in the same document state.

use crate::types::{Operation, Position};

/// Transform `op1` against a concurrent `op2` that is applied first.
///
/// Returns the operation that has the effect `op1` intended against their
/// common base, expressed in coordinates valid after `op2`. Pure and total
/// over the three operation kinds.
#[must_use]
pub fn xform(op1: &Operation, op2: &Operation) -> Operation {
    match (op1, op2) {
        (Operation::Identity { .. }, _) | (_, Operation::Identity { .. }) => op1.clone(),
        (
            Operation::Insert {
                position,
                character,
                author,
            },
            Operation::Insert {
                position: other,
                character: other_character,
                author: other_author,
            },
        ) => insert_against_insert(*position, *character, author, *other, *other_character, other_author),
        (
            Operation::Insert {
                position,
                character,
                author,
            },
            Operation::Delete {
                position: other, ..
            },
        ) => insert_against_delete(*position, *character, author, *other),
        (
            Operation::Delete { position, author },
            Operation::Insert {
                position: other,
                character: other_character,
                ..
            },
        ) => delete_against_insert(*position, author, *other, *other_character),
        (
            Operation::Delete { position, author },
            Operation::Delete {
                position: other, ..
            },
        ) => delete_against_delete(*position, author, *other),
    }
}

/// Concurrent inserts. Ties at the same position are broken by author id,
/// which gives the one total order both sides of the diamond agree on.
fn insert_against_insert(
    position: Position,
    character: char,
    author: &str,
    other: Position,
    other_character: char,
    other_author: &str,
) -> Operation {
    let shifted = if position < other || (position == other && author < other_author) {
        position
    } else if other_character == '\n' {
        Position::new(position.row + 1, position.column)
    } else if other.row == position.row {
        Position::new(position.row, position.column + 1)
    } else {
        position
    };
    Operation::Insert {
        position: shifted,
        character,
        author: author.to_owned(),
    }
}

fn insert_against_delete(
    position: Position,
    character: char,
    author: &str,
    other: Position,
) -> Operation {
    let shifted = if position <= other {
        position
    } else if other.is_row_join() {
        Position::new(position.row - 1, position.column)
    } else if other.row == position.row {
        Position::new(position.row, position.column - 1)
    } else {
        position
    };
    Operation::Insert {
        position: shifted,
        character,
        author: author.to_owned(),
    }
}

/// Unlike the insert/insert case there is no author tie-break here: a delete
/// at the very position of a concurrent insert targets the character the
/// insert pushed aside, so it always shifts.
fn delete_against_insert(
    position: Position,
    author: &str,
    other: Position,
    other_character: char,
) -> Operation {
    let shifted = if position < other {
        position
    } else if other_character == '\n' {
        Position::new(position.row + 1, position.column)
    } else if other.row == position.row {
        Position::new(position.row, position.column + 1)
    } else {
        position
    };
    Operation::Delete {
        position: shifted,
        author: author.to_owned(),
    }
}

fn delete_against_delete(position: Position, author: &str, other: Position) -> Operation {
    if position < other {
        Operation::Delete {
            position,
            author: author.to_owned(),
        }
    } else if position != other {
        let shifted = if other.is_row_join() {
            Position::new(position.row - 1, position.column)
        } else if other.row == position.row {
            Position::new(position.row, position.column - 1)
        } else {
            position
        };
        Operation::Delete {
            position: shifted,
            author: author.to_owned(),
        }
    } else {
        // The same character was deleted on both sides; one side already
        // performed it, so the other collapses to a no-op.
        Operation::Identity {
            author: author.to_owned(),
        }
    }
}

/// Transform two concurrent operation sequences against each other.
///
/// `lefts` and `rights` both start from the same base state. Returns
/// `(for_left, for_right)`, the catch-up sequences: a replica that has
/// applied `lefts` reaches the converged state by applying `for_left`, and
/// one that has applied `rights` by applying `for_right`. Runs in
/// O(`lefts.len()` × `rights.len()`).
#[must_use]
pub fn xform_multiple(
    lefts: Vec<Operation>,
    rights: Vec<Operation>,
) -> (Vec<Operation>, Vec<Operation>) {
    let mut current_rights = rights;
    let mut for_right = Vec::with_capacity(lefts.len());

    for left in lefts {
        let mut next_rights = Vec::with_capacity(current_rights.len());
        let mut current_left = left;

        for right in &current_rights {
            next_rights.push(xform(right, &current_left));
            current_left = xform(&current_left, right);
        }

        for_right.push(current_left);
        current_rights = next_rights;
    }

    (current_rights, for_right)
}
