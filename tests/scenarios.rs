// SPDX-FileCopyrightText: 2026 copad contributors
//
// SPDX-License-Identifier: MIT

//! End-to-end synchronization scenarios against the document API, plus a
//! randomized multi-client simulation of the submit/reply protocol.

use copad::document::Document;
use copad::text::TextBuffer;
use copad::types::factories::*;
use copad::types::{Operation, Position};
use pretty_assertions::assert_eq;

/// Build a document whose text is `text`, committed by a `setup` session.
fn document_with_text(text: &str) -> Document {
    let mut document = Document::new();
    document.join("setup");
    let mut changes = Vec::new();
    let mut row = 0;
    let mut column = 0;
    for character in text.chars() {
        changes.push(insert(row, column, character, "setup"));
        if character == '\n' {
            row += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    document.submit("setup", changes).expect("setup session joined");
    assert_eq!(document.text(), text);
    document
}

#[test]
fn simple_insertion_convergence() {
    let mut document = Document::new();
    document.join("A");
    document.join("B");

    let reply = document
        .submit("A", vec![insert(0, 0, 'a', "A")])
        .expect("A joined");
    assert_eq!(reply, vec![]);
    assert_eq!(document.text(), "a");
    assert_eq!(document.revision_count(), 1);

    // B submits from the same base; the author tie-break sorts B's
    // character after A's.
    let reply = document
        .submit("B", vec![insert(0, 0, 'b', "B")])
        .expect("B joined");
    assert_eq!(reply, vec![insert(0, 0, 'a', "A")]);
    assert_eq!(document.text(), "ab");
    assert_eq!(document.revision(1).changes, vec![insert(0, 1, 'b', "B")]);
}

#[test]
fn newline_insert_splits_a_row() {
    let mut document = document_with_text("abc");
    document
        .submit("setup", vec![insert(0, 1, '\n', "setup")])
        .expect("setup joined");
    assert_eq!(document.text(), "a\nbc");
}

#[test]
fn row_join_delete_reverses_a_split() {
    let mut document = document_with_text("abc");
    document
        .submit("setup", vec![insert(0, 1, '\n', "setup")])
        .expect("setup joined");
    document
        .submit("setup", vec![delete(1, Position::ROW_JOIN, "setup")])
        .expect("setup joined");
    assert_eq!(document.text(), "abc");
}

#[test]
fn insert_shifted_by_concurrent_delete() {
    let mut document = document_with_text("abcd");
    document.join("A");
    document.join("B");

    document
        .submit("A", vec![delete(0, 1, "A")])
        .expect("A joined");
    assert_eq!(document.text(), "acd");

    let reply = document
        .submit("B", vec![insert(0, 3, 'X', "B")])
        .expect("B joined");
    assert_eq!(reply, vec![delete(0, 1, "A")]);
    assert_eq!(document.text(), "acXd");
    assert_eq!(
        document.revision(document.revision_count() - 1).changes,
        vec![insert(0, 2, 'X', "B")]
    );
}

#[test]
fn duplicate_delete_collapses_to_identity() {
    let mut document = document_with_text("ab");
    document.join("A");
    document.join("B");

    document
        .submit("A", vec![delete(0, 0, "A")])
        .expect("A joined");
    assert_eq!(document.text(), "b");

    let revisions_before = document.revision_count();
    let reply = document
        .submit("B", vec![delete(0, 0, "B")])
        .expect("B joined");
    // B already deleted the character locally, so its catch-up operation
    // is the collapsed no-op, and the committed revision holds one too.
    assert_eq!(reply, vec![identity("A")]);
    assert_eq!(document.text(), "b");
    assert_eq!(document.revision_count(), revisions_before + 1);
    assert_eq!(
        document.revision(document.revision_count() - 1).changes,
        vec![identity("B")]
    );
}

#[test]
fn empty_submission_pulls_everything_since_the_base() {
    let mut document = document_with_text("xy");
    document.join("A");

    document
        .submit("setup", vec![insert(0, 2, 'z', "setup")])
        .expect("setup joined");
    document
        .submit("setup", vec![delete(0, 0, "setup")])
        .expect("setup joined");

    let revisions_before = document.revision_count();
    let reply = document.submit("A", vec![]).expect("A joined");
    assert_eq!(
        reply,
        vec![insert(0, 2, 'z', "setup"), delete(0, 0, "setup")]
    );
    // A pull appends nothing and snaps the session to the tip.
    assert_eq!(document.revision_count(), revisions_before);
    assert_eq!(document.is_on_latest("A"), Ok(true));
    assert_eq!(document.submit("A", vec![]), Ok(vec![]));
}

#[test]
fn text_always_equals_the_fold_of_the_log() {
    let mut document = document_with_text("hello");
    document.join("A");
    document.join("B");
    document
        .submit("A", vec![insert(0, 5, '!', "A")])
        .expect("A joined");
    document
        .submit("B", vec![delete(0, 0, "B"), insert(0, 0, 'H', "B")])
        .expect("B joined");
    document.submit("A", vec![]).expect("A joined");

    let mut folded = TextBuffer::new();
    for revision_num in 0..document.revision_count() {
        for operation in &document.revision(revision_num).changes {
            folded.apply(operation);
        }
    }
    assert_eq!(folded.render(), document.text());
}

mod simulation {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// A client replica: it applies its own edits immediately and replays
    /// the server's reply operations when a submission returns.
    struct Client {
        session_id: String,
        text: TextBuffer,
    }

    impl Client {
        fn new(document: &mut Document, session_id: &str) -> Self {
            document.join(session_id);
            Self {
                session_id: session_id.to_owned(),
                text: TextBuffer::new(),
            }
        }

        fn edit(&mut self, rng: &mut StdRng, count: usize) -> Vec<Operation> {
            let mut changes = Vec::with_capacity(count);
            for _ in 0..count {
                let length = self.text.render().chars().count();
                let operation = if length > 0 && rng.gen_bool(0.4) {
                    delete(0, rng.gen_range(0..length) as i32, &self.session_id)
                } else {
                    insert(
                        0,
                        rng.gen_range(0..=length) as i32,
                        char::from(rng.gen_range(b'a'..=b'z')),
                        &self.session_id,
                    )
                };
                self.text.apply(&operation);
                changes.push(operation);
            }
            changes
        }

        fn submit(&mut self, document: &mut Document, changes: Vec<Operation>) {
            let reply = document
                .submit(&self.session_id, changes)
                .expect("client has joined");
            for operation in &reply {
                self.text.apply(operation);
            }
        }
    }

    #[test]
    fn replicas_converge_after_a_final_pull() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut document = Document::new();
            let mut clients: Vec<Client> = ["alice", "bob", "carol"]
                .into_iter()
                .map(|session_id| Client::new(&mut document, session_id))
                .collect();

            for _ in 0..20 {
                let picked = rng.gen_range(0..clients.len());
                let count = rng.gen_range(0..3);
                let client = &mut clients[picked];
                let changes = client.edit(&mut rng, count);
                client.submit(&mut document, changes);
            }

            // One idle pull per replica reaches the tip; pulls commit
            // nothing, so nobody falls behind again.
            for client in &mut clients {
                client.submit(&mut document, vec![]);
            }
            for client in &clients {
                assert_eq!(
                    client.text.render(),
                    document.text(),
                    "seed {seed}: replica {} diverged",
                    client.session_id
                );
            }
        }
    }
}
