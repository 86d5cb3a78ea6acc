use docflow_reactive::ChangeEventBuffer;
use docflow_types::{ChangeEvent, ChangeOp, DatabaseIdentity};
use pretty_assertions::assert_eq;
use serde_json::json;

fn event(db: &DatabaseIdentity, op: ChangeOp, doc: &str, age: u32) -> ChangeEvent {
    ChangeEvent::from_write(
        op,
        db,
        Some("humans"),
        Some(doc),
        Some(json!({ "id": doc, "age": age })),
        false,
    )
}

fn filled(limit: usize, count: u32) -> ChangeEventBuffer {
    let db = DatabaseIdentity::new("buffer").unwrap();
    let mut buffer = ChangeEventBuffer::new(limit);
    for i in 0..count {
        buffer.push(event(&db, ChangeOp::Insert, &format!("doc{}", i), i));
    }
    buffer
}

// ── Capacity ─────────────────────────────────────────────────────

#[test]
fn keeps_only_the_newest_events() {
    let buffer = filled(10, 11);
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.counter(), 11);

    let retained = buffer.get_from(2).unwrap();
    assert_eq!(retained.first().unwrap().doc_id(), Some("doc1"));
    assert_eq!(retained.last().unwrap().doc_id(), Some("doc10"));
}

#[test]
fn push_returns_sequence_numbers() {
    let db = DatabaseIdentity::new("buffer").unwrap();
    let mut buffer = ChangeEventBuffer::new(2);
    assert!(buffer.is_empty());
    assert_eq!(buffer.push(event(&db, ChangeOp::Insert, "a", 1)), 1);
    assert_eq!(buffer.push(event(&db, ChangeOp::Insert, "b", 1)), 2);
    assert_eq!(buffer.push(event(&db, ChangeOp::Insert, "c", 1)), 3);
    assert_eq!(buffer.len(), 2);
}

#[test]
fn zero_limit_is_raised_to_one() {
    assert_eq!(ChangeEventBuffer::new(0).limit(), 1);
}

// ── get_from ─────────────────────────────────────────────────────

#[test]
fn get_from_start_returns_everything() {
    let buffer = filled(10, 10);
    assert_eq!(buffer.get_from(0).unwrap().len(), 10);
    assert_eq!(buffer.get_from(1).unwrap().len(), 10);
}

#[test]
fn get_from_evicted_pointer_is_none() {
    let buffer = filled(10, 22);
    // Oldest retained event is number 13.
    assert!(buffer.get_from(0).is_none());
    assert!(buffer.get_from(12).is_none());
    assert_eq!(buffer.get_from(13).unwrap().len(), 10);
    assert_eq!(buffer.get_from(20).unwrap().len(), 3);
}

#[test]
fn get_from_past_the_end_is_empty() {
    let buffer = filled(10, 5);
    assert!(buffer.get_from(6).unwrap().is_empty());
    assert!(buffer.get_from(100).unwrap().is_empty());
    assert!(ChangeEventBuffer::new(5).get_from(1).unwrap().is_empty());
}

// ── reduce_by_last_of_doc ────────────────────────────────────────

#[test]
fn reduce_keeps_last_event_per_document() {
    let db = DatabaseIdentity::new("buffer").unwrap();
    let mut events = Vec::new();
    for i in 0..5 {
        events.push(event(&db, ChangeOp::Insert, &format!("doc{}", i), 0));
    }
    for age in 1..=5 {
        events.push(event(&db, ChangeOp::Update, "doc2", age));
    }

    let reduced = ChangeEventBuffer::reduce_by_last_of_doc(&events);
    assert_eq!(reduced.len(), 5);
    let last = reduced.iter().find(|e| e.doc_id() == Some("doc2")).unwrap();
    assert_eq!(last.value().unwrap()["age"], json!(5));
    assert_eq!(last.op(), ChangeOp::Update);

    let order: Vec<&str> = reduced.iter().filter_map(ChangeEvent::doc_id).collect();
    assert_eq!(order, vec!["doc0", "doc1", "doc3", "doc4", "doc2"]);
}

#[test]
fn reduce_keeps_events_without_document() {
    let db = DatabaseIdentity::new("buffer").unwrap();
    let created = ChangeEvent::from_write(
        ChangeOp::CollectionCreated,
        &db,
        Some("humans"),
        None,
        None,
        false,
    );
    let events = vec![created.clone(), created, event(&db, ChangeOp::Insert, "a", 1)];
    assert_eq!(ChangeEventBuffer::reduce_by_last_of_doc(&events).len(), 3);
}
