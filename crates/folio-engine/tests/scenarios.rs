//! End-to-end flows across annotations, history and the canvas log.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use folio_engine::annotations::{
    BatchItem, CommentOverlay, DocumentTree, Mark, MarkKind, MarkedDocument, Node, Resolution,
    aggregate, apply_batch, reject_all, suggest_delete, suggest_insert,
};
use folio_engine::canvas::{CanvasObject, Command, CommandLog, Point, Scene};
use folio_engine::history::{
    DiffLine, FsRevisionStore, HistoryError, RevisionHistory, RevisionStorage, StorageError, diff,
};
use pretty_assertions::assert_eq;
use relative_path::RelativePath;
use rstest::rstest;

fn hello_cruel_world() -> MarkedDocument {
    MarkedDocument::new(vec![Node::paragraph(vec![
        Node::text("Hello "),
        Node::marked("cruel ", [Mark::insert_suggestion("s1", "Alice")]),
        Node::text("world"),
    ])])
}

#[rstest]
#[case(Resolution::Accept, "Hello cruel world")]
#[case(Resolution::Reject, "Hello world")]
fn test_resolve_insert_suggestion(#[case] resolution: Resolution, #[case] expected: &str) {
    let mut doc = hello_cruel_world();
    let range = aggregate(&doc, MarkKind::Suggestion)
        .get("s1")
        .cloned()
        .unwrap();
    assert_eq!(range.author.as_deref(), Some("Alice"));
    assert_eq!((range.from, range.to), (6, 12));

    let report = apply_batch(&mut doc, &[BatchItem::resolve(range, resolution)]).unwrap();

    assert_eq!(report.applied, vec!["s1".to_string()]);
    assert_eq!(doc.text(), expected);
    assert!(aggregate(&doc, MarkKind::Suggestion).is_empty());
}

#[test]
fn test_line_diff() {
    assert_eq!(
        diff("a\nb\nc", "a\nx\nc"),
        vec![
            DiffLine::context("a"),
            DiffLine::removed("b"),
            DiffLine::added("x"),
            DiffLine::context("c"),
        ]
    );
}

#[test]
fn test_history_grouping_today_yesterday() {
    let notes_dir = tempfile::tempdir().unwrap();
    std::fs::write(notes_dir.path().join("note.md"), "v1").unwrap();
    let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
    let zone = FixedOffset::east_opt(3600).unwrap();
    let local = |day: u32, hour: u32| -> DateTime<Utc> {
        zone.with_ymd_and_hms(2026, 10, day, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    };
    let note = RelativePath::new("note.md");

    store.commit_at("yesterday", "Alice", &[note], local(18, 23)).unwrap();
    std::fs::write(notes_dir.path().join("note.md"), "v2").unwrap();
    store.commit_at("today", "Alice", &[note], local(19, 9)).unwrap();

    let history = RevisionHistory::new(store);
    let now = zone.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap();
    let groups = history.grouped(Some(note), &now).unwrap();

    assert_eq!(
        groups
            .iter()
            .map(|g| (g.label.as_str(), g.commits.len()))
            .collect::<Vec<_>>(),
        vec![("Today", 1), ("Yesterday", 1)]
    );
    assert_eq!(groups[0].commits[0].message, "today");
}

#[test]
fn test_add_circle_undo_redo() {
    let mut log = CommandLog::new();
    let empty = Scene::new();
    let circle = CanvasObject::circle(Point::new(20.0, 20.0), 8.0);

    let pushed = log.execute(Command::add(vec![circle.clone()]), &empty).unwrap();
    assert!(log.can_undo());
    assert_eq!(pushed.objects(), &[circle]);

    let undone = log.undo(&pushed).unwrap().unwrap();
    assert!(undone.is_empty());
    assert!(log.can_redo());

    let redone = log.redo(&undone).unwrap().unwrap();
    assert_eq!(redone, pushed);
}

#[test]
fn test_tracked_changes_then_reject_all() {
    let mut doc = MarkedDocument::from_text("The quick fox");
    suggest_insert(&mut doc, 10, "brown ", "Alice").unwrap();
    suggest_delete(&mut doc, 4, 10, "Bob").unwrap();
    assert_eq!(doc.text(), "The quick brown fox");

    let suggestions = aggregate(&doc, MarkKind::Suggestion);
    assert_eq!(suggestions.len(), 2);

    let report = reject_all(&mut doc).unwrap();

    assert_eq!(report.applied.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(doc.text(), "The quick fox");
}

#[test]
fn test_stale_range_is_skipped_rest_applies() {
    let mut doc = MarkedDocument::new(vec![Node::paragraph(vec![
        Node::marked("one ", [Mark::insert_suggestion("a", "Alice")]),
        Node::text("two "),
        Node::marked("three", [Mark::insert_suggestion("b", "Alice")]),
    ])]);
    let ranges = aggregate(&doc, MarkKind::Suggestion).into_ranges();

    // Someone types into the second suggestion after the ranges were read
    suggest_insert(&mut doc, 10, ">", "Carol").unwrap();

    let items: Vec<_> = ranges
        .into_iter()
        .map(|range| BatchItem::resolve(range, Resolution::Reject))
        .collect();
    let report = apply_batch(&mut doc, &items).unwrap();

    assert_eq!(report.skipped_ids().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(report.applied, vec!["a".to_string()]);
    assert_eq!(doc.text(), "two th>ree");
}

#[test]
fn test_comment_lifecycle() {
    let mut doc = MarkedDocument::from_text("Review this sentence please");
    let mut overlay = CommentOverlay::new();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();

    let first = overlay
        .add_comment(&mut doc, 7, 11, "Alice", "Why this?", now)
        .unwrap();
    let second = overlay
        .add_comment(&mut doc, 0, 6, "Bob", "Typo", now)
        .unwrap();
    overlay.reply(&first, "Bob", "Because", now).unwrap();
    overlay.resolve(&second).unwrap();

    let view = overlay.view(&doc);
    assert_eq!(view.open.len(), 1);
    assert_eq!(view.open[0].range.text, "this");
    assert_eq!(view.open[0].thread.replies.len(), 2);
    assert_eq!(view.resolved.len(), 1);
    assert_eq!(view.resolved[0].range.text, "Review");

    overlay.delete(&mut doc, &first).unwrap();
    assert_eq!(doc.text(), "Review this sentence please");
    assert!(overlay.thread(&first).is_none());
    assert_eq!(aggregate(&doc, MarkKind::Comment).len(), 1);
}

#[test]
fn test_restore_round_trip_through_history() {
    let notes_dir = tempfile::tempdir().unwrap();
    let live = notes_dir.path().join("note.md");
    std::fs::write(&live, "line one\nline two").unwrap();
    let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
    let note = RelativePath::new("note.md");
    let saved = store.commit("first draft", "Alice", &[note]).unwrap();

    std::fs::write(&live, "line one\nline 2").unwrap();
    let mut history = RevisionHistory::new(store);

    let token = history.begin_preview();
    let current = std::fs::read_to_string(&live).unwrap();
    let preview = history.compare(&saved.hash, note, &current).unwrap();
    let preview = history.finish_preview(token, preview).unwrap();
    assert_eq!(preview.stats().removed, 1);
    assert_eq!(preview.stats().added, 1);

    history.restore(&saved.hash, Some(note)).unwrap();
    assert_eq!(std::fs::read_to_string(&live).unwrap(), "line one\nline two");
    assert_eq!(history.storage().list(Some(note)).unwrap().len(), 1);
}

#[test]
fn test_fetch_of_missing_revision_reports_context() {
    let notes_dir = tempfile::tempdir().unwrap();
    let history = RevisionHistory::new(FsRevisionStore::new(notes_dir.path(), ".folio-history"));

    let err = history
        .content_at("0000", RelativePath::new("note.md"))
        .unwrap_err();

    assert!(matches!(
        err,
        HistoryError::FetchFailed {
            ref hash,
            source: StorageError::NotFound { .. },
            ..
        } if hash == "0000"
    ));
}

#[test]
fn test_document_tree_is_object_safe() {
    let mut doc = hello_cruel_world();
    let tree: &mut dyn DocumentTree = &mut doc;
    let ranges = aggregate(&*tree, MarkKind::Suggestion);
    assert_eq!(ranges.len(), 1);
    reject_all(tree).unwrap();
    assert_eq!(doc.text(), "Hello world");
}
