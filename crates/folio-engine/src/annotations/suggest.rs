use uuid::Uuid;

use crate::annotations::aggregate::aggregate;
use crate::annotations::batch::{BatchItem, BatchReport, Resolution, apply_batch};
use crate::annotations::mark::{Mark, MarkKind};
use crate::annotations::tree::{DocumentTree, Step, Transaction, TreeError};

/// Insert `text` at `at` as a tracked insertion, returning the suggestion id
pub fn suggest_insert<T: DocumentTree + ?Sized>(
    doc: &mut T,
    at: usize,
    text: &str,
    author: &str,
) -> Result<String, TreeError> {
    if text.is_empty() {
        return Err(TreeError::EmptySuggestion { at });
    }
    let id = Uuid::new_v4().to_string();
    let version = doc.version();
    let transaction = Transaction::new().expecting(version).step(Step::InsertText {
        at,
        text: text.to_string(),
        marks: vec![Mark::insert_suggestion(&id, author)],
    });
    doc.apply_edit(transaction)?;
    Ok(id)
}

/// Mark `from..to` as a tracked deletion, returning the suggestion id.
///
/// The text stays in the document until the suggestion is accepted.
pub fn suggest_delete<T: DocumentTree + ?Sized>(
    doc: &mut T,
    from: usize,
    to: usize,
    author: &str,
) -> Result<String, TreeError> {
    if from == to {
        return Err(TreeError::EmptySuggestion { at: from });
    }
    let id = Uuid::new_v4().to_string();
    let version = doc.version();
    let transaction = Transaction::new().expecting(version).step(Step::AddMark {
        from,
        to,
        mark: Mark::delete_suggestion(&id, author),
    });
    doc.apply_edit(transaction)?;
    Ok(id)
}

/// Apply one decision to every suggestion in the document as a single batch
pub fn resolve_all<T: DocumentTree + ?Sized>(
    doc: &mut T,
    resolution: Resolution,
) -> Result<BatchReport, TreeError> {
    let items: Vec<BatchItem> = aggregate(&*doc, MarkKind::Suggestion)
        .into_ranges()
        .into_iter()
        .map(|range| BatchItem::resolve(range, resolution))
        .collect();
    apply_batch(doc, &items)
}

pub fn accept_all<T: DocumentTree + ?Sized>(doc: &mut T) -> Result<BatchReport, TreeError> {
    resolve_all(doc, Resolution::Accept)
}

pub fn reject_all<T: DocumentTree + ?Sized>(doc: &mut T) -> Result<BatchReport, TreeError> {
    resolve_all(doc, Resolution::Reject)
}
