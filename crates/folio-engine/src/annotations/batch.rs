use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::ops::Range;

use crate::annotations::aggregate::{AnnotationRange, aggregate};
use crate::annotations::mark::{AnnotationKind, MarkKind, SuggestionKind};
use crate::annotations::tree::{DocumentTree, Step, Transaction, TreeError};

/// A reviewer's decision on a tracked change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Accept,
    Reject,
}

/// What resolving a range does to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Remove the annotation's marks and keep the text
    StripMark,
    /// Remove the annotated text
    Delete,
}

impl Resolution {
    /// Effect of this decision on a range of the given kind.
    ///
    /// | kind   | accept    | reject    |
    /// |--------|-----------|-----------|
    /// | insert | StripMark | Delete    |
    /// | delete | Delete    | StripMark |
    ///
    /// Comments never lose content: both decisions strip the mark.
    pub fn effect_on(self, kind: AnnotationKind) -> Effect {
        match (kind, self) {
            (AnnotationKind::Suggestion(SuggestionKind::Insert), Resolution::Accept)
            | (AnnotationKind::Suggestion(SuggestionKind::Delete), Resolution::Reject)
            | (AnnotationKind::Comment, _) => Effect::StripMark,
            (AnnotationKind::Suggestion(SuggestionKind::Insert), Resolution::Reject)
            | (AnnotationKind::Suggestion(SuggestionKind::Delete), Resolution::Accept) => {
                Effect::Delete
            }
        }
    }
}

/// One range selected for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub range: AnnotationRange,
    pub effect: Effect,
}

impl BatchItem {
    pub fn new(range: AnnotationRange, effect: Effect) -> Self {
        Self { range, effect }
    }

    pub fn resolve(range: AnnotationRange, resolution: Resolution) -> Self {
        let effect = resolution.effect_on(range.kind);
        Self { range, effect }
    }
}

/// A range skipped because its recorded bounds no longer match live content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Annotation {id} is stale: {reason}")]
pub struct StaleRange {
    pub id: String,
    pub reason: StaleReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StaleReason {
    /// No fragment with this id exists any more
    Missing,
    /// The fragments moved or their text changed
    Moved { live: Range<usize> },
    /// The same id appeared twice in one batch
    Duplicate,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Missing => write!(f, "no longer present in the document"),
            StaleReason::Moved { live } => {
                write!(f, "now spans {}..{} with different content", live.start, live.end)
            }
            StaleReason::Duplicate => write!(f, "listed more than once in the batch"),
        }
    }
}

/// Outcome of one batch mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Ids resolved, in the order their edits were planned (descending `from`)
    pub applied: Vec<String>,
    pub skipped: Vec<StaleRange>,
    /// Document version after the transaction, if one was applied
    pub version: Option<u64>,
}

impl BatchReport {
    pub fn skipped_ids(&self) -> impl Iterator<Item = &str> {
        self.skipped.iter().map(|stale| stale.id.as_str())
    }
}

/// Resolve a set of annotation ranges as one position-stable transaction.
///
/// Each item is first checked against a fresh aggregation of the live
/// document; items whose fragments or text changed since they were read are
/// skipped and reported, the rest are planned in descending `from` order and
/// applied together. All steps are expressed in the pre-transaction position
/// space, so an earlier deletion can never shift a later edit's coordinates.
pub fn apply_batch<T: DocumentTree + ?Sized>(
    doc: &mut T,
    items: &[BatchItem],
) -> Result<BatchReport, TreeError> {
    let mut report = BatchReport::default();

    let kinds: HashSet<MarkKind> = items.iter().map(|item| item.range.kind.mark_kind()).collect();
    let live: Vec<_> = kinds
        .into_iter()
        .map(|kind| (kind, aggregate(&*doc, kind)))
        .collect();
    let version = doc.version();

    let mut seen = HashSet::new();
    let mut accepted: Vec<&BatchItem> = Vec::new();
    for item in items {
        let range = &item.range;
        let kind = range.kind.mark_kind();

        if !seen.insert((kind, range.id.as_str())) {
            report.skipped.push(StaleRange {
                id: range.id.clone(),
                reason: StaleReason::Duplicate,
            });
            continue;
        }

        let current = live
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, aggregation)| aggregation.get(&range.id));
        match current {
            None => report.skipped.push(StaleRange {
                id: range.id.clone(),
                reason: StaleReason::Missing,
            }),
            Some(current) if current.fragments != range.fragments || current.text != range.text => {
                report.skipped.push(StaleRange {
                    id: range.id.clone(),
                    reason: StaleReason::Moved {
                        live: current.from..current.to,
                    },
                })
            }
            Some(_) => accepted.push(item),
        }
    }

    for stale in &report.skipped {
        log::warn!("Skipping annotation during batch resolution: {stale}");
    }

    if accepted.is_empty() {
        return Ok(report);
    }

    accepted.sort_by_key(|item| Reverse(item.range.from));

    let mut transaction = Transaction::new().expecting(version);
    let mut deletions: Vec<Range<usize>> = Vec::new();
    for item in &accepted {
        let range = &item.range;
        match item.effect {
            Effect::StripMark => {
                for fragment in range.fragments.iter().rev() {
                    transaction.push(Step::RemoveMark {
                        from: fragment.start,
                        to: fragment.end,
                        kind: range.kind.mark_kind(),
                        id: range.id.clone(),
                    });
                }
            }
            Effect::Delete => deletions.extend(range.fragments.iter().cloned()),
        }
        report.applied.push(range.id.clone());
    }

    for span in merge_spans(deletions).into_iter().rev() {
        transaction.push(Step::Delete {
            from: span.start,
            to: span.end,
        });
    }

    report.version = Some(doc.apply_edit(transaction)?);
    Ok(report)
}

/// Resolve a single range; the singleton case of [`apply_batch`]
pub fn apply_one<T: DocumentTree + ?Sized>(
    doc: &mut T,
    range: AnnotationRange,
    effect: Effect,
) -> Result<BatchReport, TreeError> {
    apply_batch(doc, &[BatchItem::new(range, effect)])
}

/// Coalesce overlapping or touching spans, ascending
fn merge_spans(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.sort_by_key(|span| span.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}
