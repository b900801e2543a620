use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

use crate::annotations::mark::{AnnotationKind, MarkKind};
use crate::annotations::tree::DocumentTree;

/// All fragments of one annotation identifier, unioned into a single span.
///
/// Derived on every read and never persisted. `from`/`to` are the minimum
/// start and maximum end over all fragments; `text` concatenates the
/// fragments in document order, skipping any unmarked text between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRange {
    pub id: String,
    pub kind: AnnotationKind,
    pub from: usize,
    pub to: usize,
    pub text: String,
    pub author: Option<String>,
    /// Contiguous marked spans, ascending and non-adjacent
    pub fragments: Vec<Range<usize>>,
}

impl AnnotationRange {
    pub fn is_contiguous(&self) -> bool {
        self.fragments.len() <= 1
    }
}

/// Fragments of one id that disagree with the first-seen type or author.
///
/// The first-seen values are kept; this only flags the disagreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedAnnotation {
    pub id: String,
    pub kept: (AnnotationKind, Option<String>),
    pub conflicting: (AnnotationKind, Option<String>),
    pub at: usize,
}

/// Result of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    ranges: Vec<AnnotationRange>,
    index: HashMap<String, usize>,
    malformed: Vec<MalformedAnnotation>,
}

impl Aggregation {
    pub fn get(&self, id: &str) -> Option<&AnnotationRange> {
        self.index.get(id).map(|&i| &self.ranges[i])
    }

    /// Ranges in order of first appearance in the document
    pub fn ranges(&self) -> &[AnnotationRange] {
        &self.ranges
    }

    pub fn into_ranges(self) -> Vec<AnnotationRange> {
        self.ranges
    }

    pub fn malformed(&self) -> &[MalformedAnnotation] {
        &self.malformed
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Group every mark of `kind` in the tree into one range per identifier.
///
/// A single depth-first pass, linear in the document size.
pub fn aggregate<T: DocumentTree + ?Sized>(tree: &T, kind: MarkKind) -> Aggregation {
    let mut aggregation = Aggregation::default();

    tree.traverse(&mut |node, pos| {
        let Some(text) = node.leaf_text() else {
            return;
        };
        let end = pos + node.size();

        for mark in node.marks() {
            let Some(id) = mark.annotation_id(kind) else {
                continue;
            };
            let Some((mark_kind, author)) = mark.annotation_meta() else {
                continue;
            };
            let author = author.map(str::to_string);

            match aggregation.index.get(id) {
                Some(&i) => {
                    let range = &mut aggregation.ranges[i];
                    if range.kind != mark_kind || range.author != author {
                        log::warn!(
                            "Annotation {id} has fragments with conflicting type or author at {pos}"
                        );
                        aggregation.malformed.push(MalformedAnnotation {
                            id: id.to_string(),
                            kept: (range.kind, range.author.clone()),
                            conflicting: (mark_kind, author),
                            at: pos,
                        });
                    }
                    // Two marks with one id on the same leaf count once
                    if range
                        .fragments
                        .last()
                        .is_some_and(|last| last.start <= pos && last.end == end)
                    {
                        continue;
                    }
                    range.from = range.from.min(pos);
                    range.to = range.to.max(end);
                    range.text.push_str(text);
                    match range.fragments.last_mut() {
                        Some(last) if last.end == pos => last.end = end,
                        _ => range.fragments.push(pos..end),
                    }
                }
                None => {
                    aggregation.index.insert(id.to_string(), aggregation.ranges.len());
                    aggregation.ranges.push(AnnotationRange {
                        id: id.to_string(),
                        kind: mark_kind,
                        from: pos,
                        to: end,
                        text: text.to_string(),
                        author,
                        fragments: vec![pos..end],
                    });
                }
            }
        }
    });

    aggregation
}
