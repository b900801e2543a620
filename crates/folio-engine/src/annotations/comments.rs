use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::annotations::aggregate::{AnnotationRange, aggregate};
use crate::annotations::batch::{BatchReport, Effect, StaleRange, apply_one};
use crate::annotations::mark::{Mark, MarkKind};
use crate::annotations::tree::{DocumentTree, Step, Transaction, TreeError};

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("Comment thread not found: {0}")]
    ThreadNotFound(String),
    #[error("Cannot comment on an empty selection at {0}")]
    EmptySelection(usize),
    #[error(transparent)]
    Stale(#[from] StaleRange),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Discussion attached to one comment mark id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
    pub id: String,
    pub resolved: bool,
    /// Oldest first; the opening message is the first reply
    pub replies: Vec<Reply>,
}

/// A thread joined with its live range in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEntry<'a> {
    pub range: AnnotationRange,
    pub thread: &'a CommentThread,
}

/// Comments partitioned for display
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommentView<'a> {
    /// Unresolved threads in document order
    pub open: Vec<CommentEntry<'a>>,
    /// Resolved threads, shown in a collapsed section
    pub resolved: Vec<CommentEntry<'a>>,
    /// Threads whose marks no longer appear in the document
    pub orphaned: Vec<&'a CommentThread>,
}

/// Thread state layered over the comment marks of a document.
///
/// Resolving a thread only flips its state; the marked text is never touched.
/// Deleting a thread strips its marks through the batch mutator and drops the
/// thread for good.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentOverlay {
    threads: BTreeMap<String, CommentThread>,
}

impl CommentOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread(&self, id: &str) -> Option<&CommentThread> {
        self.threads.get(id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &CommentThread> {
        self.threads.values()
    }

    /// Mark `from..to` with a new comment and open its thread
    pub fn add_comment<T: DocumentTree + ?Sized>(
        &mut self,
        doc: &mut T,
        from: usize,
        to: usize,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<String, CommentError> {
        if from >= to {
            return Err(CommentError::EmptySelection(from));
        }
        let id = Uuid::new_v4().to_string();
        let version = doc.version();
        doc.apply_edit(Transaction::new().expecting(version).step(Step::AddMark {
            from,
            to,
            mark: Mark::comment(&id),
        }))?;
        self.threads.insert(
            id.clone(),
            CommentThread {
                id: id.clone(),
                resolved: false,
                replies: vec![Reply {
                    author: author.to_string(),
                    text: text.to_string(),
                    created_at: now,
                }],
            },
        );
        Ok(id)
    }

    pub fn reply(
        &mut self,
        id: &str,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CommentError> {
        let thread = self.thread_mut(id)?;
        thread.replies.push(Reply {
            author: author.to_string(),
            text: text.to_string(),
            created_at: now,
        });
        Ok(())
    }

    pub fn resolve(&mut self, id: &str) -> Result<(), CommentError> {
        self.thread_mut(id)?.resolved = true;
        Ok(())
    }

    pub fn reopen(&mut self, id: &str) -> Result<(), CommentError> {
        self.thread_mut(id)?.resolved = false;
        Ok(())
    }

    /// Strip the comment's marks and drop its thread. Not undoable.
    ///
    /// A thread whose marks are already gone is simply dropped.
    pub fn delete<T: DocumentTree + ?Sized>(
        &mut self,
        doc: &mut T,
        id: &str,
    ) -> Result<BatchReport, CommentError> {
        if !self.threads.contains_key(id) {
            return Err(CommentError::ThreadNotFound(id.to_string()));
        }

        let report = match aggregate(&*doc, MarkKind::Comment).get(id).cloned() {
            Some(range) => {
                let mut report = apply_one(doc, range, Effect::StripMark)?;
                if let Some(stale) = report.skipped.pop() {
                    return Err(stale.into());
                }
                report
            }
            None => BatchReport::default(),
        };

        self.threads.remove(id);
        log::debug!("Deleted comment thread {id}");
        Ok(report)
    }

    /// Join every thread with its live range
    pub fn view<T: DocumentTree + ?Sized>(&self, doc: &T) -> CommentView<'_> {
        let aggregation = aggregate(doc, MarkKind::Comment);
        let mut view = CommentView::default();

        let mut ranges: Vec<&AnnotationRange> = aggregation.ranges().iter().collect();
        ranges.sort_by_key(|range| range.from);
        for range in ranges {
            let Some(thread) = self.threads.get(&range.id) else {
                continue;
            };
            let entry = CommentEntry {
                range: range.clone(),
                thread,
            };
            if thread.resolved {
                view.resolved.push(entry);
            } else {
                view.open.push(entry);
            }
        }

        view.orphaned = self
            .threads
            .values()
            .filter(|thread| aggregation.get(&thread.id).is_none())
            .collect();
        view
    }

    fn thread_mut(&mut self, id: &str) -> Result<&mut CommentThread, CommentError> {
        self.threads
            .get_mut(id)
            .ok_or_else(|| CommentError::ThreadNotFound(id.to_string()))
    }
}
