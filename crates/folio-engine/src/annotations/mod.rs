/*!
 * # Annotation Engine
 *
 * Tracked-change suggestions and comments are stored as **marks** on the text
 * leaves of the host editor's document tree. Editing splits and merges those
 * leaves freely, so one logical annotation is usually scattered over several
 * fragments. This module turns the fragments back into coherent ranges and
 * resolves batches of them without corrupting positions.
 *
 * ## Pipeline
 *
 * ```text
 * DocumentTree ──aggregate()──▶ AnnotationRange per id
 *                                      │
 *                  Resolution / Effect ▼
 *                              apply_batch() ──▶ one Transaction ──▶ DocumentTree
 * ```
 *
 * ### 1. Aggregation
 * - One depth-first pass over the tree, linear in document size
 * - `from`/`to` are the min start and max end of all fragments of an id
 * - Fragments that disagree on type or author keep the first-seen values and
 *   are reported as `MalformedAnnotation`
 *
 * ### 2. Batch mutation
 * - Every range is re-checked against the live document before planning; a
 *   mismatch is reported as `StaleRange` and the rest of the batch proceeds
 * - All steps of the batch share the pre-edit position space and are applied
 *   as a single transaction, highest position first
 *
 * ### 3. Comments
 * - `CommentOverlay` keeps thread state (resolved flag, replies) beside the
 *   marks; resolving never changes content, deleting strips marks as a
 *   singleton batch
 *
 * ## Module Structure
 *
 * - **`mark`**: tagged `Mark` variants and annotation kinds
 * - **`tree`**: `DocumentTree` contract, `Transaction`/`Step`, and the
 *   in-memory `MarkedDocument`
 * - **`aggregate`**: fragment grouping into `AnnotationRange`s
 * - **`batch`**: decision table and the position-stable batch mutator
 * - **`suggest`**: recording tracked changes, accept/reject all
 * - **`comments`**: comment threads over comment marks
 */

pub mod aggregate;
pub mod batch;
pub mod comments;
pub mod mark;
pub mod suggest;
pub mod tree;

pub use aggregate::{Aggregation, AnnotationRange, MalformedAnnotation, aggregate};
pub use batch::{
    BatchItem, BatchReport, Effect, Resolution, StaleRange, StaleReason, apply_batch, apply_one,
};
pub use comments::{CommentEntry, CommentError, CommentOverlay, CommentThread, CommentView, Reply};
pub use mark::{AnnotationKind, Mark, MarkKind, SuggestionKind};
pub use suggest::{accept_all, reject_all, resolve_all, suggest_delete, suggest_insert};
pub use tree::{DocumentTree, ElementKind, MarkedDocument, Node, Step, Transaction, TreeError};
