pub mod annotations;
pub mod canvas;
pub mod history;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use annotations::{
    AnnotationKind, AnnotationRange, BatchItem, BatchReport, CommentOverlay, DocumentTree, Mark,
    MarkedDocument, Resolution, StaleRange, aggregate, apply_batch,
};
pub use canvas::{CanvasObject, Command, CommandError, CommandLog, Scene};
pub use history::{
    Commit, DiffKind, DiffLine, FsRevisionStore, HistoryError, LineDiff, RevisionHistory,
    RevisionStorage, StorageError, diff,
};
