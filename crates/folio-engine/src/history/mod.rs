/*!
 * # Revision History
 *
 * Immutable snapshots of a notes folder, listed newest first, compared
 * against the live document and restored on request.
 *
 * ## Flow
 *
 * ```text
 * RevisionStorage ──list()──▶ Commit[] ──group_by_day()──▶ DayGroup[]
 *        │
 *        └──content_at()──▶ snapshot ──diff_with_limit(live)──▶ LineDiff
 * ```
 *
 * - Storage errors are typed (`StorageError`) and reach the caller wrapped in
 *   `HistoryError` together with the commit hash and path, so the call can be
 *   retried as-is
 * - `restore` overwrites live content and is never retried automatically;
 *   asking the user first is the caller's job
 * - Previews cross an I/O boundary, so each request takes a `PreviewToken` and
 *   responses for superseded tokens are dropped
 *
 * ## Module Structure
 *
 * - **`diff`**: LCS line diff with a table size guard
 * - **`grouping`**: "Today" / "Yesterday" / full date buckets
 * - **`store`**: `FsRevisionStore`, content-addressed storage on disk
 * - **`preview`**: request sequencing for previews
 * - **`autosave`**: single-retry autosave state machine
 */

pub mod autosave;
pub mod diff;
pub mod grouping;
pub mod preview;
pub mod store;

use std::io;

use chrono::{DateTime, TimeZone, Utc};
use relative_path::{RelativePath, RelativePathBuf};
use serde::{Deserialize, Serialize};

pub use autosave::{Autosave, AutosaveAction, AutosaveState};
pub use diff::{
    DEFAULT_MAX_CELLS, DiffKind, DiffLine, DiffStats, LineDiff, diff, diff_with_limit, new_text,
    old_text, render_unified,
};
pub use grouping::{DayGroup, group_by_day};
pub use preview::{PreviewSequencer, PreviewToken};
pub use store::FsRevisionStore;

/// One immutable snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl Commit {
    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Revision {hash} has no content for {path}")]
    NotFound { hash: String, path: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("IO error: {0}")]
    Io(io::Error),
    #[error("Corrupt revision store: {0}")]
    Corrupt(String),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => StorageError::Unauthorized(err.to_string()),
            _ => StorageError::Io(err),
        }
    }
}

fn describe(path: Option<&RelativePathBuf>) -> String {
    path.map_or_else(|| "all files".to_string(), |p| p.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Failed to list history for {}: {source}", describe(.path.as_ref()))]
    ListFailed {
        path: Option<RelativePathBuf>,
        #[source]
        source: StorageError,
    },
    #[error("Failed to fetch {} at {hash}: {source}", describe(.path.as_ref()))]
    FetchFailed {
        hash: String,
        path: Option<RelativePathBuf>,
        #[source]
        source: StorageError,
    },
    #[error("Failed to restore {} to {hash}: {source}", describe(.path.as_ref()))]
    RestoreFailed {
        hash: String,
        path: Option<RelativePathBuf>,
        #[source]
        source: StorageError,
    },
}

impl HistoryError {
    pub fn storage_error(&self) -> &StorageError {
        match self {
            HistoryError::ListFailed { source, .. }
            | HistoryError::FetchFailed { source, .. }
            | HistoryError::RestoreFailed { source, .. } => source,
        }
    }
}

/// Backend holding the snapshots
pub trait RevisionStorage {
    /// Commits newest first, optionally only those touching `path`
    fn list(&self, path: Option<&RelativePath>) -> Result<Vec<Commit>, StorageError>;

    fn content_at(&self, hash: &str, path: &RelativePath) -> Result<String, StorageError>;

    /// Overwrite live content with the snapshot at `hash`. Destructive.
    fn restore(&self, hash: &str, path: Option<&RelativePath>) -> Result<(), StorageError>;
}

/// History browsing on top of a `RevisionStorage`
#[derive(Debug)]
pub struct RevisionHistory<S> {
    storage: S,
    previews: PreviewSequencer,
    max_cells: usize,
}

impl<S: RevisionStorage> RevisionHistory<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            previews: PreviewSequencer::new(),
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn list(&self, path: Option<&RelativePath>) -> Result<Vec<Commit>, HistoryError> {
        self.storage
            .list(path)
            .map_err(|source| HistoryError::ListFailed {
                path: path.map(RelativePath::to_relative_path_buf),
                source,
            })
    }

    pub fn grouped<Tz: TimeZone>(
        &self,
        path: Option<&RelativePath>,
        now: &DateTime<Tz>,
    ) -> Result<Vec<DayGroup>, HistoryError> {
        Ok(group_by_day(&self.list(path)?, now))
    }

    pub fn content_at(&self, hash: &str, path: &RelativePath) -> Result<String, HistoryError> {
        self.storage
            .content_at(hash, path)
            .map_err(|source| HistoryError::FetchFailed {
                hash: hash.to_string(),
                path: Some(path.to_relative_path_buf()),
                source,
            })
    }

    /// Diff from the snapshot at `hash` to the live text
    pub fn compare(
        &self,
        hash: &str,
        path: &RelativePath,
        live: &str,
    ) -> Result<LineDiff, HistoryError> {
        let old = self.content_at(hash, path)?;
        Ok(diff_with_limit(&old, live, self.max_cells))
    }

    /// Start a preview request; later requests supersede this one
    pub fn begin_preview(&mut self) -> PreviewToken {
        self.previews.issue()
    }

    /// Keep a preview response only if no newer request was started since
    pub fn finish_preview<T>(&self, token: PreviewToken, response: T) -> Option<T> {
        self.previews.accept(token, response)
    }

    pub fn restore(&self, hash: &str, path: Option<&RelativePath>) -> Result<(), HistoryError> {
        self.storage
            .restore(hash, path)
            .map_err(|source| HistoryError::RestoreFailed {
                hash: hash.to_string(),
                path: path.map(RelativePath::to_relative_path_buf),
                source,
            })?;
        let target = path.map(RelativePath::to_relative_path_buf);
        log::info!("Restored {} to {hash}", describe(target.as_ref()));
        Ok(())
    }
}
