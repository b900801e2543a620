use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relative_path::{RelativePath, RelativePathBuf};
use serde::{Deserialize, Serialize};

use crate::history::{Commit, RevisionStorage, StorageError};

const INDEX_FILE: &str = "commits.json";
const OBJECTS_DIR: &str = "objects";
const STAGING_SUFFIX: &str = "folio-restore";
const BACKUP_SUFFIX: &str = "folio-backup";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitRecord {
    #[serde(flatten)]
    commit: Commit,
    parent: Option<String>,
    /// Every tracked file at this commit, mapped to its blob hash
    files: BTreeMap<RelativePathBuf, String>,
}

/// Revision storage kept on disk next to the notes.
///
/// ```text
/// <store_dir>/commits.json        commit index, newest first
/// <store_dir>/objects/<blake3>    file contents, content-addressed
/// ```
///
/// Live files are read from and restored into `notes_root`.
#[derive(Debug, Clone)]
pub struct FsRevisionStore {
    notes_root: PathBuf,
    store_dir: PathBuf,
}

impl FsRevisionStore {
    /// A relative `store_dir` is resolved against `notes_root`
    pub fn new(notes_root: impl Into<PathBuf>, store_dir: impl AsRef<Path>) -> Self {
        let notes_root = notes_root.into();
        let store_dir = notes_root.join(store_dir);
        Self {
            notes_root,
            store_dir,
        }
    }

    pub fn notes_root(&self) -> &Path {
        &self.notes_root
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Read the live content of a tracked file
    pub fn read_live(&self, path: &RelativePath) -> Result<String, StorageError> {
        Ok(fs::read_to_string(path.to_path(&self.notes_root))?)
    }

    /// Snapshot `files` as they are on disk now
    pub fn commit(
        &self,
        message: &str,
        author: &str,
        files: &[&RelativePath],
    ) -> Result<Commit, StorageError> {
        self.commit_at(message, author, files, Utc::now())
    }

    /// Snapshot `files` with an explicit commit date.
    ///
    /// Files not named here keep the content they had in the previous commit.
    pub fn commit_at(
        &self,
        message: &str,
        author: &str,
        files: &[&RelativePath],
        date: DateTime<Utc>,
    ) -> Result<Commit, StorageError> {
        let mut records = self.load_index()?;
        let parent = records.first();
        let mut tracked = parent.map(|p| p.files.clone()).unwrap_or_default();

        for path in files {
            let content = self.read_live(path)?;
            let blob = self.write_blob(&content)?;
            tracked.insert(path.to_relative_path_buf(), blob);
        }

        let parent_hash = parent.map(|p| p.commit.hash.clone());
        let stamp = date.to_rfc3339();
        let mut hasher = blake3::Hasher::new();
        hasher.update(parent_hash.as_deref().unwrap_or_default().as_bytes());
        for field in [message, author, stamp.as_str()] {
            hasher.update(b"\0");
            hasher.update(field.as_bytes());
        }
        for (path, blob) in &tracked {
            hasher.update(b"\0");
            hasher.update(path.as_str().as_bytes());
            hasher.update(b"=");
            hasher.update(blob.as_bytes());
        }

        let commit = Commit {
            hash: hasher.finalize().to_hex().to_string(),
            message: message.to_string(),
            author: author.to_string(),
            date,
        };
        records.insert(
            0,
            CommitRecord {
                commit: commit.clone(),
                parent: parent_hash,
                files: tracked,
            },
        );
        self.save_index(&records)?;

        log::info!(
            "Recorded commit {} ({} files): {message}",
            commit.short_hash(),
            files.len()
        );
        Ok(commit)
    }

    fn index_path(&self) -> PathBuf {
        self.store_dir.join(INDEX_FILE)
    }

    fn object_path(&self, blob: &str) -> PathBuf {
        self.store_dir.join(OBJECTS_DIR).join(blob)
    }

    fn load_index(&self) -> Result<Vec<CommitRecord>, StorageError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path)?;
        serde_json::from_str(&json)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))
    }

    fn save_index(&self, records: &[CommitRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        fs::create_dir_all(&self.store_dir)?;
        write_atomic(&self.index_path(), &json)
    }

    fn write_blob(&self, content: &str) -> Result<String, StorageError> {
        let blob = blake3::hash(content.as_bytes()).to_hex().to_string();
        let path = self.object_path(&blob);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_atomic(&path, content)?;
        }
        Ok(blob)
    }

    fn read_blob(
        &self,
        hash: &str,
        path: &RelativePath,
        blob: &str,
    ) -> Result<String, StorageError> {
        let object = self.object_path(blob);
        if !object.exists() {
            return Err(not_found(hash, path));
        }
        let content = fs::read_to_string(&object)?;
        if blake3::hash(content.as_bytes()).to_hex().as_str() != blob {
            return Err(StorageError::Corrupt(format!(
                "object {blob} does not match its hash"
            )));
        }
        Ok(content)
    }
}

fn find<'a>(records: &'a [CommitRecord], hash: &str) -> Option<&'a CommitRecord> {
    records.iter().find(|record| record.commit.hash == hash)
}

fn not_found(hash: &str, path: &RelativePath) -> StorageError {
    StorageError::NotFound {
        hash: hash.to_string(),
        path: path.to_string(),
    }
}

fn sibling_path(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{suffix}"))
}

fn staging_path(target: &Path) -> PathBuf {
    sibling_path(target, STAGING_SUFFIX)
}

/// Move every staged file over its target, all or nothing.
///
/// Targets are set aside as backups first; if any rename fails the targets
/// already replaced get their backups back and leftover staged files are
/// removed.
fn swap_in(staged: &[(PathBuf, PathBuf)]) -> io::Result<()> {
    let mut done: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(staged.len());
    for (index, (temp, target)) in staged.iter().enumerate() {
        match replace(temp, target) {
            Ok(backup) => done.push((target.as_path(), backup)),
            Err(err) => {
                roll_back(&done);
                for (temp, _) in &staged[index..] {
                    let _ = fs::remove_file(temp);
                }
                return Err(err);
            }
        }
    }

    for (_, backup) in done {
        if let Some(backup) = backup {
            let _ = fs::remove_file(backup);
        }
    }
    Ok(())
}

/// Rename `temp` over `target`, returning where the previous target was kept
fn replace(temp: &Path, target: &Path) -> io::Result<Option<PathBuf>> {
    // Directories are never moved aside, so renaming over one fails here
    let backup = match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => {
            let backup = sibling_path(target, BACKUP_SUFFIX);
            fs::rename(target, &backup)?;
            Some(backup)
        }
        _ => None,
    };

    if let Err(err) = fs::rename(temp, target) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, target);
        }
        return Err(err);
    }
    Ok(backup)
}

fn roll_back(done: &[(&Path, Option<PathBuf>)]) {
    for (target, backup) in done.iter().rev() {
        let result = match backup {
            Some(backup) => fs::rename(backup, target),
            None => fs::remove_file(target),
        };
        if let Err(err) = result {
            log::error!("Failed to roll back {}: {err}", target.display());
        }
    }
}

/// Write through a sibling temp file and rename over the target
fn write_atomic(target: &Path, content: &str) -> Result<(), StorageError> {
    let staged = staging_path(target);
    fs::write(&staged, content)?;
    fs::rename(&staged, target).inspect_err(|_| {
        let _ = fs::remove_file(&staged);
    })?;
    Ok(())
}

impl RevisionStorage for FsRevisionStore {
    fn list(&self, path: Option<&RelativePath>) -> Result<Vec<Commit>, StorageError> {
        let records = self.load_index()?;
        let Some(path) = path else {
            return Ok(records.into_iter().map(|r| r.commit).collect());
        };

        let commits = records
            .iter()
            .enumerate()
            .filter(|(i, record)| {
                let before = records.get(i + 1).and_then(|p| p.files.get(path));
                let at = record.files.get(path);
                at.is_some() && at != before
            })
            .map(|(_, record)| record.commit.clone())
            .collect();
        Ok(commits)
    }

    fn content_at(&self, hash: &str, path: &RelativePath) -> Result<String, StorageError> {
        let records = self.load_index()?;
        let blob = find(&records, hash)
            .and_then(|record| record.files.get(path))
            .ok_or_else(|| not_found(hash, path))?;
        self.read_blob(hash, path, blob)
    }

    fn restore(&self, hash: &str, path: Option<&RelativePath>) -> Result<(), StorageError> {
        let records = self.load_index()?;
        let record = find(&records, hash).ok_or_else(|| StorageError::NotFound {
            hash: hash.to_string(),
            path: path.map_or_else(String::new, |p| p.to_string()),
        })?;

        let targets: Vec<(&RelativePath, &String)> = match path {
            Some(path) => {
                let blob = record.files.get(path).ok_or_else(|| not_found(hash, path))?;
                vec![(path, blob)]
            }
            None => record
                .files
                .iter()
                .map(|(path, blob)| (path.as_relative_path(), blob))
                .collect(),
        };

        // Everything is read before any live file is touched
        let mut contents = Vec::with_capacity(targets.len());
        for (path, blob) in targets {
            contents.push((path, self.read_blob(hash, path, blob)?));
        }

        let mut staged = Vec::with_capacity(contents.len());
        for (path, content) in &contents {
            let target = path.to_path(&self.notes_root);
            let temp = staging_path(&target);
            let result = target
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&temp, content));
            if let Err(err) = result {
                for (temp, _) in &staged {
                    let _ = fs::remove_file(temp);
                }
                return Err(err.into());
            }
            staged.push((temp, target));
        }

        swap_in(&staged)?;

        log::info!(
            "Restored {} file(s) from commit {}",
            staged.len(),
            record.commit.short_hash()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{create_test_file, create_test_notes_dir};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap()
    }

    fn note() -> &'static RelativePath {
        RelativePath::new("note.md")
    }

    #[test]
    fn test_commit_and_read_back() {
        let notes_dir = create_test_notes_dir();
        create_test_file(&notes_dir, "note.md", "first");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");

        let first = store.commit_at("one", "Alice", &[note()], at(9)).unwrap();
        create_test_file(&notes_dir, "note.md", "second");
        let second = store.commit_at("two", "Alice", &[note()], at(10)).unwrap();

        assert_ne!(first.hash, second.hash);
        assert_eq!(store.content_at(&first.hash, note()).unwrap(), "first");
        assert_eq!(store.content_at(&second.hash, note()).unwrap(), "second");
        assert!(store.store_dir().join("commits.json").exists());
    }

    #[test]
    fn test_list_is_newest_first() {
        let notes_dir = create_test_notes_dir();
        create_test_file(&notes_dir, "note.md", "a");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");

        store.commit_at("one", "Alice", &[note()], at(9)).unwrap();
        store.commit_at("two", "Bob", &[note()], at(10)).unwrap();

        let messages: Vec<_> = store
            .list(None)
            .unwrap()
            .into_iter()
            .map(|c| c.message)
            .collect();
        assert_eq!(messages, vec!["two", "one"]);
    }

    #[test]
    fn test_list_scoped_to_changed_file() {
        let notes_dir = create_test_notes_dir();
        create_test_file(&notes_dir, "note.md", "a");
        create_test_file(&notes_dir, "other.md", "x");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        let other = RelativePath::new("other.md");

        store.commit_at("both", "Alice", &[note(), other], at(9)).unwrap();
        create_test_file(&notes_dir, "other.md", "y");
        store.commit_at("other only", "Alice", &[other], at(10)).unwrap();

        let for_note: Vec<_> = store
            .list(Some(note()))
            .unwrap()
            .into_iter()
            .map(|c| c.message)
            .collect();
        assert_eq!(for_note, vec!["both"]);
        assert_eq!(store.list(Some(other)).unwrap().len(), 2);
        assert!(store.list(Some(RelativePath::new("missing.md"))).unwrap().is_empty());
    }

    #[test]
    fn test_untouched_files_carry_forward() {
        let notes_dir = create_test_notes_dir();
        create_test_file(&notes_dir, "note.md", "kept");
        create_test_file(&notes_dir, "other.md", "x");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");

        store.commit_at("note", "Alice", &[note()], at(9)).unwrap();
        let later = store
            .commit_at("other", "Alice", &[RelativePath::new("other.md")], at(10))
            .unwrap();

        assert_eq!(store.content_at(&later.hash, note()).unwrap(), "kept");
    }

    #[test]
    fn test_content_at_unknown_revision() {
        let notes_dir = create_test_notes_dir();
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");

        let result = store.content_at("deadbeef", note());

        assert!(matches!(
            result,
            Err(StorageError::NotFound { ref hash, .. }) if hash == "deadbeef"
        ));
    }

    #[test]
    fn test_restore_single_file() {
        let notes_dir = create_test_notes_dir();
        let path = create_test_file(&notes_dir, "note.md", "original");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        let commit = store.commit_at("save", "Alice", &[note()], at(9)).unwrap();

        std::fs::write(&path, "edited").unwrap();
        store.restore(&commit.hash, Some(note())).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_restore_whole_commit() {
        let notes_dir = create_test_notes_dir();
        let note_path = create_test_file(&notes_dir, "note.md", "a1");
        let other_path = create_test_file(&notes_dir, "other.md", "b1");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        let commit = store
            .commit_at("both", "Alice", &[note(), RelativePath::new("other.md")], at(9))
            .unwrap();

        std::fs::write(&note_path, "a2").unwrap();
        std::fs::write(&other_path, "b2").unwrap();
        store.restore(&commit.hash, None).unwrap();

        assert_eq!(std::fs::read_to_string(&note_path).unwrap(), "a1");
        assert_eq!(std::fs::read_to_string(&other_path).unwrap(), "b1");
    }

    #[test]
    fn test_failed_restore_leaves_live_files_untouched() {
        let notes_dir = create_test_notes_dir();
        let note_path = create_test_file(&notes_dir, "note.md", "a1");
        create_test_file(&notes_dir, "other.md", "b1");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        let other = RelativePath::new("other.md");
        let commit = store
            .commit_at("both", "Alice", &[note(), other], at(9))
            .unwrap();

        // Lose the blob of other.md so restore fails after note.md was read
        let blob = blake3::hash(b"b1").to_hex().to_string();
        std::fs::remove_file(store.object_path(&blob)).unwrap();
        std::fs::write(&note_path, "a2").unwrap();

        let result = store.restore(&commit.hash, None);

        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert_eq!(std::fs::read_to_string(&note_path).unwrap(), "a2");
    }

    #[test]
    fn test_restore_rolls_back_when_a_rename_fails() {
        let notes_dir = create_test_notes_dir();
        let note_path = create_test_file(&notes_dir, "note.md", "a1");
        let other_path = create_test_file(&notes_dir, "other.md", "b1");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        let commit = store
            .commit_at("both", "Alice", &[note(), RelativePath::new("other.md")], at(9))
            .unwrap();

        // note.md is swapped in first, then other.md cannot replace a directory
        std::fs::write(&note_path, "a2").unwrap();
        std::fs::remove_file(&other_path).unwrap();
        create_test_file(&notes_dir, "other.md/inner.md", "keep");

        let result = store.restore(&commit.hash, None);

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(std::fs::read_to_string(&note_path).unwrap(), "a2");
        assert!(other_path.is_dir());
        let leftovers: Vec<_> = std::fs::read_dir(notes_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(STAGING_SUFFIX) || name.ends_with(BACKUP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
    }

    #[test]
    fn test_restore_unknown_revision() {
        let notes_dir = create_test_notes_dir();
        let path = create_test_file(&notes_dir, "note.md", "live");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");

        let result = store.restore("deadbeef", Some(note()));

        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "live");
    }

    #[test]
    fn test_corrupt_index() {
        let notes_dir = create_test_notes_dir();
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        std::fs::create_dir_all(store.store_dir()).unwrap();
        std::fs::write(store.store_dir().join("commits.json"), "{not json").unwrap();

        assert!(matches!(store.list(None), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_tampered_object_is_corrupt() {
        let notes_dir = create_test_notes_dir();
        create_test_file(&notes_dir, "note.md", "real");
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");
        let commit = store.commit_at("save", "Alice", &[note()], at(9)).unwrap();

        let blob = blake3::hash(b"real").to_hex().to_string();
        std::fs::write(store.object_path(&blob), "fake").unwrap();

        assert!(matches!(
            store.content_at(&commit.hash, note()),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_commit_missing_live_file() {
        let notes_dir = create_test_notes_dir();
        let store = FsRevisionStore::new(notes_dir.path(), ".folio-history");

        let result = store.commit("save", "Alice", &[note()]);

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(store.list(None).unwrap().is_empty());
    }
}
