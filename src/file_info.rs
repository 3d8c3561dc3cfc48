//! Metadata snapshot and read-position bookkeeping for one candidate file.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot of one candidate file taken at discovery time, plus the byte
/// offsets bracketing the most recently read line.
///
/// Identity is the file path: two snapshots of the same path compare equal
/// even when their size or modification time differ. That comparison is what
/// separates "the active file was modified in place" from "a different file
/// rotated in".
#[derive(Debug, Clone)]
pub(crate) struct FileInfo {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
    /// Byte offset at which the most recently read line starts.
    before: Option<u64>,
    /// Byte offset just past the most recently read line.
    after: Option<u64>,
}

impl FileInfo {
    /// Build a snapshot from a filesystem stat. Returns `None` when the
    /// platform reports no modification time.
    pub(crate) fn from_metadata(path: PathBuf, metadata: &std::fs::Metadata) -> Option<Self> {
        Some(Self {
            path,
            modified: metadata.modified().ok()?,
            size: metadata.len(),
            before: None,
            after: None,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn modified(&self) -> SystemTime {
        self.modified
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn position_before(&self) -> Option<u64> {
        self.before
    }

    pub(crate) fn position_after(&self) -> Option<u64> {
        self.after
    }

    pub(crate) fn set_positions(&mut self, before: Option<u64>, after: Option<u64>) {
        self.before = before;
        self.after = after;
    }

    /// Record the end offset of a freshly read line, shifting the previous
    /// end offset into the start marker.
    pub(crate) fn update_position(&mut self, offset: u64) {
        self.before = self.after;
        self.after = Some(offset);
    }

    pub(crate) fn copy_positions(&mut self, other: &FileInfo) {
        self.before = other.before;
        self.after = other.after;
    }

    /// Whether a fresh snapshot of the same path shows different content:
    /// either the modification time or the size changed.
    pub(crate) fn is_modified(&self, fresh: &FileInfo) -> bool {
        self.modified != fresh.modified || self.size != fresh.size
    }
}

impl PartialEq for FileInfo {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileInfo {}
