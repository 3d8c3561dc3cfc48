//! Directory scanning for candidate log files.

use crate::file_info::FileInfo;
use regex::Regex;
use std::collections::VecDeque;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// List the files in `dir` whose names match `filter`, oldest first.
///
/// Files modified strictly earlier than `floor` are dropped; with no floor
/// every match is returned. Ties on modification time keep the directory
/// iteration order (the sort is stable).
///
/// Returns `None` when the directory listing itself fails. Callers must
/// treat that as "no new information this cycle", not as an empty directory.
pub(crate) async fn find_files(
    dir: &Path,
    filter: &Regex,
    floor: Option<SystemTime>,
) -> Option<VecDeque<FileInfo>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = %dir.display(), error = %e, "failed to list log directory");
            return None;
        }
    };

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "failed to iterate log directory");
                return None;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !filter.is_match(name) {
            continue;
        }
        // A file can vanish between listing and stat; skip it this cycle.
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(file = %entry.path().display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let Some(info) = FileInfo::from_metadata(entry.path(), &metadata) else {
            continue;
        };
        if floor.is_some_and(|floor| info.modified() < floor) {
            continue;
        }
        files.push(info);
    }

    files.sort_by_key(|info| info.modified());
    Some(files.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TempLogDir;
    use std::time::Duration;

    fn filter(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[tokio::test]
    async fn test_lists_matching_files_sorted_by_mtime() {
        let dir = TempLogDir::new().unwrap();
        let base = SystemTime::now();
        dir.create("b.log", "bbb\n").unwrap();
        dir.set_modified("b.log", base + Duration::from_secs(10))
            .unwrap();
        dir.create("a.log", "aaa\n").unwrap();
        dir.set_modified("a.log", base).unwrap();
        dir.create("notes.txt", "skip\n").unwrap();

        let files = find_files(dir.path(), &filter(r".*\.log"), None)
            .await
            .unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|f| f.path().file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.log", "b.log"]);
    }

    #[tokio::test]
    async fn test_floor_drops_strictly_older_files() {
        let dir = TempLogDir::new().unwrap();
        let base = SystemTime::now();
        dir.create("old.log", "old\n").unwrap();
        dir.set_modified("old.log", base - Duration::from_secs(60))
            .unwrap();
        dir.create("same.log", "same\n").unwrap();
        dir.set_modified("same.log", base).unwrap();
        dir.create("new.log", "new\n").unwrap();
        dir.set_modified("new.log", base + Duration::from_secs(60))
            .unwrap();

        let files = find_files(dir.path(), &filter(r".*\.log"), Some(base))
            .await
            .unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|f| f.path().file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        // files at exactly the floor are kept
        assert_eq!(names, vec!["same.log", "new.log"]);
    }

    #[tokio::test]
    async fn test_empty_match_is_distinct_from_listing_failure() {
        let dir = TempLogDir::new().unwrap();
        dir.create("notes.txt", "skip\n").unwrap();

        let files = find_files(dir.path(), &filter(r".*\.log"), None).await;
        assert_eq!(files.map(|f| f.len()), Some(0));

        let missing = dir.path().join("does-not-exist");
        let files = find_files(&missing, &filter(r".*\.log"), None).await;
        assert!(files.is_none());
    }

    #[tokio::test]
    async fn test_directories_are_ignored() {
        let dir = TempLogDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub.log")).unwrap();
        dir.create("real.log", "data\n").unwrap();

        let files = find_files(dir.path(), &filter(r".*\.log"), None)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path().file_name().unwrap(), "real.log");
    }
}
