//! Test utilities for building temporary log directories and files.

#[cfg(test)]
use std::fs::{File, OpenOptions};
#[cfg(test)]
use std::io::Write;
#[cfg(test)]
use std::path::Path;
#[cfg(test)]
use std::time::{Duration, SystemTime};

/// A temporary directory of log files with helpers to simulate appends,
/// rewrites and rotation.
#[cfg(test)]
pub struct TempLogDir {
    _temp_dir: tempfile::TempDir,
}

#[cfg(test)]
impl TempLogDir {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            _temp_dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Create (or rewrite in place) a file with the given content.
    pub fn create(&self, name: &str, content: &str) -> std::io::Result<()> {
        std::fs::write(self.path().join(name), content)
    }

    /// Append content without rewriting; no newline is added.
    pub fn append(&self, name: &str, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path().join(name))?;
        file.write_all(content.as_bytes())?;
        file.flush()
    }

    pub fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path().join(name))
    }

    /// Pin a file's modification time, for deterministic ordering and ties.
    pub fn set_modified(&self, name: &str, time: SystemTime) -> std::io::Result<()> {
        File::open(self.path().join(name))?.set_modified(time)
    }

    /// Push a file's modification time well past any earlier snapshot, so a
    /// change is always detected regardless of filesystem timestamp
    /// granularity.
    pub fn bump_modified(&self, name: &str) -> std::io::Result<()> {
        self.set_modified(name, SystemTime::now() + Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_append() {
        let dir = TempLogDir::new().unwrap();
        dir.create("test.log", "line 1\n").unwrap();
        dir.append("test.log", "line 2\n").unwrap();

        let content = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(content, "line 1\nline 2\n");
    }

    #[test]
    fn test_create_rewrites_in_place() {
        let dir = TempLogDir::new().unwrap();
        dir.create("test.log", "initial content\n").unwrap();
        dir.create("test.log", "short\n").unwrap();

        let content = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(content, "short\n");
    }

    #[test]
    fn test_set_modified_pins_mtime() {
        let dir = TempLogDir::new().unwrap();
        dir.create("a.log", "x\n").unwrap();
        dir.create("b.log", "y\n").unwrap();

        let t = SystemTime::now();
        dir.set_modified("a.log", t).unwrap();
        dir.set_modified("b.log", t).unwrap();

        let ma = std::fs::metadata(dir.path().join("a.log")).unwrap();
        let mb = std::fs::metadata(dir.path().join("b.log")).unwrap();
        assert_eq!(ma.modified().unwrap(), mb.modified().unwrap());
    }
}
