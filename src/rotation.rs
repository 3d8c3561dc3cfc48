//! Rotation-aware incremental reading across a directory of log files.
//!
//! [`DirectoryReader`] decides, across repeated polls, which file to read
//! from, where to resume within it, whether a file was rewritten or merely
//! appended to, and when the final line of a file is safe to emit.
//!
//! The reader never hands out the most recently read line immediately: a
//! line at the physical end of a file may still be mid-write. It is held
//! back until one of three events proves it complete:
//!
//! 1. a further line is read from the same file;
//! 2. a newer file appears, so nothing more can arrive for the old one;
//! 3. a refresh finds the file's size and modification time stable (or the
//!    re-read tail byte-for-byte identical), proving the tail settled.
//!
//! The reader is therefore always one line behind the raw stream, and emits
//! lines in strict physical order within a file and non-decreasing
//! modification-time order across files.

use crate::cursor::ReadCursor;
use crate::error::{Error, Result};
use crate::file_info::FileInfo;
use crate::scanner;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info, trace, warn};

/// The file currently owned by the reader: its snapshot, the open cursor,
/// and the withheld last line.
#[derive(Debug)]
struct ActiveFile {
    info: FileInfo,
    cursor: ReadCursor,
    /// Most recently read line, withheld until proven complete.
    held: Option<String>,
    /// Set once a refresh has proven the held line safe to release.
    releasable: bool,
}

/// State of the reader between polls. Keeping the active file inside the
/// variant makes "a held line with no open file" unrepresentable.
#[derive(Debug)]
enum ReaderState {
    /// No file is open.
    Idle,
    /// Normal forward reads on the current file.
    Active(ActiveFile),
    /// The active file changed underneath us and the re-read tail did not
    /// match the held line; waiting for a later refresh to prove it stable.
    AwaitingConfirm(ActiveFile),
}

/// Rotation-aware reader over a directory of log files.
///
/// Files are processed in ascending modification-time order. The queue of
/// discovered files never contains the active file; it holds only files
/// later in the ordering (plus, transiently, files tied with the active
/// one's timestamp so none is skipped).
#[derive(Debug)]
pub struct DirectoryReader {
    directory: PathBuf,
    filter: Regex,
    queue: VecDeque<FileInfo>,
    state: ReaderState,
    /// Modification time of the most recently opened file. Older files are
    /// never revisited, even after the reader goes idle.
    floor: Option<SystemTime>,
}

impl DirectoryReader {
    /// Create a reader over `directory`, considering only file names fully
    /// matched by `file_filter`.
    ///
    /// Fails with a configuration error when the directory is missing or is
    /// a file, and with a pattern error when the filter does not compile.
    pub async fn new(directory: impl AsRef<Path>, file_filter: &str) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&directory).await.map_err(|_| Error::Config {
            message: format!("cannot find directory: {}", directory.display()),
        })?;
        if !metadata.is_dir() {
            return Err(Error::Config {
                message: format!(
                    "expected {} to be a directory but it is a file",
                    directory.display()
                ),
            });
        }
        // anchor so the filter matches whole names, not substrings
        let filter = Regex::new(&format!(r"\A(?:{file_filter})\z"))?;

        let mut reader = Self {
            directory,
            filter,
            queue: VecDeque::new(),
            state: ReaderState::Idle,
            floor: None,
        };
        if let Some(files) = scanner::find_files(&reader.directory, &reader.filter, None).await {
            info!(count = files.len(), directory = %reader.directory.display(),
                "discovered initial log files");
            reader.queue.extend(files);
        }
        Ok(reader)
    }

    /// Return the next emittable line, or `None` when everything currently
    /// provable-complete has been emitted.
    ///
    /// On a read failure the active handle is closed and the error is
    /// surfaced; the caller decides whether to wait or fail.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        match self.read_skip_last().await {
            Ok(Some(line)) => return Ok(Some(line)),
            Ok(None) => {}
            Err(err) => return Err(self.fail_active(err)),
        }
        loop {
            if !self.queue.is_empty() {
                if let ReaderState::Active(af) | ReaderState::AwaitingConfirm(af) = &mut self.state
                {
                    if let Some(line) = af.held.take() {
                        // a newer file is queued; nothing more can ever
                        // arrive for the current one, so its last line is
                        // final
                        af.releasable = false;
                        return Ok(Some(line));
                    }
                }
            }
            let Some(next) = self.queue.pop_front() else {
                return Ok(None);
            };
            if let Err(err) = self.open_next(next).await {
                return Err(self.fail_active(err));
            }
            match self.read_skip_last().await {
                Ok(Some(line)) => return Ok(Some(line)),
                Ok(None) => {}
                Err(err) => return Err(self.fail_active(err)),
            }
        }
    }

    /// Re-scan the directory and advance the queue/cursor bookkeeping.
    ///
    /// Returns whether new or updated content is now available. A failed
    /// directory listing yields `false`: no new information, not "no
    /// files".
    pub async fn refresh(&mut self) -> Result<bool> {
        trace!("refreshing state");
        if !self.queue.is_empty() {
            // some files are still waiting to be processed
            return Ok(true);
        }
        let Some(files) = scanner::find_files(&self.directory, &self.filter, self.floor).await
        else {
            return Ok(false);
        };
        if files.is_empty() {
            debug!(directory = %self.directory.display(), "no new files found");
            return Ok(false);
        }

        let last = match &self.state {
            ReaderState::Active(af) | ReaderState::AwaitingConfirm(af) => Some(af.info.clone()),
            ReaderState::Idle => None,
        };
        let filtered = filter_ties(last.as_ref(), files);
        debug!(count = filtered.len(), "filtered new or updated files");

        let state = std::mem::replace(&mut self.state, ReaderState::Idle);
        match state {
            ReaderState::Active(af) | ReaderState::AwaitingConfirm(af)
                if filtered.front().is_some_and(|head| *head == af.info) =>
            {
                // the queue head is the file we are already reading; check
                // whether it changed underneath us
                self.refresh_active(af, filtered).await
            }
            mut other => {
                let mut releasable = false;
                if let ReaderState::Active(af) | ReaderState::AwaitingConfirm(af) = &mut other {
                    af.releasable = af.held.is_some();
                    releasable = af.releasable;
                }
                self.state = other;
                self.queue.extend(filtered);
                Ok(releasable || !self.queue.is_empty())
            }
        }
    }

    /// Release the active file handle. Idempotent; the discovery floor is
    /// kept so already-finalized files are not re-read.
    pub fn close(&mut self) {
        if !matches!(self.state, ReaderState::Idle) {
            debug!("closing active file");
            self.state = ReaderState::Idle;
        }
    }

    /// The active file's identity matched the fresh queue head but its size
    /// or mtime may have changed: re-validate the held line by rolling back
    /// to the byte offset where it starts and re-reading it.
    async fn refresh_active(
        &mut self,
        mut af: ActiveFile,
        mut filtered: VecDeque<FileInfo>,
    ) -> Result<bool> {
        let head_modified = filtered.front().is_some_and(|head| af.info.is_modified(head));
        if !head_modified {
            trace!(file = %af.info.path().display(), "file is not modified");
            filtered.pop_front();
            af.releasable = af.held.is_some();
            let available = af.releasable;
            self.state = ReaderState::Active(af);
            self.queue.extend(filtered);
            return Ok(available);
        }

        if af.held.is_none() {
            // the previous tail was already emitted, so there is nothing to
            // re-validate; reopen at the emitted offset and read forward,
            // unless the file shrank below it
            let mut reopened = ReadCursor::open(af.info.path()).await?;
            match reopened.seek(af.info.position_after().unwrap_or(0)).await {
                Ok(()) => af.cursor = reopened,
                Err(Error::PositionOutOfRange { .. }) => {
                    info!(file = %af.info.path().display(),
                        "file shrank after its tail was emitted; reopening from scratch");
                    drop(af);
                    return self.reopen_from_scratch(filtered).await;
                }
                Err(err) => return Err(err),
            }
            if let Some(mut fresh) = filtered.pop_front() {
                fresh.copy_positions(&af.info);
                af.info = fresh;
            }
            self.state = ReaderState::Active(af);
            self.queue.extend(filtered);
            return Ok(true);
        }

        let before = af.info.position_before();
        let after = af.info.position_after();
        // reopen by path: a rename-based rotation leaves the old handle on
        // the replaced inode, so seeking it would re-read stale content
        let mut reopened = ReadCursor::open(af.info.path()).await?;
        match reopened.seek(before.unwrap_or(0)).await {
            Ok(()) => af.cursor = reopened,
            Err(err @ Error::PositionOutOfRange { .. }) => {
                // the rotation heuristic's assumptions were violated, e.g.
                // the file shrank past the tracked offset
                error!(error = %err, file = %af.info.path().display(),
                    "recorded position no longer matches the file; reopening from scratch");
                drop(af);
                return self.reopen_from_scratch(filtered).await;
            }
            Err(err) => return Err(err),
        }
        af.info.set_positions(None, before);
        let reread = af.cursor.read_raw(&mut af.info).await?;
        trace!(held = ?af.held, reread = ?reread, "re-validating held line");

        if reread == af.held {
            // same trailing content survived the change (append of the
            // missing newline, or an atomic replace preserving the tail):
            // the held line is confirmed and the fresh snapshot becomes the
            // active file
            af.releasable = af.held.is_some();
            af.held = reread;
            if let Some(mut fresh) = filtered.pop_front() {
                fresh.copy_positions(&af.info);
                af.info = fresh;
            }
            self.state = ReaderState::Active(af);
            self.queue.extend(filtered);
            return Ok(true);
        }

        // the held line truly changed; check whether content was appended
        // past it
        af.held = reread;
        let confirmed_before = af.info.position_before();
        let confirmed_after = af.info.position_after();
        match af.cursor.read_raw(&mut af.info).await? {
            None => {
                // the file still ends exactly at the updated line, which may
                // keep growing: emit nothing this cycle
                af.info.set_positions(before, after);
                self.state = ReaderState::AwaitingConfirm(af);
                Ok(false)
            }
            Some(_) => {
                // a later line exists, so the updated line is complete;
                // rewind so the later line is read again, in order
                af.cursor.seek(confirmed_after.unwrap_or(0)).await?;
                af.info.set_positions(confirmed_before, confirmed_after);
                af.releasable = true;
                debug!("held line confirmed by a newer line");
                self.state = ReaderState::Active(af);
                self.queue.extend(filtered);
                Ok(true)
            }
        }
    }

    /// Discard the stale bookkeeping and restart from the head of the fresh
    /// file list.
    async fn reopen_from_scratch(&mut self, mut filtered: VecDeque<FileInfo>) -> Result<bool> {
        let Some(fresh) = filtered.pop_front() else {
            return Ok(false);
        };
        self.queue.extend(filtered);
        self.open_next(fresh).await?;
        Ok(true)
    }

    /// Emit the previously held line instead of the freshest read, keeping
    /// the reader one line behind the raw stream.
    async fn read_skip_last(&mut self) -> Result<Option<String>> {
        let (ReaderState::Active(af) | ReaderState::AwaitingConfirm(af)) = &mut self.state else {
            return Ok(None);
        };
        if af.releasable && af.held.is_some() {
            af.releasable = false;
            return Ok(af.held.take());
        }
        match af.cursor.read_raw(&mut af.info).await? {
            Some(line) => Ok(af.held.replace(line)),
            None => Ok(None),
        }
    }

    /// Open the cursor on `next` and prime the held line with its first
    /// line. Any previous handle is dropped first.
    async fn open_next(&mut self, next: FileInfo) -> Result<()> {
        info!(file = %next.path().display(), "start processing file");
        self.state = ReaderState::Idle;
        let cursor = ReadCursor::open(next.path()).await?;
        self.floor = Some(next.modified());
        let mut af = ActiveFile {
            info: next,
            cursor,
            held: None,
            releasable: false,
        };
        af.held = af.cursor.read_raw(&mut af.info).await?;
        self.state = ReaderState::Active(af);
        Ok(())
    }

    /// Close the active handle on a read failure and pass the error on. Any
    /// held line is lost; its validity can no longer be proven.
    fn fail_active(&mut self, err: Error) -> Error {
        if !matches!(self.state, ReaderState::Idle) {
            warn!(error = %err, "read failed; closing the active file");
            self.state = ReaderState::Idle;
        }
        err
    }

    #[cfg(test)]
    fn is_awaiting_confirm(&self) -> bool {
        matches!(self.state, ReaderState::AwaitingConfirm(_))
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        matches!(self.state, ReaderState::Idle)
    }
}

/// When freshly listed files start at the active file's modification time,
/// collapse the tied block: keep its final member plus everything strictly
/// newer, so repeated refreshes neither starve a tied file nor loop over
/// already-finalized ones.
fn filter_ties(last: Option<&FileInfo>, files: VecDeque<FileInfo>) -> VecDeque<FileInfo> {
    let Some(last) = last else {
        return files;
    };
    let same_time = files
        .front()
        .is_some_and(|head| head.modified() == last.modified());
    if !same_time || files.len() == 1 {
        return files;
    }

    let mut iter = files.into_iter();
    let Some(mut prev) = iter.next() else {
        return VecDeque::new();
    };
    let mut filtered = VecDeque::new();
    while let Some(curr) = iter.next() {
        if curr.modified() != last.modified() && curr != *last {
            trace!(tied = %prev.path().display(), newer = %curr.path().display(),
                "found first newer file after tied block");
            filtered.push_back(prev);
            filtered.push_back(curr);
            filtered.extend(iter);
            return filtered;
        }
        prev = curr;
    }
    filtered.push_back(prev);
    filtered
}
