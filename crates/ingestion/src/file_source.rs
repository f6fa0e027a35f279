//! File tail source
//!
//! Follows appended lines of one file. Lines are read as raw bytes, so a line
//! that is not valid UTF-8 still reaches the formatter, which counts and drops
//! it; it never ends the source.
//!
//! The linemux watcher only wakes the reader. After every wake-up (or every
//! `RESCAN_INTERVAL` without one) the path is checked again: a different
//! inode means the file was rotated or re-created, a size below the read
//! position means it was truncated, and an unlinked handle means it was
//! deleted and written again. In every case it is reopened from the start,
//! after the old handle has been read to its end.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, RecordSource};
use linemux::MuxedEvents;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info};

const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Open handle on the file currently behind the path.
struct Tail {
    reader: BufReader<File>,
    pos: u64,
    id: Option<u64>,
}

impl Tail {
    async fn open(path: &Path, from_end: bool) -> io::Result<Self> {
        let mut file = File::open(path).await?;
        let id = file_id(&file.metadata().await?);
        let pos = if from_end { file.seek(SeekFrom::End(0)).await? } else { 0 };
        Ok(Self {
            reader: BufReader::new(file),
            pos,
            id,
        })
    }
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Deleted while still open; its inode number may already be reused.
#[cfg(unix)]
fn is_unlinked(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    meta.nlink() == 0
}

#[cfg(not(unix))]
fn is_unlinked(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Tails one file from its current end.
pub struct FileRecordSource {
    name: String,
    path: PathBuf,
    events: MuxedEvents,
    tail: Option<Tail>,
    /// Bytes of a line whose newline has not been written yet
    partial: Vec<u8>,
}

impl FileRecordSource {
    /// Open `path` for tailing under `name`.
    ///
    /// # Errors
    /// `SourceOpen` when the file does not exist, is not a regular file, or
    /// the watcher cannot be installed.
    pub async fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, ContractError> {
        let name = name.into();
        let path = path.into();
        let open_error = |e: io::Error| ContractError::source_open(&name, format!("{}: {}", path.display(), e));

        let meta = tokio::fs::metadata(&path).await.map_err(open_error)?;
        if !meta.is_file() {
            return Err(ContractError::source_open(
                &name,
                format!("{} is not a regular file", path.display()),
            ));
        }

        // Watch before seeking so nothing appended in between goes unnoticed.
        let mut events = MuxedEvents::new().map_err(|e| ContractError::source_open(&name, e.to_string()))?;
        events.add_file(path.clone()).await.map_err(open_error)?;
        let tail = Tail::open(&path, true).await.map_err(open_error)?;

        debug!(source = %name, path = %path.display(), offset = tail.pos, "tailing file");
        Ok(Self {
            name,
            path,
            events,
            tail: Some(tail),
            partial: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, e: io::Error) -> ContractError {
        ContractError::source_read(&self.name, format!("{}: {}", self.path.display(), e))
    }

    /// Switch to the file now at the path if it is not the one being read.
    ///
    /// Returns true when a new handle was opened.
    async fn reopen_if_replaced(&mut self) -> Result<bool, ContractError> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            // Moved away or deleted; wait for a new file to appear.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.read_error(e)),
        };

        let replaced = match &self.tail {
            Some(tail) => {
                let unlinked = match tail.reader.get_ref().metadata().await {
                    Ok(current) => is_unlinked(&current),
                    Err(_) => true,
                };
                unlinked || file_id(&meta) != tail.id || meta.len() < tail.pos
            }
            None => true,
        };
        if !replaced {
            return Ok(false);
        }

        match Tail::open(&self.path, false).await {
            Ok(tail) => {
                if !self.partial.is_empty() {
                    debug!(source = %self.name, bytes = self.partial.len(), "discarding unterminated line");
                    self.partial.clear();
                }
                info!(source = %self.name, path = %self.path.display(), "file rotated, reading from start");
                self.tail = Some(tail);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.read_error(e)),
        }
    }

    async fn wait_for_change(&mut self) -> Result<(), ContractError> {
        match tokio::time::timeout(RESCAN_INTERVAL, self.events.next_event()).await {
            Ok(Ok(Some(_))) | Err(_) => Ok(()),
            Ok(Ok(None)) => {
                // Nothing left to watch; fall back to polling.
                tokio::time::sleep(RESCAN_INTERVAL).await;
                Ok(())
            }
            Ok(Err(e)) => Err(self.read_error(e)),
        }
    }
}

impl RecordSource for FileRecordSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_line(&mut self) -> Result<Option<Bytes>, ContractError> {
        loop {
            if let Some(tail) = self.tail.as_mut() {
                let read = tail.reader.read_until(b'\n', &mut self.partial).await;
                let n = read.map_err(|e| ContractError::source_read(&self.name, e.to_string()))?;
                tail.pos += n as u64;

                if self.partial.last() == Some(&b'\n') {
                    self.partial.pop();
                    return Ok(Some(Bytes::from(std::mem::take(&mut self.partial))));
                }
            }

            // At the end of the current handle.
            if self.reopen_if_replaced().await? {
                continue;
            }
            self.wait_for_change().await?;
        }
    }
}
