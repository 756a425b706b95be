//! Directory listing: a blocking producer reads the host directory in batches
//! and feeds a bounded channel that the caller drains as a stream.

use std::fs::{FileType, ReadDir};
use std::io;
use std::os::unix::fs::{DirEntryExt, FileTypeExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::api::{DirEntry, Result};

/// Entries fetched from the host in one go, and the error that cut the fetch
/// short, if any.
pub(crate) struct Batch {
    pub entries: Vec<DirEntry>,
    pub error: Option<io::Error>,
}

/// A host directory read in batches.
///
/// Dropping the source closes the host directory.
pub(crate) trait EntrySource: Send + 'static {
    /// Fetches up to `want` entries. Fewer than `want` means the end of the
    /// directory was reached.
    fn fetch(&mut self, want: usize) -> Batch;
}

pub(crate) struct ReadDirSource {
    inner: ReadDir,
}

impl ReadDirSource {
    pub fn new(inner: ReadDir) -> Self {
        ReadDirSource { inner }
    }
}

impl EntrySource for ReadDirSource {
    fn fetch(&mut self, want: usize) -> Batch {
        let mut entries = Vec::with_capacity(want);
        while entries.len() < want {
            let entry = match self.inner.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    return Batch {
                        entries,
                        error: Some(e),
                    };
                }
            };
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    return Batch {
                        entries,
                        error: Some(e),
                    };
                }
            };
            entries.push(DirEntry {
                name: entry.file_name(),
                mode: type_bits(file_type),
                ino: entry.ino(),
            });
        }
        Batch {
            entries,
            error: None,
        }
    }
}

fn type_bits(file_type: FileType) -> u32 {
    if file_type.is_dir() {
        libc::S_IFDIR
    } else if file_type.is_symlink() {
        libc::S_IFLNK
    } else if file_type.is_char_device() {
        libc::S_IFCHR
    } else if file_type.is_block_device() {
        libc::S_IFBLK
    } else if file_type.is_fifo() {
        libc::S_IFIFO
    } else if file_type.is_socket() {
        libc::S_IFSOCK
    } else {
        libc::S_IFREG
    }
}

/// Entries of one directory listing, in host order.
///
/// The stream ends after the last entry. A host failure during the listing
/// arrives as a final `Err` item. Dropping the stream stops the producer and
/// closes the host directory.
pub struct DirStream {
    rx: mpsc::Receiver<Result<DirEntry>>,
}

impl Stream for DirStream {
    type Item = Result<DirEntry>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts the producer for `source` on the blocking pool. Must be called from
/// within a tokio runtime.
pub(crate) fn spawn_listing<S: EntrySource>(mut source: S, batch: usize) -> DirStream {
    let batch = batch.max(1);
    let (tx, rx) = mpsc::channel(batch);
    tokio::task::spawn_blocking(move || {
        produce(&mut source, &tx, batch);
        // the host directory is closed before the consumer sees the end
        drop(source);
        drop(tx);
    });
    DirStream { rx }
}

fn produce<S: EntrySource>(source: &mut S, tx: &mpsc::Sender<Result<DirEntry>>, batch: usize) {
    loop {
        let Batch { entries, error } = source.fetch(batch);
        let short = entries.len() < batch;
        for entry in entries {
            if tx.blocking_send(Ok(entry)).is_err() {
                trace!("loopback: listing abandoned by consumer");
                return;
            }
        }
        if let Some(e) = error {
            debug!("loopback: listing stopped by host error: {e}");
            let _ = tx.blocking_send(Err(e.into()));
            return;
        }
        if short {
            return;
        }
    }
}
