//! The path-based filesystem service contract.
//!
//! A protocol layer decodes kernel requests into calls on [`PathFilesystem`]
//! and, for open files, on the [`FileHandle`] it handed out. Every call
//! returns either its payload or a [`Status`].

pub mod attr;
pub mod buffer;
pub mod status;

use std::ffi::{OsStr, OsString};
use std::time::SystemTime;

use bytes::Bytes;
use futures::Stream;
use nix::errno::Errno;

pub use attr::{Attr, DirEntry, StatFs};
pub use buffer::{BufferPool, HeapBufferPool};
pub use status::{Result, Status};

/// Payload of a data transfer together with its status.
///
/// A transfer may fail after moving part of its data; `data` then holds what
/// was transferred before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoOutcome<T> {
    pub data: T,
    pub status: Result<()>,
}

impl<T> IoOutcome<T> {
    pub fn ok(data: T) -> Self {
        IoOutcome {
            data,
            status: Ok(()),
        }
    }

    /// Drops partial data when the transfer failed.
    pub fn into_result(self) -> Result<T> {
        self.status.map(|()| self.data)
    }
}

fn enosys<T>() -> Result<T> {
    Err(Status::Io(Errno::ENOSYS))
}

/// Filesystem verbs addressed by a path relative to the filesystem root.
///
/// Optional verbs default to `ENOSYS`.
pub trait PathFilesystem: Send + Sync {
    type File: FileHandle;
    type DirStream: Stream<Item = Result<DirEntry>> + Send + Unpin;

    async fn getattr(&self, path: &OsStr) -> Result<Attr>;

    /// Lists a directory as a lazy, finite stream of entries.
    async fn opendir(&self, path: &OsStr) -> Result<Self::DirStream>;

    async fn open(&self, path: &OsStr, flags: u32) -> Result<Self::File>;

    /// Opens `path` with `O_CREAT` added to `flags`, applying `mode` when the
    /// file is created.
    async fn create(&self, path: &OsStr, flags: u32, mode: u32) -> Result<Self::File>;

    async fn mkdir(&self, path: &OsStr, mode: u32) -> Result<()>;

    /// Removes a non-directory entry.
    async fn unlink(&self, path: &OsStr) -> Result<()>;

    async fn rmdir(&self, path: &OsStr) -> Result<()>;

    async fn rename(&self, old_path: &OsStr, new_path: &OsStr) -> Result<()>;

    async fn chmod(&self, _path: &OsStr, _mode: u32) -> Result<()> {
        enosys()
    }

    async fn chown(&self, _path: &OsStr, _uid: u32, _gid: u32) -> Result<()> {
        enosys()
    }

    async fn truncate(&self, _path: &OsStr, _size: u64) -> Result<()> {
        enosys()
    }

    /// Sets access and modification times; `None` leaves a time unchanged.
    async fn utimens(
        &self,
        _path: &OsStr,
        _atime: Option<SystemTime>,
        _mtime: Option<SystemTime>,
    ) -> Result<()> {
        enosys()
    }

    async fn readlink(&self, _path: &OsStr) -> Result<OsString> {
        enosys()
    }

    async fn mknod(&self, _path: &OsStr, _mode: u32, _rdev: u32) -> Result<()> {
        enosys()
    }

    async fn symlink(&self, _target: &OsStr, _link_path: &OsStr) -> Result<()> {
        enosys()
    }

    async fn link(&self, _orig_path: &OsStr, _new_path: &OsStr) -> Result<()> {
        enosys()
    }

    async fn access(&self, _path: &OsStr, _mask: u32) -> Result<()> {
        enosys()
    }

    async fn getxattr(&self, _path: &OsStr, _name: &OsStr) -> Result<Vec<u8>> {
        enosys()
    }

    async fn listxattr(&self, _path: &OsStr) -> Result<Vec<OsString>> {
        enosys()
    }

    async fn setxattr(
        &self,
        _path: &OsStr,
        _name: &OsStr,
        _value: &[u8],
        _flags: u32,
    ) -> Result<()> {
        enosys()
    }

    async fn removexattr(&self, _path: &OsStr, _name: &OsStr) -> Result<()> {
        enosys()
    }

    async fn statfs(&self, _path: &OsStr) -> Result<StatFs> {
        enosys()
    }
}

/// Verbs on one open file.
///
/// A handle is consumed by [`FileHandle::release`]; nothing can be issued on
/// it afterwards.
pub trait FileHandle: Send + Sync {
    /// Reads up to `size` bytes at `offset` into a buffer taken from `pool`.
    /// Reaching end-of-file is not an error.
    async fn read(&self, offset: u64, size: u32, pool: &dyn BufferPool) -> IoOutcome<Bytes>;

    /// Writes `data` at `offset` and reports how many bytes landed.
    async fn write(&self, offset: u64, data: &[u8]) -> IoOutcome<u32>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn release(self) -> Result<()>
    where
        Self: Sized;

    async fn fsync(&self, datasync: bool) -> Result<()>;

    async fn truncate(&self, size: u64) -> Result<()>;

    async fn chmod(&self, mode: u32) -> Result<()>;

    async fn chown(&self, uid: u32, gid: u32) -> Result<()>;

    async fn utimens(&self, _atime: Option<SystemTime>, _mtime: Option<SystemTime>) -> Result<()> {
        enosys()
    }

    async fn getattr(&self) -> Result<Attr>;
}
