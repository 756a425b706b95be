use std::fs::{File, Permissions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::time::SystemTime;

use bytes::Bytes;
use nix::errno::Errno;

use crate::api::{Attr, BufferPool, FileHandle, IoOutcome, Result, Status};
use crate::util::time::to_timespec;

/// An open host file.
///
/// Operations go to the retained descriptor, not the path, so they keep
/// working after the path is renamed or unlinked. The descriptor is closed by
/// [`FileHandle::release`], or on drop if the handle is never released.
#[derive(Debug)]
pub struct LoopbackFile {
    file: File,
}

impl LoopbackFile {
    pub(crate) fn new(file: File) -> Self {
        LoopbackFile { file }
    }
}

/// Bytes a single write may move; the reply counts them in a `u32`.
fn reply_len(len: usize) -> usize {
    len.min(u32::MAX as usize)
}

impl FileHandle for LoopbackFile {
    async fn read(&self, offset: u64, size: u32, pool: &dyn BufferPool) -> IoOutcome<Bytes> {
        let size = size as usize;
        let mut buf = pool.alloc_buffer(size);
        if buf.len() < size {
            buf.resize(size, 0);
        }

        let mut filled = 0;
        let mut status = Ok(());
        while filled < size {
            match self.file.read_at(&mut buf[filled..size], offset + filled as u64) {
                // end of file
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    status = Err(e.into());
                    break;
                }
            }
        }
        trace!("loopback: read off={offset} size={size} got={filled}");

        buf.truncate(filled);
        IoOutcome {
            data: buf.freeze(),
            status,
        }
    }

    async fn write(&self, offset: u64, data: &[u8]) -> IoOutcome<u32> {
        let data = &data[..reply_len(data.len())];
        let mut written = 0;
        let mut status = Ok(());
        while written < data.len() {
            match self.file.write_at(&data[written..], offset + written as u64) {
                Ok(0) => {
                    status = Err(Status::Io(Errno::EIO));
                    break;
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    status = Err(e.into());
                    break;
                }
            }
        }
        trace!("loopback: write off={offset} len={} put={written}", data.len());

        IoOutcome {
            data: written as u32,
            status,
        }
    }

    async fn release(self) -> Result<()> {
        let fd = self.file.into_raw_fd();
        trace!("loopback: release fd={fd}");
        nix::unistd::close(fd)?;
        Ok(())
    }

    async fn fsync(&self, datasync: bool) -> Result<()> {
        if datasync {
            self.file.sync_data()?;
        } else {
            self.file.sync_all()?;
        }
        Ok(())
    }

    async fn truncate(&self, size: u64) -> Result<()> {
        self.file.set_len(size)?;
        Ok(())
    }

    async fn chmod(&self, mode: u32) -> Result<()> {
        self.file.set_permissions(Permissions::from_mode(mode))?;
        Ok(())
    }

    async fn chown(&self, uid: u32, gid: u32) -> Result<()> {
        std::os::unix::fs::fchown(&self.file, Some(uid), Some(gid))?;
        Ok(())
    }

    async fn utimens(&self, atime: Option<SystemTime>, mtime: Option<SystemTime>) -> Result<()> {
        nix::sys::stat::futimens(
            self.file.as_raw_fd(),
            &to_timespec(atime),
            &to_timespec(mtime),
        )?;
        Ok(())
    }

    async fn getattr(&self) -> Result<Attr> {
        let md = self.file.metadata()?;
        Ok(Attr::from(&md))
    }
}

#[cfg(test)]
mod test {
    use std::fs::OpenOptions;
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    use bytes::BytesMut;

    use super::*;
    use crate::api::HeapBufferPool;

    fn open_rw(path: &std::path::Path) -> LoopbackFile {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .unwrap();
        LoopbackFile::new(file)
    }

    /// Hands out buffers shorter than requested.
    struct StingyPool;

    impl BufferPool for StingyPool {
        fn alloc_buffer(&self, _size: usize) -> BytesMut {
            BytesMut::new()
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let f = open_rw(&dir.path().join("data"));

        let out = f.write(0, b"hello loopback").await;
        assert_eq!(out, IoOutcome::ok(14));

        let got = f.read(0, 14, &HeapBufferPool).await;
        assert_eq!(got.status, Ok(()));
        assert_eq!(&got.data[..], b"hello loopback");

        let got = f.read(6, 4, &HeapBufferPool).await;
        assert_eq!(&got.data[..], b"loop");
        f.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_past_eof_is_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, b"0123456789").unwrap();
        let f = open_rw(&path);

        let got = f.read(4, 100, &HeapBufferPool).await;
        assert_eq!(got.status, Ok(()));
        assert_eq!(&got.data[..], b"456789");

        let got = f.read(50, 10, &HeapBufferPool).await;
        assert_eq!(got, IoOutcome::ok(Bytes::new()));
    }

    #[tokio::test]
    async fn test_short_pool_buffer_is_grown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow");
        std::fs::write(&path, b"abc").unwrap();
        let f = open_rw(&path);

        let got = f.read(0, 3, &StingyPool).await;
        assert_eq!(&got.data[..], b"abc");
    }

    #[tokio::test]
    async fn test_write_on_read_only_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro");
        std::fs::write(&path, b"x").unwrap();
        let f = LoopbackFile::new(File::open(&path).unwrap());

        let out = f.write(0, b"y").await;
        assert_eq!(out.data, 0);
        assert_eq!(out.status, Err(Status::Io(Errno::EBADF)));
    }

    #[tokio::test]
    async fn test_handle_ops_survive_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");
        let f = open_rw(&path);
        f.write(0, b"0123456789").await.into_result().unwrap();
        std::fs::remove_file(&path).unwrap();

        f.truncate(4).await.unwrap();
        f.chmod(0o600).await.unwrap();
        f.fsync(false).await.unwrap();
        f.fsync(true).await.unwrap();

        let attr = f.getattr().await.unwrap();
        assert_eq!(attr.size, 4);
        assert_eq!(attr.perm(), 0o600);
        assert_eq!(attr.nlink, 0);
        f.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_getattr_matches_fstat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stat");
        let f = open_rw(&path);
        f.write(0, &[7u8; 1000]).await.into_result().unwrap();

        let attr = f.getattr().await.unwrap();
        let md = std::fs::metadata(&path).unwrap();
        assert_eq!(attr.ino, md.ino());
        assert_eq!(attr.size, 1000);
        assert_eq!(attr.mode, md.mode());
        assert_eq!(attr.mtime, md.mtime());
        assert_eq!(attr.mtime_nsec as i64, md.mtime_nsec());
    }

    #[tokio::test]
    async fn test_chown_to_self() {
        let dir = tempfile::tempdir().unwrap();
        let f = open_rw(&dir.path().join("own"));
        let uid = nix::unistd::getuid().as_raw();
        let gid = nix::unistd::getgid().as_raw();
        f.chown(uid, gid).await.unwrap();

        let attr = f.getattr().await.unwrap();
        assert_eq!((attr.uid, attr.gid), (uid, gid));
    }

    #[tokio::test]
    async fn test_utimens_sets_mtime_only() {
        let dir = tempfile::tempdir().unwrap();
        let f = open_rw(&dir.path().join("times"));
        let before = f.getattr().await.unwrap();

        let mtime = UNIX_EPOCH + Duration::new(1_500_000_000, 42);
        f.utimens(None, Some(mtime)).await.unwrap();

        let after = f.getattr().await.unwrap();
        assert_eq!(after.mtime, 1_500_000_000);
        assert_eq!(after.mtime_nsec, 42);
        assert_eq!((after.atime, after.atime_nsec), (before.atime, before.atime_nsec));
    }

    #[test]
    fn test_write_len_fits_reply() {
        assert_eq!(reply_len(0), 0);
        assert_eq!(reply_len(4096), 4096);
        assert_eq!(reply_len(u32::MAX as usize), u32::MAX as usize);
        assert_eq!(reply_len(u32::MAX as usize + 1), u32::MAX as usize);
        assert_eq!(reply_len(usize::MAX), u32::MAX as usize);
    }

    #[tokio::test]
    async fn test_flush_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let f = open_rw(&dir.path().join("flush"));
        f.flush().await.unwrap();
    }
}
