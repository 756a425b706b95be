//! A filesystem that shunts every request to a directory of the host
//! filesystem. It exercises the whole service contract without a synthetic
//! filesystem behind it.

pub mod dir;
pub mod file;

use std::ffi::{OsStr, OsString};
use std::fs::{DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use nix::sys::stat::{Mode, SFlag, UtimensatFlags};
use nix::unistd::AccessFlags;

use crate::api::{Attr, PathFilesystem, Result, StatFs, Status};
use crate::util::open_flags::OpenFlags;
use crate::util::time::to_timespec;
use crate::util::xattr;

pub use dir::DirStream;
pub use file::LoopbackFile;

/// Entries fetched from the host per directory read.
pub const READDIR_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct LoopbackFs {
    root: PathBuf,
    readdir_batch: usize,
}

/// Creates a loopback filesystem over `rootdir`, which must be an existing
/// directory.
pub fn new_loopback_fs(rootdir: impl AsRef<Path>) -> io::Result<LoopbackFs> {
    let rootdir = rootdir.as_ref();
    let md = std::fs::metadata(rootdir)?;
    if !md.is_dir() {
        return Err(io::Error::from_raw_os_error(libc::ENOTDIR));
    }
    info!("loopback: serving {}", rootdir.display());
    Ok(LoopbackFs::new(rootdir))
}

impl LoopbackFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LoopbackFs {
            root: root.into(),
            readdir_batch: READDIR_BATCH,
        }
    }

    /// Sets how many entries a directory listing fetches from the host at a
    /// time. Also bounds the listing queue.
    pub fn with_readdir_batch(mut self, batch: usize) -> Self {
        self.readdir_batch = batch.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `rel` under the root and cleans it lexically.
    ///
    /// Empty and `.` components and repeated separators are dropped, and a
    /// leading `/` does not escape the root. `..` removes the preceding
    /// component without consulting the host, so `missing/../f` names `f`
    /// and `link/..` names the directory holding `link`. A `..` at the root
    /// stays at the root.
    pub fn get_path(&self, rel: &OsStr) -> PathBuf {
        let mut path = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(name) => {
                    path.push(name);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth > 0 {
                        path.pop();
                        depth -= 1;
                    }
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        path
    }
}

impl PathFilesystem for LoopbackFs {
    type File = LoopbackFile;
    type DirStream = DirStream;

    async fn getattr(&self, path: &OsStr) -> Result<Attr> {
        let full = self.get_path(path);
        trace!("loopback: getattr {}", full.display());
        match std::fs::symlink_metadata(&full) {
            Ok(md) => Ok(Attr::from(&md)),
            Err(e) => {
                trace!("loopback: lstat {} failed: {e}", full.display());
                Err(Status::NotFound)
            }
        }
    }

    async fn opendir(&self, path: &OsStr) -> Result<DirStream> {
        let full = self.get_path(path);
        trace!("loopback: opendir {}", full.display());
        let rd = std::fs::read_dir(&full)?;
        Ok(dir::spawn_listing(
            dir::ReadDirSource::new(rd),
            self.readdir_batch,
        ))
    }

    async fn open(&self, path: &OsStr, flags: u32) -> Result<LoopbackFile> {
        let full = self.get_path(path);
        trace!("loopback: open {} flags={flags:#o}", full.display());
        let file = OpenFlags::from_request(flags)
            .to_open_options(0)?
            .open(&full)?;
        Ok(LoopbackFile::new(file))
    }

    async fn create(&self, path: &OsStr, flags: u32, mode: u32) -> Result<LoopbackFile> {
        let full = self.get_path(path);
        trace!(
            "loopback: create {} flags={flags:#o} mode={mode:#o}",
            full.display()
        );
        let file = (OpenFlags::from_request(flags) | OpenFlags::CREAT)
            .to_open_options(mode)?
            .open(&full)?;
        Ok(LoopbackFile::new(file))
    }

    async fn mkdir(&self, path: &OsStr, mode: u32) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: mkdir {} mode={mode:#o}", full.display());
        DirBuilder::new().mode(mode).create(&full)?;
        Ok(())
    }

    // unlink(2) only: a directory at `path` fails with EISDIR, never rmdir.
    async fn unlink(&self, path: &OsStr) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: unlink {}", full.display());
        nix::unistd::unlink(&full)?;
        Ok(())
    }

    async fn rmdir(&self, path: &OsStr) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: rmdir {}", full.display());
        std::fs::remove_dir(&full)?;
        Ok(())
    }

    async fn rename(&self, old_path: &OsStr, new_path: &OsStr) -> Result<()> {
        let from = self.get_path(old_path);
        let to = self.get_path(new_path);
        trace!("loopback: rename {} -> {}", from.display(), to.display());
        std::fs::rename(&from, &to)?;
        Ok(())
    }

    async fn chmod(&self, path: &OsStr, mode: u32) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: chmod {} mode={mode:#o}", full.display());
        std::fs::set_permissions(&full, Permissions::from_mode(mode))?;
        Ok(())
    }

    async fn chown(&self, path: &OsStr, uid: u32, gid: u32) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: chown {} {uid}:{gid}", full.display());
        std::os::unix::fs::chown(&full, Some(uid), Some(gid))?;
        Ok(())
    }

    async fn truncate(&self, path: &OsStr, size: u64) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: truncate {} size={size}", full.display());
        nix::unistd::truncate(&full, size as libc::off_t)?;
        Ok(())
    }

    async fn utimens(
        &self,
        path: &OsStr,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: utimens {}", full.display());
        nix::sys::stat::utimensat(
            None,
            &full,
            &to_timespec(atime),
            &to_timespec(mtime),
            UtimensatFlags::FollowSymlink,
        )?;
        Ok(())
    }

    async fn readlink(&self, path: &OsStr) -> Result<OsString> {
        let full = self.get_path(path);
        trace!("loopback: readlink {}", full.display());
        Ok(std::fs::read_link(&full)?.into_os_string())
    }

    async fn mknod(&self, path: &OsStr, mode: u32, rdev: u32) -> Result<()> {
        let full = self.get_path(path);
        trace!(
            "loopback: mknod {} mode={mode:#o} rdev={rdev}",
            full.display()
        );
        let kind = SFlag::from_bits_truncate(mode & libc::S_IFMT);
        let perm = Mode::from_bits_truncate(mode & !libc::S_IFMT);
        nix::sys::stat::mknod(&full, kind, perm, rdev as libc::dev_t)?;
        Ok(())
    }

    async fn symlink(&self, target: &OsStr, link_path: &OsStr) -> Result<()> {
        let link = self.get_path(link_path);
        trace!(
            "loopback: symlink {} -> {}",
            link.display(),
            Path::new(target).display()
        );
        std::os::unix::fs::symlink(target, &link)?;
        Ok(())
    }

    async fn link(&self, orig_path: &OsStr, new_path: &OsStr) -> Result<()> {
        let orig = self.get_path(orig_path);
        let new = self.get_path(new_path);
        trace!("loopback: link {} -> {}", new.display(), orig.display());
        std::fs::hard_link(&orig, &new)?;
        Ok(())
    }

    async fn access(&self, path: &OsStr, mask: u32) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: access {} mask={mask:#o}", full.display());
        nix::unistd::access(&full, AccessFlags::from_bits_truncate(mask as libc::c_int))?;
        Ok(())
    }

    async fn getxattr(&self, path: &OsStr, name: &OsStr) -> Result<Vec<u8>> {
        let full = self.get_path(path);
        trace!("loopback: getxattr {} {name:?}", full.display());
        Ok(xattr::getxattr(&full, name)?)
    }

    async fn listxattr(&self, path: &OsStr) -> Result<Vec<OsString>> {
        let full = self.get_path(path);
        trace!("loopback: listxattr {}", full.display());
        Ok(xattr::listxattr(&full)?)
    }

    async fn setxattr(&self, path: &OsStr, name: &OsStr, value: &[u8], flags: u32) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: setxattr {} {name:?}", full.display());
        xattr::setxattr(&full, name, value, flags)?;
        Ok(())
    }

    async fn removexattr(&self, path: &OsStr, name: &OsStr) -> Result<()> {
        let full = self.get_path(path);
        trace!("loopback: removexattr {} {name:?}", full.display());
        xattr::removexattr(&full, name)?;
        Ok(())
    }

    async fn statfs(&self, path: &OsStr) -> Result<StatFs> {
        let full = self.get_path(path);
        trace!("loopback: statfs {}", full.display());
        let st = nix::sys::statvfs::statvfs(&full)?;
        Ok(StatFs {
            blocks: st.blocks() as u64,
            bfree: st.blocks_free() as u64,
            bavail: st.blocks_available() as u64,
            files: st.files() as u64,
            ffree: st.files_free() as u64,
            bsize: st.block_size() as u32,
            namelen: st.name_max() as u32,
            frsize: st.fragment_size() as u32,
        })
    }
}
