use std::ffi::OsString;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

use rfuse3::FileType;
use rfuse3::raw::reply::{FileAttr, ReplyStatFs};
use rfuse3::Timestamp;

use crate::util::time::system_time_from;

/// Metadata snapshot of a host node, taken at query time and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr {
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: i64,
    pub atime_nsec: u32,
    pub mtime: i64,
    pub mtime_nsec: u32,
    pub ctime: i64,
    pub ctime_nsec: u32,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub blksize: u32,
}

impl From<&Metadata> for Attr {
    fn from(md: &Metadata) -> Self {
        Attr {
            ino: md.ino(),
            size: md.size(),
            blocks: md.blocks(),
            atime: md.atime(),
            atime_nsec: md.atime_nsec() as u32,
            mtime: md.mtime(),
            mtime_nsec: md.mtime_nsec() as u32,
            ctime: md.ctime(),
            ctime_nsec: md.ctime_nsec() as u32,
            mode: md.mode(),
            nlink: md.nlink() as u32,
            uid: md.uid(),
            gid: md.gid(),
            rdev: md.rdev(),
            blksize: md.blksize() as u32,
        }
    }
}

impl Attr {
    pub fn kind(&self) -> FileType {
        file_type_from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }

    /// Permission bits, without the file type.
    pub fn perm(&self) -> u16 {
        (self.mode & 0o7777) as u16
    }

    /// Builds the attribute reply the FUSE protocol layer sends to the kernel.
    pub fn to_fuse_attr(&self) -> FileAttr {
        let atime = Timestamp::from(system_time_from(self.atime, self.atime_nsec));
        let mtime = Timestamp::from(system_time_from(self.mtime, self.mtime_nsec));
        let ctime = Timestamp::from(system_time_from(self.ctime, self.ctime_nsec));
        FileAttr {
            ino: self.ino,
            size: self.size,
            blocks: self.blocks,
            atime,
            mtime,
            ctime,
            #[cfg(target_os = "macos")]
            crtime: ctime,
            kind: self.kind(),
            perm: self.perm(),
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: self.rdev as u32,
            #[cfg(target_os = "macos")]
            flags: 0,
            blksize: self.blksize,
        }
    }
}

/// One name produced while listing a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    /// File type bits (`S_IFMT` subset) of the entry.
    pub mode: u32,
    pub ino: u64,
}

impl DirEntry {
    pub fn kind(&self) -> FileType {
        file_type_from_mode(self.mode)
    }
}

/// Host filesystem statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}

impl From<StatFs> for ReplyStatFs {
    fn from(st: StatFs) -> Self {
        ReplyStatFs {
            blocks: st.blocks,
            bfree: st.bfree,
            bavail: st.bavail,
            files: st.files,
            ffree: st.ffree,
            bsize: st.bsize,
            namelen: st.namelen,
            frsize: st.frsize,
        }
    }
}

pub(crate) fn file_type_from_mode(mode: u32) -> FileType {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        libc::S_IFCHR => FileType::CharDevice,
        libc::S_IFBLK => FileType::BlockDevice,
        libc::S_IFIFO => FileType::NamedPipe,
        libc::S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kind_from_mode() {
        let dir = Attr {
            mode: libc::S_IFDIR | 0o755,
            ..Default::default()
        };
        assert!(dir.is_dir());
        assert_eq!(dir.kind(), FileType::Directory);
        assert_eq!(dir.perm(), 0o755);

        let fifo = DirEntry {
            name: OsString::from("p"),
            mode: libc::S_IFIFO,
            ino: 7,
        };
        assert_eq!(fifo.kind(), FileType::NamedPipe);
        assert_eq!(file_type_from_mode(libc::S_IFREG | 0o644), FileType::RegularFile);
        assert_eq!(file_type_from_mode(libc::S_IFLNK), FileType::Symlink);
    }

    #[test]
    fn test_to_fuse_attr() {
        let attr = Attr {
            ino: 42,
            size: 4097,
            blocks: 16,
            atime: 1_700_000_000,
            atime_nsec: 5,
            mtime: 1_700_000_001,
            mtime_nsec: 6,
            ctime: 1_700_000_002,
            ctime_nsec: 7,
            mode: libc::S_IFREG | 0o640,
            nlink: 2,
            uid: 1000,
            gid: 100,
            rdev: 0,
            blksize: 4096,
        };
        let fattr = attr.to_fuse_attr();
        assert_eq!(fattr.ino, 42);
        assert_eq!(fattr.size, 4097);
        assert_eq!(fattr.kind, FileType::RegularFile);
        assert_eq!(fattr.perm, 0o640);
        assert_eq!(fattr.nlink, 2);
        assert_eq!(fattr.uid, 1000);
        assert_eq!(fattr.gid, 100);
        assert_eq!(fattr.blksize, 4096);
    }
}
