use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Outcome of a failed filesystem-service call.
///
/// Absence is reported as [`Status::NotFound`]; every other host failure keeps
/// its errno in [`Status::Io`]. Success is `Ok(..)`, end-of-file included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Status {
    #[error("no such file or directory")]
    NotFound,

    #[error("host I/O error: {0}")]
    Io(Errno),
}

pub type Result<T> = std::result::Result<T, Status>;

impl Status {
    /// The errno this status stands for on the wire.
    pub fn errno(&self) -> Errno {
        match self {
            Status::NotFound => Errno::ENOENT,
            Status::Io(errno) => *errno,
        }
    }

    pub fn raw_os_error(&self) -> i32 {
        self.errno() as i32
    }
}

impl From<Errno> for Status {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::ENOENT => Status::NotFound,
            other => Status::Io(other),
        }
    }
}

impl From<io::Error> for Status {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Errno::from_raw(code).into(),
            None if err.kind() == io::ErrorKind::NotFound => Status::NotFound,
            None => Status::Io(Errno::EIO),
        }
    }
}

impl From<Status> for io::Error {
    fn from(status: Status) -> Self {
        io::Error::from_raw_os_error(status.raw_os_error())
    }
}

impl From<Status> for rfuse3::Errno {
    fn from(status: Status) -> Self {
        status.raw_os_error().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_enoent_maps_to_not_found() {
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(Status::from(err), Status::NotFound);
        assert_eq!(Status::from(Errno::ENOENT), Status::NotFound);
    }

    #[test]
    fn test_other_errno_kept_lossless() {
        for code in [
            libc::EACCES,
            libc::EEXIST,
            libc::ENOTEMPTY,
            libc::EXDEV,
            libc::EISDIR,
            libc::ENODATA,
        ] {
            let status = Status::from(io::Error::from_raw_os_error(code));
            assert_eq!(status, Status::Io(Errno::from_raw(code)));
            assert_eq!(status.raw_os_error(), code);

            let back: io::Error = status.into();
            assert_eq!(back.raw_os_error(), Some(code));
        }
    }

    #[test]
    fn test_error_without_errno() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(Status::from(missing), Status::NotFound);

        let other = io::Error::other("synthetic");
        assert_eq!(Status::from(other), Status::Io(Errno::EIO));
    }

    #[test]
    fn test_into_fuse_errno() {
        let errno: rfuse3::Errno = Status::Io(Errno::ENOTEMPTY).into();
        let ioerr: io::Error = errno.into();
        assert_eq!(ioerr.raw_os_error(), Some(libc::ENOTEMPTY));

        let errno: rfuse3::Errno = Status::NotFound.into();
        let ioerr: io::Error = errno.into();
        assert_eq!(ioerr.raw_os_error(), Some(libc::ENOENT));
    }
}
