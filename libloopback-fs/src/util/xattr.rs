//! Extended attribute primitives. Symlinks in the path are followed, as the
//! plain `*xattr(2)` calls do.

use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use super::{cstr, cvt};

pub(crate) fn getxattr(path: &Path, name: &OsStr) -> io::Result<Vec<u8>> {
    let path = cstr(path)?;
    let name = cstr(name)?;
    loop {
        let size = cvt(unsafe {
            libc::getxattr(path.as_ptr(), name.as_ptr(), std::ptr::null_mut(), 0)
        })?;
        let mut buf = vec![0u8; size as usize];
        match cvt(unsafe {
            libc::getxattr(
                path.as_ptr(),
                name.as_ptr(),
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        }) {
            Ok(n) => {
                buf.truncate(n as usize);
                return Ok(buf);
            }
            // value grew between the two calls
            Err(e) if e.raw_os_error() == Some(libc::ERANGE) => continue,
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn listxattr(path: &Path) -> io::Result<Vec<OsString>> {
    let path = cstr(path)?;
    loop {
        let size = cvt(unsafe { libc::listxattr(path.as_ptr(), std::ptr::null_mut(), 0) })?;
        let mut buf = vec![0u8; size as usize];
        match cvt(unsafe { libc::listxattr(path.as_ptr(), buf.as_mut_ptr().cast(), buf.len()) }) {
            Ok(n) => {
                buf.truncate(n as usize);
                return Ok(split_names(&buf));
            }
            Err(e) if e.raw_os_error() == Some(libc::ERANGE) => continue,
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn setxattr(path: &Path, name: &OsStr, value: &[u8], flags: u32) -> io::Result<()> {
    let path = cstr(path)?;
    let name = cstr(name)?;
    cvt(unsafe {
        libc::setxattr(
            path.as_ptr(),
            name.as_ptr(),
            value.as_ptr().cast(),
            value.len(),
            flags as libc::c_int,
        )
    })?;
    Ok(())
}

pub(crate) fn removexattr(path: &Path, name: &OsStr) -> io::Result<()> {
    let path = cstr(path)?;
    let name = cstr(name)?;
    cvt(unsafe { libc::removexattr(path.as_ptr(), name.as_ptr()) })?;
    Ok(())
}

/// Splits the NUL-terminated name list returned by `listxattr(2)`.
fn split_names(buf: &[u8]) -> Vec<OsString> {
    buf.split(|b| *b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| OsStr::from_bytes(name).to_os_string())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_names() {
        let names = split_names(b"user.a\0security.selinux\0user.b\0");
        assert_eq!(
            names,
            vec![
                OsString::from("user.a"),
                OsString::from("security.selinux"),
                OsString::from("user.b"),
            ]
        );
        assert!(split_names(b"").is_empty());
    }

    #[test]
    fn test_getxattr_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = getxattr(&dir.path().join("nope"), OsStr::new("user.x")).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
