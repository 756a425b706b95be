use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;

use bitflags::bitflags;

bitflags! {
    /// Flags carried by an open or create request, in host `open(2)` encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: i32 {
        /// Open for writing only.
        const WRONLY = libc::O_WRONLY;
        /// Open for reading and writing.
        const RDWR = libc::O_RDWR;
        /// Every write goes to the end of the file.
        const APPEND = libc::O_APPEND;
        /// Create the file when it does not exist.
        const CREAT = libc::O_CREAT;
        /// Together with CREAT, fail when the file exists.
        const EXCL = libc::O_EXCL;
        /// Truncate an existing regular file to length 0.
        const TRUNC = libc::O_TRUNC;
        /// Do not follow a trailing symlink.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Fail unless the path is a directory.
        const DIRECTORY = libc::O_DIRECTORY;
        /// Writes complete with data and metadata durable.
        const SYNC = libc::O_SYNC;
        /// Writes complete with data durable.
        const DSYNC = libc::O_DSYNC;
        /// Non-blocking I/O.
        const NONBLOCK = libc::O_NONBLOCK;

        // Flags not named above are handed to the host untouched.
        const _ = !0;
    }
}

impl OpenFlags {
    pub fn from_request(flags: u32) -> Self {
        OpenFlags::from_bits_retain(flags as i32)
    }

    /// Builds `OpenOptions` that issue exactly these flags, with `mode` used
    /// when the call creates the file.
    pub fn to_open_options(self, mode: u32) -> io::Result<OpenOptions> {
        let mut opts = OpenOptions::new();
        match self.bits() & libc::O_ACCMODE {
            libc::O_RDONLY => opts.read(true),
            libc::O_WRONLY => opts.write(true),
            libc::O_RDWR => opts.read(true).write(true),
            _ => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
        };
        opts.custom_flags(self.bits() & !libc::O_ACCMODE).mode(mode);
        Ok(opts)
    }
}
