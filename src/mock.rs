// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

//! Unix targets without epoll: pipes work, async watching doesn't.

use std::{
    io,
    os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
    sync::Arc,
};

use crate::{watcher::Wake, Error, Interface, Platform, Result};

impl Interface for Platform {
    fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds: [RawFd; 2] = [-1; 2];

        // This C FFI call is safe because `fds` is a live, writable array of
        // the two descriptors `pipe` fills in.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error());
        }

        let [source, sink] = fds;
        // This is safe because both descriptors were just created and belong
        // to nobody else.
        let (source, sink) =
            unsafe { (OwnedFd::from_raw_fd(source), OwnedFd::from_raw_fd(sink)) };

        for fd in [&source, &sink] {
            // This C FFI call is safe because `fcntl` only sets a descriptor
            // flag on a descriptor owned by this function.
            let ret = unsafe {
                libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC)
            };
            if ret < 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok((source, sink))
    }

    fn watch(fd: BorrowedFd<'_>, _wake: Arc<Wake>) -> Result<()> {
        log::warn!("cannot watch fd {}: no epoll", fd.as_raw_fd());
        Err(Error::Unsupported)
    }

    fn unwatch(_fd: RawFd) {}
}
