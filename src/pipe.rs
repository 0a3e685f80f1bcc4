// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

use std::{
    io,
    os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd},
};

use crate::{Error, Interface, Platform, Result};

/// An anonymous pipe carrying single-byte event signals.
#[derive(Debug)]
pub(crate) struct EventPipe {
    source: OwnedFd,
    sink: OwnedFd,
}

impl EventPipe {
    /// Allocate a new pipe.
    ///
    /// The read end is non-blocking: when several readers race for one
    /// signal, the losers get `WouldBlock` instead of hanging in `read(2)`.
    pub(crate) fn new() -> io::Result<Self> {
        let (source, sink) = Platform::pipe()?;

        set_nonblocking(source.as_fd())?;

        Ok(Self { source, sink })
    }

    /// The read end
    pub(crate) fn source(&self) -> BorrowedFd<'_> {
        self.source.as_fd()
    }

    /// The write end
    pub(crate) fn sink(&self) -> BorrowedFd<'_> {
        self.sink.as_fd()
    }

    /// Split into `(source, sink)`.
    pub(crate) fn into_parts(self) -> (OwnedFd, OwnedFd) {
        (self.source, self.sink)
    }

    /// Release both ends, the sink even if releasing the source failed.
    pub(crate) fn close(self) -> Result<()> {
        let source = release(self.source);
        let sink = release(self.sink);

        close_result(source, sink)
    }
}

/// Fold the outcome of releasing both ends into one result.
///
/// The source failure is reported first; a sink failure alongside it is kept
/// in [`Error::CloseSource`].
fn close_result(source: io::Result<()>, sink: io::Result<()>) -> Result<()> {
    match (source, sink) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(source), sink) => {
            log::warn!("failed to release event source: {source}");
            let sink = sink.err();
            if let Some(ref err) = sink {
                log::warn!("failed to release event sink: {err}");
            }
            Err(Error::CloseSource { source, sink })
        }
        (Ok(()), Err(sink)) => {
            log::warn!("failed to release event sink: {sink}");
            Err(Error::CloseSink(sink))
        }
    }
}

/// Write one signal byte.
pub(crate) fn send(fd: BorrowedFd<'_>, signal: u8) -> io::Result<()> {
    let buf = [signal];
    // This C FFI call is safe because `fd` is borrowed open for the call and
    // `buf` is a live one-byte buffer.
    let ret = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), 1) };

    match ret {
        1 => Ok(()),
        0 => Err(io::ErrorKind::WriteZero.into()),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Read one signal byte.
pub(crate) fn recv(fd: BorrowedFd<'_>) -> io::Result<u8> {
    let mut buf = [0u8];
    // This C FFI call is safe because `fd` is borrowed open for the call and
    // `buf` is a live, writable one-byte buffer.
    let ret = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), 1) };

    match ret {
        1 => Ok(buf[0]),
        0 => Err(io::ErrorKind::UnexpectedEof.into()),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Put a descriptor's open file description into non-blocking mode.
fn set_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
    let fd = fd.as_raw_fd();

    // These C FFI calls are safe because `fcntl` only reads and sets status
    // flags of a descriptor that is borrowed open for the call.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Close a descriptor, reporting the failure that dropping would ignore.
fn release(fd: OwnedFd) -> io::Result<()> {
    let fd = fd.into_raw_fd();

    // This C FFI call is safe because ownership of `fd` was just taken out
    // of the `OwnedFd`, so nothing else closes it.  The descriptor is gone
    // after this call, whatever it returns.
    if unsafe { libc::close(fd) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_passes_through() {
        let pipe = EventPipe::new().unwrap();

        send(pipe.sink(), 0x5a).unwrap();
        assert_eq!(recv(pipe.source()).unwrap(), 0x5a);
        pipe.close().unwrap();
    }

    #[test]
    fn signals_keep_order() {
        let pipe = EventPipe::new().unwrap();

        for signal in 1..=4 {
            send(pipe.sink(), signal).unwrap();
        }
        for signal in 1..=4 {
            assert_eq!(recv(pipe.source()).unwrap(), signal);
        }
    }

    #[test]
    fn recv_after_writer_gone_is_eof() {
        let EventPipe { source, sink } = EventPipe::new().unwrap();

        release(sink).unwrap();

        let err = recv(source.as_fd()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn send_after_reader_gone_fails() {
        let EventPipe { source, sink } = EventPipe::new().unwrap();

        release(source).unwrap();

        // Rust ignores SIGPIPE, so the write reports EPIPE.
        let err = send(sink.as_fd(), 1).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPIPE));
    }

    #[test]
    fn recv_on_empty_source_does_not_block() {
        let pipe = EventPipe::new().unwrap();

        let err = recv(pipe.source()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn sink_stays_blocking() {
        let pipe = EventPipe::new().unwrap();
        // This C FFI call is safe because it only reads the status flags.
        let flags = unsafe { libc::fcntl(pipe.sink().as_raw_fd(), libc::F_GETFL) };

        assert_eq!(flags & libc::O_NONBLOCK, 0);
    }

    fn bad_fd() -> io::Error {
        io::Error::from_raw_os_error(libc::EBADF)
    }

    #[test]
    fn close_result_both_released() {
        assert!(close_result(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn close_result_source_failed() {
        match close_result(Err(bad_fd()), Ok(())) {
            Err(Error::CloseSource { source, sink }) => {
                assert_eq!(source.raw_os_error(), Some(libc::EBADF));
                assert!(sink.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn close_result_sink_failed() {
        let err = io::Error::from_raw_os_error(libc::EIO);

        match close_result(Ok(()), Err(err)) {
            Err(Error::CloseSink(sink)) => {
                assert_eq!(sink.raw_os_error(), Some(libc::EIO));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn close_result_both_failed_keeps_sink_error() {
        let sink = io::Error::from_raw_os_error(libc::EIO);

        match close_result(Err(bad_fd()), Err(sink)) {
            Err(Error::CloseSource { source, sink }) => {
                assert_eq!(source.raw_os_error(), Some(libc::EBADF));
                let sink = sink.expect("sink failure was dropped");
                assert_eq!(sink.raw_os_error(), Some(libc::EIO));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
