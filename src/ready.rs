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
    os::fd::{AsRawFd, BorrowedFd},
    time::{Duration, Instant},
};

/// Wait until at least one of `fds` is readable, or `timeout` elapses.
///
/// Returns the indices into `fds` that are ready, in order.  An empty list
/// means the timeout elapsed.  `None` waits indefinitely and
/// `Some(Duration::ZERO)` checks without blocking.
///
/// A descriptor whose writer has gone away counts as readable, so the caller
/// observes the end of the stream on its next read.  So does a descriptor in
/// an error state (`POLLERR`, `POLLNVAL`), whose next operation reports the
/// failure.  Interrupted waits are restarted with whatever is left of the
/// timeout.
///
/// ```rust
/// use std::{os::fd::AsFd, time::Duration};
///
/// use fake_monitor::{wait_readable, FakeMonitor};
///
/// let first = FakeMonitor::new("first").unwrap();
/// let second = FakeMonitor::new("second").unwrap();
///
/// second.trigger().unwrap();
///
/// let fds = [first.as_fd(), second.as_fd()];
/// let ready = wait_readable(&fds, Some(Duration::ZERO)).unwrap();
/// assert_eq!(ready, [1]);
/// ```
pub fn wait_readable(
    fds: &[BorrowedFd<'_>],
    timeout: Option<Duration>,
) -> io::Result<Vec<usize>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|fd| libc::pollfd {
            fd: fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

    loop {
        let remaining = match (timeout, deadline) {
            (None, _) => None,
            (Some(_), Some(deadline)) => {
                Some(deadline.saturating_duration_since(Instant::now()))
            }
            // Too far in the future to represent, treat as indefinite.
            (Some(_), None) => None,
        };
        // This C FFI call is safe because `pollfds` is a live, writable array
        // of exactly `pollfds.len()` entries for the duration of the call.
        let ret = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                millis(remaining),
            )
        };

        if ret >= 0 {
            break;
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
        log::trace!("readiness wait interrupted, restarting");
    }

    Ok(pollfds
        .iter()
        .enumerate()
        .filter(|(_, pollfd)| pollfd.revents & READY != 0)
        .map(|(index, _)| index)
        .collect())
}

/// Poll results that make the next operation on a descriptor return at once
const READY: libc::c_short =
    libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

/// Convert a timeout into `poll(2)` milliseconds.
fn millis(timeout: Option<Duration>) -> libc::c_int {
    let Some(timeout) = timeout else {
        return -1;
    };
    let millis = timeout.as_millis();

    if millis == 0 && !timeout.is_zero() {
        // Round up, or a short wait would turn into a busy check.
        1
    } else {
        millis.try_into().unwrap_or(libc::c_int::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsFd;

    use super::*;
    use crate::pipe::{self, EventPipe};

    #[test]
    fn timeout_conversion() {
        assert_eq!(millis(None), -1);
        assert_eq!(millis(Some(Duration::ZERO)), 0);
        assert_eq!(millis(Some(Duration::from_micros(10))), 1);
        assert_eq!(millis(Some(Duration::from_millis(250))), 250);
        assert_eq!(millis(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }

    #[test]
    fn nothing_ready_times_out() {
        let pipe = EventPipe::new().unwrap();
        let start = Instant::now();
        let ready =
            wait_readable(&[pipe.source()], Some(Duration::from_millis(20)))
                .unwrap();

        assert!(ready.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn reports_only_ready_sources() {
        let a = EventPipe::new().unwrap();
        let b = EventPipe::new().unwrap();
        let c = EventPipe::new().unwrap();

        pipe::send(a.sink(), 1).unwrap();
        pipe::send(c.sink(), 1).unwrap();

        let fds = [a.source(), b.source(), c.source()];
        let ready = wait_readable(&fds, Some(Duration::ZERO)).unwrap();
        assert_eq!(ready, [0, 2]);
    }

    #[test]
    fn hangup_counts_as_readable() {
        let pipe = EventPipe::new().unwrap();
        let source = pipe.source().try_clone_to_owned().unwrap();

        pipe.close().unwrap();

        let ready = wait_readable(&[source.as_fd()], Some(Duration::ZERO))
            .unwrap();
        assert_eq!(ready, [0]);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn error_state_counts_as_ready() {
        let (source, sink) = EventPipe::new().unwrap().into_parts();

        drop(source);

        // A write end without readers polls as POLLERR.
        let ready =
            wait_readable(&[sink.as_fd()], Some(Duration::ZERO)).unwrap();
        assert_eq!(ready, [0]);
    }

    #[test]
    fn empty_set_just_sleeps() {
        let ready = wait_readable(&[], Some(Duration::from_millis(1))).unwrap();

        assert!(ready.is_empty());
    }
}
