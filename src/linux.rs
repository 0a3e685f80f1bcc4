// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

use std::{
    collections::{hash_map::Entry, HashMap},
    io,
    os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
    ptr,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    thread,
};

use crate::{watcher::Wake, Error, Interface, Platform, Result};

type Wakers = Mutex<HashMap<RawFd, Arc<Wake>>>;

/// Events pulled out of the kernel per `epoll_wait()`
const BATCH: usize = 16;

impl Interface for Platform {
    fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds: [RawFd; 2] = [-1; 2];

        // This C FFI call is safe because `fds` is a live, writable array of
        // the two descriptors `pipe2` fills in.
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }

        let [source, sink] = fds;

        // This is safe because both descriptors were just created and belong
        // to nobody else.
        Ok(unsafe { (OwnedFd::from_raw_fd(source), OwnedFd::from_raw_fd(sink)) })
    }

    fn watch(fd: BorrowedFd<'_>, wake: Arc<Wake>) -> Result<()> {
        let state = state()?;
        let fd = fd.as_raw_fd();
        let mut event = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLET) as u32,
            u64: fd as u64,
        };

        // Insert first, an event may arrive as soon as the fd is added.
        match state.lock().entry(fd) {
            Entry::Occupied(_) => {
                log::warn!("fd {fd} is already watched");
                let err = io::Error::from_raw_os_error(libc::EEXIST);
                return Err(Error::Wait(err));
            }
            Entry::Vacant(entry) => {
                entry.insert(wake);
            }
        }

        // This C FFI call is safe because the epoll descriptor lives in a
        // static and `event` is a live, initialized `epoll_event`.
        let ret = unsafe {
            libc::epoll_ctl(
                state.epoll.as_raw_fd(),
                libc::EPOLL_CTL_ADD,
                fd,
                &mut event,
            )
        };

        if ret < 0 {
            let err = io::Error::last_os_error();
            state.lock().remove(&fd);
            return Err(Error::Wait(err));
        }

        Ok(())
    }

    fn unwatch(fd: RawFd) {
        let Ok(state) = state() else {
            return;
        };
        // This C FFI call is safe because the epoll descriptor lives in a
        // static, and `EPOLL_CTL_DEL` ignores the event pointer.
        let ret = unsafe {
            libc::epoll_ctl(
                state.epoll.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                fd,
                ptr::null_mut(),
            )
        };

        if ret < 0 {
            log::warn!(
                "failed to unwatch fd {fd}: {}",
                io::Error::last_os_error(),
            );
        }
        state.lock().remove(&fd);
    }
}

/// The process-wide epoll instance and its wake thread
struct State {
    epoll: OwnedFd,
    wakers: Arc<Wakers>,
}

impl State {
    fn start() -> io::Result<Self> {
        // This C FFI call is safe because it takes no pointers.
        let epoll = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };

        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        // This is safe because the descriptor was just created and belongs to
        // nobody else.
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };
        let wakers = Arc::<Wakers>::default();
        let thread_wakers = wakers.clone();
        let thread_epoll = epoll.as_raw_fd();

        // The epoll descriptor lives in a static, so it outlives the thread.
        thread::Builder::new()
            .name("monitor-watcher".to_string())
            .spawn(move || wake_loop(thread_epoll, &thread_wakers))?;

        log::debug!("started watcher thread on epoll fd {thread_epoll}");

        Ok(Self { epoll, wakers })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RawFd, Arc<Wake>>> {
        self.wakers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn state() -> Result<&'static State> {
    static STATE: OnceLock<Result<State, i32>> = OnceLock::new();

    let state = STATE.get_or_init(|| {
        State::start().map_err(|err| err.raw_os_error().unwrap_or(libc::EIO))
    });

    match state {
        Ok(state) => Ok(state),
        Err(code) => Err(Error::Wait(io::Error::from_raw_os_error(*code))),
    }
}

/// Wait for events, restarting when interrupted.
fn wait(epoll: RawFd, events: &mut [libc::epoll_event]) -> io::Result<usize> {
    let max = libc::c_int::try_from(events.len()).unwrap_or(libc::c_int::MAX);

    loop {
        // This C FFI call is safe because `events` is a live, writable slice
        // of at least `max` entries for the duration of the call.
        let ret = unsafe { libc::epoll_wait(epoll, events.as_mut_ptr(), max, -1) };

        if let Ok(count) = usize::try_from(ret) {
            return Ok(count);
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn wake_loop(epoll: RawFd, wakers: &Wakers) {
    let mut events = [libc::epoll_event { events: 0, u64: 0 }; BATCH];

    loop {
        let count = match wait(epoll, &mut events) {
            Ok(count) => count,
            Err(err) => {
                log::warn!("watcher thread exiting, epoll_wait failed: {err}");
                return;
            }
        };

        let woken: Vec<Arc<Wake>> = {
            let wakers = wakers.lock().unwrap_or_else(PoisonError::into_inner);

            events[..count]
                .iter()
                .filter_map(|event| {
                    let fd = event.u64 as RawFd;
                    wakers.get(&fd).cloned()
                })
                .collect()
        };

        for wake in woken {
            wake.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc,
        },
        task::Waker,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::pipe::{self, EventPipe};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl std::task::Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn second_watch_keeps_first_registration() {
        let pipe = EventPipe::new().unwrap();
        let counter = Arc::new(Counter::default());
        let first = Arc::new(Wake::default());
        first.register(&Waker::from(counter.clone()));

        Platform::watch(pipe.source(), first).unwrap();
        let err = Platform::watch(pipe.source(), Arc::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Wait(ref e) if e.raw_os_error() == Some(libc::EEXIST)
        ));

        pipe::send(pipe.sink(), 1).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.0.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        Platform::unwatch(pipe.source().as_raw_fd());

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wake_loop_exits_on_bad_epoll_fd() {
        let pipe = EventPipe::new().unwrap();
        let fd = pipe.source().as_raw_fd();
        let (sender, receiver) = mpsc::channel();

        // A pipe is not an epoll instance, so `epoll_wait` fails with EINVAL.
        thread::spawn(move || {
            wake_loop(fd, &Wakers::default());
            sender.send(()).unwrap();
        });

        receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
