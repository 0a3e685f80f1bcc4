// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

use std::{
    fmt,
    os::fd::{AsRawFd, RawFd},
    sync::{Arc, Mutex, PoisonError},
    task::Waker,
    time::Duration,
};

use pasts::prelude::*;

use crate::{Interface, Monitor, Platform, Result};

/// Waker slot, woken by the platform when the watched descriptor is ready
#[derive(Debug, Default)]
pub(crate) struct Wake(Mutex<Option<Waker>>);

impl Wake {
    /// Replace the stored waker, unless it would wake the same task.
    pub(crate) fn register(&self, waker: &Waker) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        match *slot {
            Some(ref old) if old.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    /// Wake the registered task, if any.
    pub(crate) fn wake(&self) {
        let waker = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Unregisters the descriptor on drop
#[derive(Debug)]
struct Registration {
    fd: RawFd,
    wake: Arc<Wake>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        Platform::unwatch(self.fd);
    }
}

/// Asynchronous notifier over a [`Monitor`].
///
/// Each [`Notify::poll_next()`] yields the next device.  The monitor's
/// descriptor is watched by one shared thread per process, which wakes the
/// task when the monitor becomes readable.
///
/// Only supported on Linux; elsewhere [`Watcher::new()`] returns
/// [`Error::Unsupported`](crate::Error::Unsupported).
pub struct Watcher<M: Monitor> {
    // Declared first so it is dropped before the monitor's descriptor.
    registration: Registration,
    monitor: M,
}

impl<M: Monitor> fmt::Debug for Watcher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("fd", &self.registration.fd)
            .finish_non_exhaustive()
    }
}

impl<M: Monitor> Watcher<M> {
    /// Start watching `monitor` for events.
    pub fn new(monitor: M) -> Result<Self> {
        let wake = Arc::new(Wake::default());
        let fd = monitor.as_fd().as_raw_fd();

        Platform::watch(monitor.as_fd(), wake.clone())?;
        log::debug!("watching monitor on fd {fd}");

        Ok(Self {
            registration: Registration { fd, wake },
            monitor,
        })
    }

    /// The watched monitor
    pub fn get_ref(&self) -> &M {
        &self.monitor
    }

    /// Stop watching and give back the monitor.
    pub fn into_inner(self) -> M {
        let Self {
            registration,
            monitor,
        } = self;

        drop(registration);
        monitor
    }
}

impl<M: Monitor + Unpin> Notify for Watcher<M> {
    type Event = Result<M::Device>;

    fn poll_next(
        self: Pin<&mut Self>,
        task: &mut Task<'_>,
    ) -> Poll<Self::Event> {
        let this = self.get_mut();

        // Register before checking, so an event landing in between still
        // wakes this task.
        this.registration.wake.register(task.waker());

        match this.monitor.poll(Some(Duration::ZERO)) {
            Ok(Some(device)) => Ready(Ok(device)),
            Ok(None) => Pending,
            Err(err) => Ready(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl std::task::Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wakes_registered_task_once() {
        let counter = Arc::new(Counter::default());
        let waker = Waker::from(counter.clone());
        let wake = Wake::default();

        wake.wake();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        wake.register(&waker);
        wake.register(&waker);
        wake.wake();
        wake.wake();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn register_replaces_other_task() {
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        let wake = Wake::default();

        wake.register(&Waker::from(first.clone()));
        wake.register(&Waker::from(second.clone()));
        wake.wake();

        assert_eq!(first.0.load(Ordering::SeqCst), 0);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
    }
}
