// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).
//
//! A fake udev-style device monitor for tests.
//!
//! [`FakeMonitor`] implements the complete [`Monitor`] interface on top of a
//! real anonymous pipe, so code built on a device monitor can be exercised
//! without privileged kernel events.  Every [`FakeMonitor::trigger()`] makes
//! the monitor readable, and the next [`Monitor::poll()`] hands back the
//! device the fake was built with.
//!
//! Because the fake owns a real file descriptor it can be handed to any
//! readiness wait, such as [`wait_readable()`], a [`MonitorObserver`] thread
//! or an async [`Watcher`].
//!
//! # Getting Started
//! ```rust,no_run
#![doc = include_str!("../demos/observer.rs")]
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications
)]

#[cfg(not(unix))]
compile_error!("fake_monitor requires a unix target");

mod error;
mod fake;
mod monitor;
mod observer;
mod pipe;
mod ready;
mod watcher;

#[cfg_attr(target_os = "linux", path = "linux.rs")]
#[cfg_attr(not(target_os = "linux"), path = "mock.rs")]
mod platform;

use std::{
    io,
    os::fd::{BorrowedFd, OwnedFd, RawFd},
    sync::Arc,
};

pub use self::{
    error::{Error, Result},
    fake::{FakeMonitor, FakeMonitorBuilder, Trigger},
    monitor::{Iter, Monitor},
    observer::{MonitorObserver, ObserverBuilder},
    ready::wait_readable,
    watcher::Watcher,
};

/// OS-specific operations
trait Interface {
    /// Create a close-on-exec anonymous pipe, returning `(read, write)`.
    fn pipe() -> io::Result<(OwnedFd, OwnedFd)>;

    /// Start waking `wake` whenever `fd` becomes readable.
    fn watch(fd: BorrowedFd<'_>, wake: Arc<watcher::Wake>) -> Result<()>;

    /// Stop waking for `fd`.  Must be called before `fd` is closed.
    fn unwatch(fd: RawFd);
}

/// The interface implementation for the target platform
#[derive(Debug, Copy, Clone)]
struct Platform;
