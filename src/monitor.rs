// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

use std::{fmt, os::fd::AsFd, time::Duration};

use crate::Result;

/// A source of device-change notifications.
///
/// This is the shape of a udev monitor: something that can be started,
/// filtered, waited on through its file descriptor and polled for the next
/// device.  Code that only depends on this trait can be tested against a
/// [`FakeMonitor`](crate::FakeMonitor).
pub trait Monitor: AsFd {
    /// The device handed out for every event
    type Device;

    /// Start receiving events.
    fn start(&mut self) -> Result<()>;

    /// Returns true once [`Monitor::start()`] has been called.
    fn started(&self) -> bool;

    /// Only receive events for devices in `subsystem` (and `device_type`).
    fn filter_by(
        &mut self,
        subsystem: &str,
        device_type: Option<&str>,
    ) -> Result<()>;

    /// Only receive events for devices carrying `tag`.
    fn filter_by_tag(&mut self, tag: &str) -> Result<()>;

    /// Drop all installed filters.
    fn remove_filter(&mut self) -> Result<()>;

    /// Set the receive buffer size of the underlying socket.
    fn set_receive_buffer_size(&mut self, size: usize) -> Result<()>;

    /// Wait up to `timeout` for the next device.
    ///
    /// `None` waits indefinitely, `Some(Duration::ZERO)` returns right away.
    /// Returns `Ok(None)` if the timeout elapsed without an event.
    fn poll(&self, timeout: Option<Duration>) -> Result<Option<Self::Device>>;

    /// Block until the next device arrives.
    fn receive_device(&self) -> Result<Self::Device> {
        loop {
            if let Some(device) = self.poll(None)? {
                return Ok(device);
            }
        }
    }

    /// Iterate over incoming devices, blocking for each one.
    ///
    /// The iterator never ends on its own; errors are yielded and the
    /// caller decides whether to keep going.
    fn iter(&self) -> Iter<'_, Self>
    where
        Self: Sized,
    {
        Iter(self)
    }

    /// Release the monitor's resources.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Blocking iterator over a monitor's devices, see [`Monitor::iter()`].
pub struct Iter<'a, M: Monitor>(&'a M);

impl<M: Monitor> fmt::Debug for Iter<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").finish_non_exhaustive()
    }
}

impl<M: Monitor> Iterator for Iter<'_, M> {
    type Item = Result<M::Device>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.0.receive_device())
    }
}
