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
    os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd},
    time::Duration,
};

use crate::{
    pipe::{self, EventPipe},
    ready, Error, Monitor, Result,
};

/// Byte written for every triggered event unless configured otherwise
const DEFAULT_SIGNAL: u8 = 0x01;

/// A fake [`Monitor`] which emits the same device on every triggered event.
///
/// Events travel through a real pipe, so the monitor can be waited on with
/// `poll(2)`, `select(2)`, epoll or anything else that takes a descriptor.
///
/// ```rust
/// use std::time::Duration;
///
/// use fake_monitor::{FakeMonitor, Monitor};
///
/// let monitor = FakeMonitor::new("/sys/devices/platform").unwrap();
///
/// assert_eq!(monitor.poll(Some(Duration::ZERO)).unwrap(), None);
/// monitor.trigger().unwrap();
/// assert_eq!(monitor.poll(None).unwrap(), Some("/sys/devices/platform"));
/// ```
#[derive(Debug)]
pub struct FakeMonitor<D> {
    pipe: EventPipe,
    device: D,
    signal: u8,
    started: bool,
}

impl<D> FakeMonitor<D> {
    /// Create a fake monitor emitting `device`.
    pub fn new(device: D) -> Result<Self> {
        Self::builder(device).build()
    }

    /// Get a builder for a [`FakeMonitor`] emitting `device`.
    pub fn builder(device: D) -> FakeMonitorBuilder<D> {
        FakeMonitorBuilder {
            device,
            signal: DEFAULT_SIGNAL,
        }
    }

    /// Trigger an event on clients of this monitor.
    pub fn trigger(&self) -> Result<()> {
        log::trace!("triggering event on fd {}", self.as_raw_fd());
        pipe::send(self.pipe.sink(), self.signal).map_err(Error::Trigger)
    }

    /// Get a handle that can trigger events from another thread.
    ///
    /// The handle owns its own copy of the write end, so it stays usable
    /// while this monitor is blocked in [`Monitor::poll()`].
    pub fn trigger_handle(&self) -> Result<Trigger> {
        let sink = self.pipe.sink().try_clone_to_owned().map_err(Error::Pipe)?;

        Ok(Trigger {
            sink,
            signal: self.signal,
        })
    }

    /// The device emitted on every event
    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: Clone> FakeMonitor<D> {
    /// Consume one pending signal, if another reader didn't get it first.
    fn take_event(&self) -> Result<Option<D>> {
        // The signal's value carries no information.
        match pipe::recv(self.pipe.source()) {
            Ok(_signal) => Ok(Some(self.device.clone())),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                log::trace!("event on fd {} taken by another reader", self.as_raw_fd());
                Ok(None)
            }
            Err(err) => Err(Error::Read(err)),
        }
    }
}

impl<D> AsFd for FakeMonitor<D> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.pipe.source()
    }
}

impl<D> AsRawFd for FakeMonitor<D> {
    fn as_raw_fd(&self) -> RawFd {
        self.pipe.source().as_raw_fd()
    }
}

impl<D: Clone> Monitor for FakeMonitor<D> {
    type Device = D;

    fn start(&mut self) -> Result<()> {
        if !self.started {
            log::debug!("starting fake monitor on fd {}", self.as_raw_fd());
        }
        self.started = true;
        Ok(())
    }

    fn started(&self) -> bool {
        self.started
    }

    fn filter_by(
        &mut self,
        subsystem: &str,
        device_type: Option<&str>,
    ) -> Result<()> {
        log::trace!("ignoring filter {subsystem:?}/{device_type:?}");
        Ok(())
    }

    fn filter_by_tag(&mut self, tag: &str) -> Result<()> {
        log::trace!("ignoring tag filter {tag:?}");
        Ok(())
    }

    fn remove_filter(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_receive_buffer_size(&mut self, size: usize) -> Result<()> {
        log::trace!("ignoring receive buffer size {size}");
        Ok(())
    }

    fn poll(&self, timeout: Option<Duration>) -> Result<Option<D>> {
        let source = self.pipe.source();
        let ready =
            ready::wait_readable(&[source], timeout).map_err(Error::Wait)?;

        if ready.is_empty() {
            log::trace!("no event on fd {} within {timeout:?}", self.as_raw_fd());
            return Ok(None);
        }

        self.take_event()
    }

    fn close(self) -> Result<()> {
        log::debug!("closing fake monitor on fd {}", self.as_raw_fd());
        self.pipe.close()
    }
}

/// Builder for [`FakeMonitor`].
#[derive(Debug)]
pub struct FakeMonitorBuilder<D> {
    device: D,
    signal: u8,
}

impl<D> FakeMonitorBuilder<D> {
    /// Byte written into the pipe for every triggered event
    pub fn signal(mut self, signal: u8) -> Self {
        self.signal = signal;
        self
    }

    /// Finish building the [`FakeMonitor`], allocating its pipe.
    pub fn build(self) -> Result<FakeMonitor<D>> {
        let pipe = EventPipe::new().map_err(Error::Pipe)?;

        log::debug!(
            "created fake monitor (source fd {}, sink fd {})",
            pipe.source().as_raw_fd(),
            pipe.sink().as_raw_fd(),
        );

        Ok(FakeMonitor {
            pipe,
            device: self.device,
            signal: self.signal,
            started: false,
        })
    }
}

/// Triggers events on a [`FakeMonitor`] from anywhere.
///
/// Created with [`FakeMonitor::trigger_handle()`].
#[derive(Debug)]
pub struct Trigger {
    sink: OwnedFd,
    signal: u8,
}

impl Trigger {
    /// Trigger an event on clients of the monitor.
    pub fn trigger(&self) -> Result<()> {
        pipe::send(self.sink.as_fd(), self.signal).map_err(Error::Trigger)
    }
}
