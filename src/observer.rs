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
    os::fd::{AsFd, OwnedFd},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    pipe::{self, EventPipe},
    ready, Error, Monitor, Result,
};

const DEFAULT_NAME: &str = "monitor-observer";

/// Builder for [`MonitorObserver`].
#[derive(Debug, Clone, Default)]
pub struct ObserverBuilder {
    name: Option<String>,
}

impl ObserverBuilder {
    /// Create a builder with the default thread name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the observer thread
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Start `monitor` and hand every device it receives to `callback` on a
    /// new thread.
    pub fn spawn<M, F>(
        self,
        mut monitor: M,
        callback: F,
    ) -> Result<MonitorObserver<M>>
    where
        M: Monitor + Send + 'static,
        F: FnMut(M::Device) + Send + 'static,
    {
        let (stop, sink) = EventPipe::new().map_err(Error::Pipe)?.into_parts();
        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());

        monitor.start()?;

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || observe(monitor, stop, callback))
            .map_err(Error::Spawn)?;

        log::debug!("spawned observer thread {name:?}");

        Ok(MonitorObserver {
            thread: Some(thread),
            sink,
            name,
        })
    }
}

/// Forwards a monitor's devices to a callback from a background thread.
///
/// ```rust
/// use std::sync::mpsc;
///
/// use fake_monitor::{FakeMonitor, Monitor, MonitorObserver};
///
/// let monitor = FakeMonitor::new("input0").unwrap();
/// let trigger = monitor.trigger_handle().unwrap();
/// let (sender, receiver) = mpsc::channel();
/// let observer = MonitorObserver::spawn(monitor, move |device| {
///     sender.send(device).unwrap();
/// })
/// .unwrap();
///
/// trigger.trigger().unwrap();
/// assert_eq!(receiver.recv().unwrap(), "input0");
///
/// let monitor = observer.stop().unwrap();
/// assert!(monitor.started());
/// monitor.close().unwrap();
/// ```
pub struct MonitorObserver<M> {
    thread: Option<JoinHandle<Result<M>>>,
    sink: OwnedFd,
    name: String,
}

impl<M> fmt::Debug for MonitorObserver<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorObserver")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl<M: Monitor + Send + 'static> MonitorObserver<M> {
    /// Spawn an observer with the default configuration.
    ///
    /// See [`ObserverBuilder::spawn()`].
    pub fn spawn<F>(monitor: M, callback: F) -> Result<Self>
    where
        F: FnMut(M::Device) + Send + 'static,
    {
        ObserverBuilder::new().spawn(monitor, callback)
    }
}

impl<M> MonitorObserver<M> {
    /// Returns true until the observer thread has exited.
    ///
    /// The thread exits on [`MonitorObserver::stop()`] or on the first
    /// monitor error.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map_or(false, |thread| !thread.is_finished())
    }

    /// Stop the observer thread and give back its monitor.
    ///
    /// Returns the error that ended the thread early, if one did.
    pub fn stop(mut self) -> Result<M> {
        self.halt().unwrap_or(Err(Error::ObserverPanicked))
    }

    fn halt(&mut self) -> Option<Result<M>> {
        let thread = self.thread.take()?;

        // If the thread already ended, the stop end is closed; join tells why.
        if let Err(err) = pipe::send(self.sink.as_fd(), 1) {
            log::trace!("observer {:?} already gone: {err}", self.name);
        }

        let result = match thread.join() {
            Ok(result) => result,
            Err(_) => Err(Error::ObserverPanicked),
        };

        log::debug!("stopped observer thread {:?}", self.name);
        Some(result)
    }
}

impl<M> Drop for MonitorObserver<M> {
    fn drop(&mut self) {
        if let Some(Err(err)) = self.halt() {
            log::warn!("observer {:?} ended with error: {err}", self.name);
        }
    }
}

fn observe<M, F>(monitor: M, stop: OwnedFd, mut callback: F) -> Result<M>
where
    M: Monitor,
    F: FnMut(M::Device),
{
    loop {
        let fds = [monitor.as_fd(), stop.as_fd()];
        let ready = ready::wait_readable(&fds, None).map_err(Error::Wait)?;

        if ready.contains(&1) {
            break;
        }
        if ready.contains(&0) {
            match monitor.poll(Some(Duration::ZERO)) {
                Ok(Some(device)) => callback(device),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("observer stopping on monitor error: {err}");
                    return Err(err);
                }
            }
        }
    }

    Ok(monitor)
}
