// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

use std::io;

use thiserror::Error;

/// Result type for monitor operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by monitors, observers and watchers
///
/// A poll that times out is not an error, it returns `Ok(None)`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The event pipe could not be allocated
    #[error("failed to allocate event pipe: {0}")]
    Pipe(#[source] io::Error),

    /// Writing the event signal failed
    #[error("failed to write event signal: {0}")]
    Trigger(#[source] io::Error),

    /// The readiness wait failed
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),

    /// Consuming the event signal failed
    #[error("failed to read event signal: {0}")]
    Read(#[source] io::Error),

    /// Releasing the read end failed.
    ///
    /// The write end was still released; `sink` holds its failure, if any.
    #[error("failed to release event source: {source}")]
    CloseSource {
        /// Failure releasing the read end
        source: io::Error,
        /// Failure releasing the write end, attempted afterwards
        sink: Option<io::Error>,
    },

    /// Releasing the write end failed (the read end was released)
    #[error("failed to release event sink: {0}")]
    CloseSink(#[source] io::Error),

    /// The observer thread could not be spawned
    #[error("failed to spawn observer thread: {0}")]
    Spawn(#[source] io::Error),

    /// The observer thread panicked
    #[error("observer thread panicked")]
    ObserverPanicked,

    /// Async watching is not available on this platform
    #[error("async watching is not supported on this platform")]
    Unsupported,
}
