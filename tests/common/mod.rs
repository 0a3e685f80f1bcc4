// Copyright © 2026 The Fake Monitor Contributors.
//
// Licensed under any of:
//  - Apache License, Version 2.0 (https://www.apache.org/licenses/LICENSE-2.0)
//  - Boost Software License, Version 1.0 (https://www.boost.org/LICENSE_1_0.txt)
//  - MIT License (https://mit-license.org/)
// At your choosing (See accompanying files LICENSE_APACHE_2_0.txt,
// LICENSE_MIT.txt and LICENSE_BOOST_1_0.txt).

#![allow(dead_code)]

use fake_monitor::FakeMonitor;

/// The device every fixture monitor emits
pub const DEVICE: &str = "/devices/platform/serial8250/tty/ttyS0";

/// Install a test logger once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fake monitor emitting [`DEVICE`] on every triggered event.
pub fn monitor_fixture() -> FakeMonitor<&'static str> {
    init_logging();
    FakeMonitor::new(DEVICE).unwrap()
}
