use std::{sync::mpsc, thread, time::Duration};

use fake_monitor::{FakeMonitor, Monitor, MonitorObserver};

/// Something under test: counts the devices a monitor reports.
fn count_hotplugs<M>(monitor: M, expected: usize) -> usize
where
    M: Monitor + Send + 'static,
    M::Device: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let observer = MonitorObserver::spawn(monitor, move |device| {
        let _ = sender.send(device);
    })
    .unwrap();

    let count = receiver.iter().take(expected).count();
    observer.stop().unwrap().close().unwrap();
    count
}

fn main() {
    let monitor = FakeMonitor::new("/devices/pci0000:00/usb1/1-1").unwrap();
    let trigger = monitor.trigger_handle().unwrap();

    thread::spawn(move || {
        for _ in 0..3 {
            thread::sleep(Duration::from_millis(100));
            trigger.trigger().unwrap();
        }
    });

    println!("Saw {} hotplug event(s)", count_hotplugs(monitor, 3));
}
