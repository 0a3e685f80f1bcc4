use std::{thread, time::Duration};

use async_main::{async_main, LocalSpawner};
use fake_monitor::{FakeMonitor, Watcher};
use pasts::prelude::*;

#[async_main]
async fn main(_spawner: LocalSpawner) {
    let monitor = FakeMonitor::new("/devices/virtual/input/input7").unwrap();
    let trigger = monitor.trigger_handle().unwrap();
    let mut watcher = Watcher::new(monitor).unwrap();

    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(1));
        if trigger.trigger().is_err() {
            break;
        }
    });

    for i in 0..5 {
        let device = watcher.next().await.unwrap();
        println!("Event {} from {device}", i + 1);
    }
}
