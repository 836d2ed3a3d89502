use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use log_dispatch::destination::Destination;
use log_dispatch::init::init_tracing;
use log_dispatch::{Sink, SyncSink, TextFormatter};

/// Example of plugging in a completely custom output by implementing the
/// `Destination` trait. Imagine this talks to some proprietary store for
/// which this crate does not provide a built-in destination.
#[derive(Default)]
struct MyCustomStore {
    writes: AtomicU64,
}

impl Destination for MyCustomStore {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        // Here you would call your own client library.
        // For the sake of example we just print the bytes.
        self.writes.fetch_add(1, Ordering::Relaxed);
        print!("[my-custom-store] {}", String::from_utf8_lossy(buf));
        Ok(())
    }

    fn concurrent_safe(&self) -> bool {
        true
    }
}

fn main() {
    let store = Arc::new(MyCustomStore::default());
    let sink = Arc::new(SyncSink::from_parts(store.clone(), Arc::new(TextFormatter::default())));

    init_tracing(sink.clone()).expect("install subscriber");

    info!("custom destination example started");
    error!(store = "my-custom-store", "simulated error sent via custom destination");

    sink.close().expect("close sink");
    println!("writes: {}", store.writes.load(Ordering::Relaxed));
}
