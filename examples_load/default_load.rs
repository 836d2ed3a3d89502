use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use log_dispatch::init::init_tracing;
use log_dispatch::noop_sink::NoopSink;
use log_dispatch::Sink;

fn main() {
    let sink = Arc::new(NoopSink::default());
    init_tracing(sink.clone()).expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s), processed {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        sink.stats().processed
    );
}
