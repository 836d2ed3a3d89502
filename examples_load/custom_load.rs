use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

use log_dispatch::destination::Discard;
use log_dispatch::init::{init_tracing_with_config, LayerConfig};
use log_dispatch::{AsyncConfig, AsyncSink, JsonFormatter, Level, LevelPolicies, OverflowPolicy, Sink};

fn main() {
    let config = AsyncConfig {
        buffer_size: 50_000,
        max_batch: 1_000,
        drain_timeout: Duration::from_secs(2),
        policies: LevelPolicies::empty()
            .with(Level::Info, OverflowPolicy::DropOldest)
            .with(Level::Error, OverflowPolicy::Block(Duration::from_millis(5))),
        ..Default::default()
    };
    let sink = Arc::new(
        AsyncSink::new(Discard, JsonFormatter::default(), config).expect("start consumer"),
    );

    let layer_config = LayerConfig {
        min_level: Level::Info,
        include_caller: true,
        enable_stdout: false,
    };
    init_tracing_with_config(sink.clone(), layer_config).expect("install subscriber");

    let threads: u64 = 4;
    let per_thread: u64 = 25_000;
    let start = Instant::now();

    let producers: Vec<_> = (0..threads)
        .map(|t| {
            thread::spawn(move || {
                for i in 0..per_thread {
                    if i % 10 == 0 {
                        error!(thread = t, iteration = i, "custom load test error");
                    } else {
                        info!(thread = t, iteration = i, "custom load test info");
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    let elapsed = start.elapsed();
    sink.close().expect("drain queue");
    let stats = sink.stats();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        threads * per_thread,
        elapsed,
        (threads * per_thread) as f64 / elapsed.as_secs_f64()
    );
    println!("processed={} dropped={} blocked={}",
        stats.processed,
        stats.total_dropped(),
        stats.blocked
    );
}
