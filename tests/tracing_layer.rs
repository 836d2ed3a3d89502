#![cfg(feature = "layer")]

use log_dispatch::layer::SinkLayer;
use log_dispatch::stats::Stats;
use log_dispatch::{Level, LogRecord, Sink, Snapshot, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Default)]
struct Capture {
    records: Mutex<Vec<LogRecord>>,
    stats: Stats,
}

impl Sink for Capture {
    fn handle(&self, record: &LogRecord) -> log_dispatch::Result<()> {
        self.records.lock().push(record.clone());
        self.stats.record_processed();
        Ok(())
    }

    fn close(&self) -> log_dispatch::Result<()> {
        Ok(())
    }

    fn stats(&self) -> Snapshot {
        self.stats.snapshot()
    }
}

#[test]
fn events_become_records() {
    let capture = Arc::new(Capture::default());
    let layer = SinkLayer::new(capture.clone(), Level::Debug);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::trace!(attempt = 3u64, "retrying {}", "upstream");
        tracing::error!(code = -1i64, ratio = 0.25, fatal = false, "request failed");
    });

    let records = capture.records.lock();
    assert_eq!(records.len(), 2);

    let retry = &records[0];
    assert_eq!(retry.level, Level::Debug);
    assert_eq!(retry.message, "retrying upstream");
    assert!(matches!(retry.fields[0].value, Value::Int(3)));

    let failed = &records[1];
    assert_eq!(failed.level, Level::Error);
    assert_eq!(failed.message, "request failed");
    let keys: Vec<_> = failed.fields.iter().map(|f| f.key.as_ref()).collect();
    assert_eq!(keys, ["code", "ratio", "fatal", "target"]);
    let caller = failed.caller.as_ref().unwrap();
    assert_eq!(caller.short_file(), "tracing_layer.rs");
    assert!(caller.line > 0);
}

#[test]
fn min_level_filters_events() {
    let capture = Arc::new(Capture::default());
    let layer = SinkLayer::new(capture.clone(), Level::Warn).with_caller(false);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("dropped");
        tracing::warn!("kept");
    });

    let records = capture.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "kept");
    assert!(records[0].caller.is_none());
}
