use crate::destination::Destination;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SinkError};
use crate::field::Field;
use crate::format::Formatter;
use crate::level::Level;
use crate::record::{CallerInfo, LogRecord};
use crate::sink::Sink;
use crate::stats::Snapshot;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Formats and writes on the caller's thread.
///
/// Write errors go straight back to the caller; nothing is retried.
pub struct SyncSink {
    dispatcher: Dispatcher,
    closed: AtomicBool,
}

impl SyncSink {
    pub fn new<D, F>(destination: D, formatter: F) -> Self
    where
        D: Destination + 'static,
        F: Formatter + 'static,
    {
        SyncSink::from_parts(Arc::new(destination), Arc::new(formatter))
    }

    pub fn from_parts(destination: Arc<dyn Destination>, formatter: Arc<dyn Formatter>) -> Self {
        SyncSink {
            dispatcher: Dispatcher::new(destination, formatter),
            closed: AtomicBool::new(false),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.dispatcher.flush()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Sink for SyncSink {
    fn handle(&self, record: &LogRecord) -> Result<()> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.dispatcher.write(record)
    }

    fn handle_fast(
        &self,
        timestamp: DateTime<Utc>,
        level: Level,
        message: &str,
        context: &[Field],
        fields: &[Field],
        caller: Option<&CallerInfo>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.dispatcher
            .write_fast(timestamp, level, message, context, fields, caller)
    }

    fn has_fast_path(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.dispatcher.close()
    }

    fn stats(&self) -> Snapshot {
        self.dispatcher.stats().snapshot()
    }
}

impl fmt::Debug for SyncSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSink")
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{Discard, Exclusive};
    use crate::text::TextFormatter;
    use std::io;

    struct Broken;

    impl Destination for Broken {
        fn write_all(&self, _buf: &[u8]) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn concurrent_safe(&self) -> bool {
            true
        }
    }

    #[test]
    fn write_errors_reach_the_caller() {
        let sink = SyncSink::new(Broken, TextFormatter::default());
        let err = sink.handle(&LogRecord::new(Level::Info, "x")).unwrap_err();
        assert!(matches!(err, SinkError::Write(_)));
        assert_eq!(sink.stats().processed, 0);
        assert_eq!(sink.stats().failed, 1);
    }

    #[test]
    fn closed_sink_rejects_records() {
        let sink = SyncSink::new(Discard, TextFormatter::default());
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(matches!(
            sink.handle(&LogRecord::new(Level::Info, "late")),
            Err(SinkError::Closed)
        ));
        assert!(matches!(
            sink.handle_fast(Utc::now(), Level::Info, "late", &[], &[], None),
            Err(SinkError::Closed)
        ));
    }

    #[test]
    fn owned_records_are_written() {
        let dest = Arc::new(Exclusive::new(Vec::new()));
        let sink = SyncSink::from_parts(dest.clone(), Arc::new(TextFormatter::default()));
        let mut record = crate::record::acquire();
        record.level = Level::Warn;
        record.message.push_str("owned");
        sink.handle_owned(record).unwrap();
        assert!(dest.with(|buf| buf.ends_with(b"[WARN] owned\n")));
        assert_eq!(sink.stats().processed, 1);
    }
}
