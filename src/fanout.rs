use crate::error::{Result, SinkError};
use crate::field::Field;
use crate::level::Level;
use crate::record::{self, CallerInfo, LogRecord};
use crate::sink::Sink;
use crate::stats::Snapshot;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Forwards every record to each child sink in order.
///
/// Children only ever borrow the record, so one shared record is built
/// per call and recycled afterwards. When every child has an
/// allocation-free fast path the record is not built at all.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn Sink>>,
    fast: bool,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        let fast = sinks.iter().all(|sink| sink.has_fast_path());
        FanoutSink { sinks, fast }
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Run `f` on every child, keeping the last error.
    fn each(&self, mut f: impl FnMut(&dyn Sink) -> Result<()>) -> Result<()> {
        let mut last: Option<SinkError> = None;
        for sink in &self.sinks {
            if let Err(err) = f(&**sink) {
                last = Some(err);
            }
        }
        last.map_or(Ok(()), Err)
    }
}

impl Sink for FanoutSink {
    fn handle(&self, record: &LogRecord) -> Result<()> {
        self.each(|sink| sink.handle(record))
    }

    fn handle_owned(&self, record: Box<LogRecord>) -> Result<()> {
        let res = self.handle(&record);
        record::release(record);
        res
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
        if self.fast {
            return self.each(|sink| {
                sink.handle_fast(timestamp, level, message, context, fields, caller)
            });
        }
        let mut record = record::acquire();
        record.fill(timestamp, level, message, context, fields, caller);
        self.handle_owned(record)
    }

    fn has_fast_path(&self) -> bool {
        self.fast
    }

    fn close(&self) -> Result<()> {
        self.each(|sink| sink.close())
    }

    /// Sum of the children's counters.
    fn stats(&self) -> Snapshot {
        self.sinks.iter().map(|sink| sink.stats()).sum()
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .field("fast", &self.fast)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop_sink::NoopSink;

    struct Failing(&'static str);

    impl Sink for Failing {
        fn handle(&self, _record: &LogRecord) -> Result<()> {
            Err(SinkError::Config(self.0.into()))
        }

        fn close(&self) -> Result<()> {
            Err(SinkError::Config(self.0.into()))
        }

        fn stats(&self) -> Snapshot {
            Snapshot::default()
        }
    }

    #[test]
    fn last_error_wins_and_all_children_run() {
        let noop = Arc::new(NoopSink::new());
        let fanout = FanoutSink::new(vec![
            Arc::new(Failing("first")) as Arc<dyn Sink>,
            noop.clone() as Arc<dyn Sink>,
            Arc::new(Failing("second")) as Arc<dyn Sink>,
        ]);
        assert!(!fanout.has_fast_path());

        let err = fanout.handle(&LogRecord::new(Level::Info, "x")).unwrap_err();
        assert!(matches!(err, SinkError::Config(ref m) if m == "second"));
        assert_eq!(noop.stats().processed, 1);

        let err = fanout.close().unwrap_err();
        assert!(matches!(err, SinkError::Config(ref m) if m == "second"));
    }

    #[test]
    fn fast_path_requires_every_child() {
        let a = Arc::new(NoopSink::new());
        let b = Arc::new(NoopSink::new());
        let fanout = FanoutSink::new(vec![a.clone() as Arc<dyn Sink>, b.clone() as Arc<dyn Sink>]);
        assert!(fanout.has_fast_path());

        fanout
            .handle_fast(Utc::now(), Level::Warn, "both", &[], &[], None)
            .unwrap();
        assert_eq!(a.stats().processed, 1);
        assert_eq!(b.stats().processed, 1);
        assert_eq!(fanout.stats().processed, 2);
    }
}
