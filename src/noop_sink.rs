use crate::error::Result;
use crate::field::Field;
use crate::level::Level;
use crate::record::{CallerInfo, LogRecord};
use crate::sink::Sink;
use crate::stats::{Snapshot, Stats};
use chrono::{DateTime, Utc};

/// A sink that counts records and drops them.
///
/// Useful for measuring the overhead of the logging path itself without
/// any I/O, and for tests that don't care about output.
#[derive(Debug, Default)]
pub struct NoopSink {
    stats: Stats,
}

impl NoopSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for NoopSink {
    fn handle(&self, _record: &LogRecord) -> Result<()> {
        self.stats.record_processed();
        Ok(())
    }

    fn handle_fast(
        &self,
        _timestamp: DateTime<Utc>,
        _level: Level,
        _message: &str,
        _context: &[Field],
        _fields: &[Field],
        _caller: Option<&CallerInfo>,
    ) -> Result<()> {
        self.stats.record_processed();
        Ok(())
    }

    fn has_fast_path(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> Snapshot {
        self.stats.snapshot()
    }
}
