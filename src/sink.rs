use crate::error::Result;
use crate::field::Field;
use crate::level::Level;
use crate::record::{self, CallerInfo, LogRecord};
use crate::stats::Snapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Destination for [`LogRecord`]s produced by a logger or the `tracing`
/// layer.
///
/// A sink is called from arbitrary application threads. `handle` only
/// borrows the record: a sink that needs to keep it past the call (an
/// asynchronous queue, for instance) copies it into a record of its own,
/// so the caller can always reuse or recycle what it passed in.
pub trait Sink: Send + Sync {
    /// Deliver one record.
    ///
    /// **Returns**
    /// - `Ok(())` once the record was written or accepted by a queue, and
    ///   also when an overflow policy discarded it (see [`Sink::stats`]).
    /// - `Err(..)` if the destination failed or the sink is closed.
    fn handle(&self, record: &LogRecord) -> Result<()>;

    /// Deliver a record taken from the process-wide pool, transferring
    /// ownership. The sink returns it to the pool when done.
    fn handle_owned(&self, record: Box<LogRecord>) -> Result<()> {
        let res = self.handle(&record);
        record::release(record);
        res
    }

    /// Deliver a record given as borrowed parts. Sinks with
    /// [`has_fast_path`](Sink::has_fast_path) fill storage they own
    /// instead of building a record first.
    fn handle_fast(
        &self,
        timestamp: DateTime<Utc>,
        level: Level,
        message: &str,
        context: &[Field],
        fields: &[Field],
        caller: Option<&CallerInfo>,
    ) -> Result<()> {
        let mut record = record::acquire();
        record.fill(timestamp, level, message, context, fields, caller);
        self.handle_owned(record)
    }

    /// Whether `handle_fast` avoids allocating once warmed up.
    fn has_fast_path(&self) -> bool {
        false
    }

    /// Flush and release the destination. Calling it again is a no-op.
    fn close(&self) -> Result<()>;

    fn stats(&self) -> Snapshot;
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn handle(&self, record: &LogRecord) -> Result<()> {
        (**self).handle(record)
    }

    fn handle_owned(&self, record: Box<LogRecord>) -> Result<()> {
        (**self).handle_owned(record)
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
        (**self).handle_fast(timestamp, level, message, context, fields, caller)
    }

    fn has_fast_path(&self) -> bool {
        (**self).has_fast_path()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn stats(&self) -> Snapshot {
        (**self).stats()
    }
}
