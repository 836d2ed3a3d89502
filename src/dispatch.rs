//! Shared write core of the synchronous and asynchronous sinks.
//!
//! Two explicit paths:
//!
//! * uncontended: `try_lock` the sink-owned scratch (record and buffer),
//!   format into it and write while holding it. Nothing is allocated
//!   once the buffer has grown to the working size.
//! * contended: take a combined record+buffer object from the sink's
//!   pool, format without holding any sink lock, write, and return the
//!   object.
//!
//! Destinations that are not [`Destination::concurrent_safe`] get every
//! call serialized behind the dispatcher's write lock, whichever path
//! the write took. Lock order is scratch lock, write lock, then
//! destination lock.

use crate::destination::Destination;
use crate::error::{Result, SinkError};
use crate::field::Field;
use crate::format::Formatter;
use crate::level::Level;
use crate::pool::{self, Pool, Reusable, MAX_POOLED_BUFFER};
use crate::record::{CallerInfo, LogRecord};
use crate::stats::Stats;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

const SCRATCH_POOL_SIZE: usize = 64;

/// A record and the buffer it is formatted into, pooled as a unit.
#[derive(Debug)]
pub(crate) struct Scratch {
    pub record: LogRecord,
    pub buf: Vec<u8>,
}

impl Reusable for Scratch {
    fn fresh() -> Self {
        Scratch {
            record: LogRecord::fresh(),
            buf: Vec::fresh(),
        }
    }

    fn reset(&mut self) {
        self.record.reset();
        self.buf.clear();
    }

    fn reusable(&self) -> bool {
        self.buf.capacity() <= MAX_POOLED_BUFFER && self.record.reusable()
    }
}

pub(crate) struct Dispatcher {
    formatter: Arc<dyn Formatter>,
    destination: Arc<dyn Destination>,
    /// Held around destination calls unless the destination is
    /// concurrent-safe.
    write_lock: Option<Mutex<()>>,
    owned: Mutex<Scratch>,
    spare: Pool<Scratch>,
    stats: Arc<Stats>,
}

impl Dispatcher {
    pub fn new(destination: Arc<dyn Destination>, formatter: Arc<dyn Formatter>) -> Self {
        let write_lock = (!destination.concurrent_safe()).then(|| Mutex::new(()));
        Dispatcher {
            formatter,
            destination,
            write_lock,
            owned: Mutex::new(Scratch::fresh()),
            spare: Pool::new(SCRATCH_POOL_SIZE),
            stats: Arc::new(Stats::new()),
        }
    }

    pub fn formatter(&self) -> &dyn Formatter {
        &*self.formatter
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn write(&self, record: &LogRecord) -> Result<()> {
        if let Some(mut owned) = self.owned.try_lock() {
            let res = self.render(record, &mut owned.buf);
            pool::trim_buffer(&mut owned.buf);
            return self.finish(res, 1);
        }

        let mut scratch = self.spare.get();
        let res = self.render(record, &mut scratch.buf);
        self.spare.put(scratch);
        self.finish(res, 1)
    }

    /// Fill a scratch record from borrowed parts and write it.
    pub fn write_fast(
        &self,
        timestamp: DateTime<Utc>,
        level: Level,
        message: &str,
        context: &[Field],
        fields: &[Field],
        caller: Option<&CallerInfo>,
    ) -> Result<()> {
        if let Some(mut guard) = self.owned.try_lock() {
            let Scratch { record, buf } = &mut *guard;
            record.fill(timestamp, level, message, context, fields, caller);
            let res = self.render(record, buf);
            pool::trim_buffer(buf);
            // Drop field values now rather than at the next write.
            record.fields.clear();
            return self.finish(res, 1);
        }

        let mut scratch = self.spare.get();
        let Scratch { record, buf } = &mut *scratch;
        record.fill(timestamp, level, message, context, fields, caller);
        let res = self.render(record, buf);
        self.spare.put(scratch);
        self.finish(res, 1)
    }

    /// Write a buffer holding `count` already formatted records.
    pub fn write_batch(&self, buf: &[u8], count: u64) -> Result<()> {
        let res = self.locked(|dest| dest.write_all(buf));
        self.finish(res, count)
    }

    pub fn flush(&self) -> Result<()> {
        self.locked(|dest| dest.flush()).map_err(SinkError::from)
    }

    pub fn close(&self) -> Result<()> {
        self.locked(|dest| dest.close()).map_err(SinkError::from)
    }

    fn locked<R>(&self, f: impl FnOnce(&dyn Destination) -> R) -> R {
        let _guard = self.write_lock.as_ref().map(|lock| lock.lock());
        f(&*self.destination)
    }

    fn render(&self, record: &LogRecord, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.clear();
        self.formatter.format_into(record, buf);
        let bytes: &[u8] = buf;
        self.locked(|dest| dest.write_all(bytes))
    }

    #[inline]
    fn finish(&self, res: io::Result<()>, count: u64) -> Result<()> {
        match res {
            Ok(()) => {
                self.stats.add_processed(count);
                Ok(())
            }
            Err(err) => {
                self.stats.add_failed(count);
                Err(SinkError::from(err))
            }
        }
    }
}
