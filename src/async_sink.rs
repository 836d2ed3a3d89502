//! Queue-backed sink with a dedicated consumer thread.
//!
//! Producers copy records into pooled storage and push them onto a
//! bounded channel. When the channel is full the level's
//! [`OverflowPolicy`] decides what happens; a caller is never suspended
//! for longer than a `Block` timeout. One consumer thread drains the
//! queue in FIFO order, batching records into a single write.
//!
//! A write error stops the consumer for good. The stop is logged, passed
//! to [`AsyncConfig::on_fatal`], reported by [`AsyncSink::close`], and
//! from then on records are written on the caller's thread.

use crate::destination::Destination;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SinkError};
use crate::format::Formatter;
use crate::policy::{Deadline, LevelPolicies, OverflowPolicy};
use crate::pool::{self, MAX_POOLED_BUFFER};
use crate::record::{self, LogRecord};
use crate::sink::Sink;
use crate::stats::Snapshot;
use crossbeam::channel::{self, Receiver, Select, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Called once, from the consumer thread, when a write error stops it.
pub type FatalHook = Arc<dyn Fn(&SinkError) + Send + Sync>;

#[derive(Clone)]
pub struct AsyncConfig {
    /// Queue capacity in records.
    pub buffer_size: usize,
    pub policies: LevelPolicies,
    /// How long `close` keeps draining queued records.
    pub drain_timeout: Duration,
    /// Most records formatted into one write.
    pub max_batch: usize,
    pub on_fatal: Option<FatalHook>,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        AsyncConfig {
            buffer_size: 1000,
            policies: LevelPolicies::default(),
            drain_timeout: Duration::from_secs(5),
            max_batch: 128,
            on_fatal: None,
        }
    }
}

impl fmt::Debug for AsyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncConfig")
            .field("buffer_size", &self.buffer_size)
            .field("policies", &self.policies)
            .field("drain_timeout", &self.drain_timeout)
            .field("max_batch", &self.max_batch)
            .field("on_fatal", &self.on_fatal.is_some())
            .finish()
    }
}

/// State shared with the consumer thread.
struct Inner {
    dispatcher: Dispatcher,
    running: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl Inner {
    fn write_now(&self, record: Box<LogRecord>) -> Result<()> {
        let res = self.dispatcher.write(&record);
        record::release(record);
        res
    }

    fn drop_record(&self, record: Box<LogRecord>) {
        self.dispatcher.stats().record_dropped(record.level);
        record::release(record);
    }
}

pub struct AsyncSink {
    inner: Arc<Inner>,
    tx: Sender<Box<LogRecord>>,
    // Producers dequeue from it to evict under DropOldest.
    rx: Receiver<Box<LogRecord>>,
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    policies: LevelPolicies,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncSink {
    pub fn new<D, F>(destination: D, formatter: F, config: AsyncConfig) -> Result<Self>
    where
        D: Destination + 'static,
        F: Formatter + 'static,
    {
        AsyncSink::from_parts(Arc::new(destination), Arc::new(formatter), config)
    }

    /// Start the consumer thread.
    ///
    /// **Errors**
    /// - [`SinkError::Spawn`] if the thread could not be created.
    pub fn from_parts(
        destination: Arc<dyn Destination>,
        formatter: Arc<dyn Formatter>,
        config: AsyncConfig,
    ) -> Result<Self> {
        let (tx, rx) = channel::bounded(config.buffer_size.max(1));
        let (close_tx, close_rx) = channel::bounded::<()>(0);

        let inner = Arc::new(Inner {
            dispatcher: Dispatcher::new(destination, formatter),
            running: AtomicBool::new(true),
            failure: Mutex::new(None),
        });

        let consumer = Consumer {
            inner: Arc::clone(&inner),
            rx: rx.clone(),
            close_rx: close_rx.clone(),
            max_batch: config.max_batch.max(1),
            drain_timeout: config.drain_timeout,
            on_fatal: config.on_fatal,
        };
        let worker = thread::Builder::new()
            .name("log-dispatch-consumer".into())
            .spawn(move || consumer.run())
            .map_err(SinkError::Spawn)?;

        Ok(AsyncSink {
            inner,
            tx,
            rx,
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            policies: config.policies,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Whether records are still handed to the consumer thread.
    pub fn is_running(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.inner.running.load(Ordering::Acquire)
    }

    /// Records currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    fn enqueue(&self, record: Box<LogRecord>) -> Result<()> {
        self.push(record)?;
        if self.is_running() {
            Ok(())
        } else {
            self.sweep()
        }
    }

    /// Write records that reached the queue after the consumer exited.
    fn sweep(&self) -> Result<()> {
        let mut res = Ok(());
        while let Ok(record) = self.rx.try_recv() {
            if let Err(err) = self.inner.write_now(record) {
                res = Err(err);
            }
        }
        res
    }

    fn push(&self, record: Box<LogRecord>) -> Result<()> {
        let level = record.level;
        let record = match self.tx.try_send(record) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(record)) => record,
            Err(TrySendError::Disconnected(record)) => return self.inner.write_now(record),
        };

        match self.policies.resolve(level) {
            OverflowPolicy::DropNewest => {
                self.inner.drop_record(record);
                Ok(())
            }
            OverflowPolicy::DropOldest => {
                if let Ok(oldest) = self.rx.try_recv() {
                    self.inner.drop_record(oldest);
                }
                if let Err(err) = self.tx.try_send(record) {
                    self.inner.drop_record(err.into_inner());
                }
                Ok(())
            }
            OverflowPolicy::Block(timeout) => self.enqueue_blocking(record, timeout),
        }
    }

    /// Wait for queue space until the deadline or the close signal,
    /// whichever comes first; both fall back to a synchronous write.
    fn enqueue_blocking(&self, record: Box<LogRecord>, timeout: Duration) -> Result<()> {
        let deadline = Deadline::after(timeout);
        let mut sel = Select::new();
        let send = sel.send(&self.tx);
        let closing = sel.recv(&self.close_rx);

        let selected = match deadline.remaining() {
            Some(timeout) => sel.select_timeout(timeout),
            None => Ok(sel.select()),
        };
        match selected {
            Ok(op) if op.index() == send => match op.send(&self.tx, record) {
                Ok(()) => Ok(()),
                Err(err) => self.inner.write_now(err.into_inner()),
            },
            Ok(op) => {
                debug_assert_eq!(op.index(), closing);
                let _ = op.recv(&self.close_rx);
                self.inner.write_now(record)
            }
            Err(_) => {
                self.inner.dispatcher.stats().record_blocked();
                self.inner.write_now(record)
            }
        }
    }
}

impl Sink for AsyncSink {
    fn handle(&self, record: &LogRecord) -> Result<()> {
        if !self.is_running() {
            return self.inner.dispatcher.write(record);
        }
        let mut owned = record::acquire();
        owned.copy_from(record);
        self.enqueue(owned)
    }

    fn handle_owned(&self, record: Box<LogRecord>) -> Result<()> {
        if !self.is_running() {
            return self.inner.write_now(record);
        }
        self.enqueue(record)
    }

    /// Pooled records make the default `handle_fast` allocation-free.
    fn has_fast_path(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Disconnecting the close channel wakes the consumer and every
        // producer blocked on a full queue.
        drop(self.close_tx.lock().take());
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!(target: "log_dispatch", "async consumer thread panicked");
            }
        }

        let swept = self.sweep();
        let res = self.inner.dispatcher.close();
        if let Some(reason) = self.inner.failure.lock().take() {
            return Err(SinkError::ConsumerStopped(reason));
        }
        swept.and(res)
    }

    fn stats(&self) -> Snapshot {
        self.inner.dispatcher.stats().snapshot()
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(target: "log_dispatch", error = %err, "async sink closed with error");
        }
    }
}

impl fmt::Debug for AsyncSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSink")
            .field("running", &self.is_running())
            .field("queued", &self.queued())
            .field("policies", &self.policies)
            .field("stats", &self.stats())
            .finish()
    }
}

struct Consumer {
    inner: Arc<Inner>,
    rx: Receiver<Box<LogRecord>>,
    close_rx: Receiver<()>,
    max_batch: usize,
    drain_timeout: Duration,
    on_fatal: Option<FatalHook>,
}

impl Consumer {
    fn run(self) {
        let mut batch = Vec::with_capacity(pool::INITIAL_BUFFER_CAPACITY * 16);
        let mut sel = Select::new();
        let records = sel.recv(&self.rx);
        let closing = sel.recv(&self.close_rx);

        loop {
            let op = sel.select();
            if op.index() == records {
                let Ok(first) = op.recv(&self.rx) else {
                    return;
                };
                if let Err(err) = self.consume(first, &mut batch) {
                    self.stop(err);
                    return;
                }
            } else {
                debug_assert_eq!(op.index(), closing);
                let _ = op.recv(&self.close_rx);
                self.drain(&mut batch);
                return;
            }
        }
    }

    /// Format `first` plus whatever is already queued, then write once.
    fn consume(&self, first: Box<LogRecord>, batch: &mut Vec<u8>) -> Result<()> {
        let formatter = self.inner.dispatcher.formatter();
        batch.clear();
        formatter.format_into(&first, batch);
        record::release(first);

        let mut count = 1;
        while count < self.max_batch && batch.len() < MAX_POOLED_BUFFER {
            match self.rx.try_recv() {
                Ok(record) => {
                    formatter.format_into(&record, batch);
                    record::release(record);
                    count += 1;
                }
                Err(_) => break,
            }
        }

        let res = self.inner.dispatcher.write_batch(batch, count as u64);
        pool::trim_buffer(batch);
        res
    }

    fn drain(&self, batch: &mut Vec<u8>) {
        let deadline = Deadline::after(self.drain_timeout);
        while !deadline.expired() {
            let Ok(first) = self.rx.try_recv() else {
                return;
            };
            if let Err(err) = self.consume(first, batch) {
                self.stop(err);
                return;
            }
        }

        let mut abandoned = 0usize;
        while let Ok(record) = self.rx.try_recv() {
            self.inner.drop_record(record);
            abandoned += 1;
        }
        if abandoned > 0 {
            tracing::warn!(
                target: "log_dispatch",
                abandoned,
                timeout = ?self.drain_timeout,
                "drain timeout elapsed, abandoning queued records"
            );
        }
    }

    fn stop(&self, err: SinkError) {
        tracing::error!(
            target: "log_dispatch",
            error = %err,
            "async consumer stopped after write failure"
        );
        *self.inner.failure.lock() = Some(err.to_string());
        self.inner.running.store(false, Ordering::Release);

        // Nobody drains the queue anymore.
        while let Ok(record) = self.rx.try_recv() {
            self.inner.drop_record(record);
        }

        if let Some(hook) = &self.on_fatal {
            hook(&err);
        }
    }
}
