//! Byte-level outputs that sinks write formatted records to.
//!
//! A destination either serializes its own writes or says it does not.
//! [`Exclusive`] holds a mutex around writers that cannot take
//! concurrent writes; that mutex is the write lock. [`Shared`] wraps
//! writers that are already safe to write from several threads
//! (`&W: Write`), so no lock is taken at all. Which wrapper a
//! destination ends up in is decided by its type through the `From`
//! conversions below, or chosen explicitly by the caller. A destination
//! that reports `concurrent_safe() == false` gets its calls serialized by
//! the sink instead.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

pub trait Destination: Send + Sync {
    /// Write the whole buffer or fail.
    fn write_all(&self, buf: &[u8]) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Flush and release OS resources that need an explicit step.
    /// Called once when the owning sink closes.
    fn close(&self) -> io::Result<()> {
        self.flush()
    }

    /// Whether `write_all`, `flush` and `close` may run on several
    /// threads at once. When `false`, the sink takes a write lock around
    /// every call.
    fn concurrent_safe(&self) -> bool;
}

impl<D: Destination + ?Sized> Destination for Arc<D> {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&self) -> io::Result<()> {
        (**self).close()
    }

    fn concurrent_safe(&self) -> bool {
        (**self).concurrent_safe()
    }
}

/// A writer that needs serialized access.
#[derive(Debug, Default)]
pub struct Exclusive<W> {
    writer: Mutex<W>,
}

impl<W> Exclusive<W> {
    pub fn new(writer: W) -> Self {
        Exclusive { writer: Mutex::new(writer) }
    }

    /// Run `f` with the writer locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.writer.lock())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Destination for Exclusive<W> {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.writer.lock().write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }

    /// The inner mutex already serializes writes.
    fn concurrent_safe(&self) -> bool {
        true
    }
}

/// A writer whose shared reference is itself a writer.
#[derive(Debug)]
pub struct Shared<W> {
    writer: W,
}

impl<W> Shared<W>
where
    W: Send + Sync,
    for<'a> &'a W: Write,
{
    pub fn new(writer: W) -> Self {
        Shared { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W> Destination for Shared<W>
where
    W: Send + Sync,
    for<'a> &'a W: Write,
{
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        (&self.writer).write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        (&self.writer).flush()
    }

    fn concurrent_safe(&self) -> bool {
        true
    }
}

/// Accepts and forgets every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Destination for Discard {
    fn write_all(&self, _buf: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn concurrent_safe(&self) -> bool {
        true
    }
}

pub fn stdout() -> Shared<io::Stdout> {
    Shared::new(io::stdout())
}

pub fn stderr() -> Shared<io::Stderr> {
    Shared::new(io::stderr())
}

impl From<io::Stdout> for Box<dyn Destination> {
    fn from(out: io::Stdout) -> Self {
        Box::new(Shared::new(out))
    }
}

impl From<io::Stderr> for Box<dyn Destination> {
    fn from(err: io::Stderr) -> Self {
        Box::new(Shared::new(err))
    }
}

impl From<File> for Box<dyn Destination> {
    fn from(file: File) -> Self {
        Box::new(Shared::new(file))
    }
}

impl From<io::Sink> for Box<dyn Destination> {
    fn from(_: io::Sink) -> Self {
        Box::new(Discard)
    }
}

impl From<Vec<u8>> for Box<dyn Destination> {
    fn from(buf: Vec<u8>) -> Self {
        Box::new(Exclusive::new(buf))
    }
}
