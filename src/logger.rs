//! Front-end for application code.
//!
//! A [`Logger`] is an immutable value: a sink, a minimum level and a set
//! of context fields. [`Logger::with`] derives a child carrying more
//! context. Loggers are cheap to clone and share between threads.

use crate::destination;
use crate::error::Result;
use crate::field::Field;
use crate::level::Level;
use crate::record::CallerInfo;
use crate::sink::Sink;
use crate::sync_sink::SyncSink;
use crate::text::TextFormatter;
use chrono::Utc;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, OnceLock};

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Sink>,
    level: Level,
    context: Arc<[Field]>,
    caller: bool,
}

#[derive(Default)]
pub struct LoggerBuilder {
    sink: Option<Arc<dyn Sink>>,
    level: Level,
    context: Vec<Field>,
    caller: bool,
}

impl LoggerBuilder {
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.context.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.context.extend(fields);
        self
    }

    /// Record the source location of each logging call.
    pub fn caller(mut self, enabled: bool) -> Self {
        self.caller = enabled;
        self
    }

    /// Without a sink, records go to stdout as text.
    pub fn build(self) -> Logger {
        let sink = self.sink.unwrap_or_else(|| {
            Arc::new(SyncSink::new(destination::stdout(), TextFormatter::default()))
        });
        Logger {
            sink,
            level: self.level,
            context: self.context.into(),
            caller: self.caller,
        }
    }
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Info level, no context, no caller capture.
    pub fn new(sink: impl Sink + 'static) -> Self {
        Logger::builder().sink(sink).build()
    }

    /// A child logger whose records carry `fields` after the parent's.
    pub fn with(&self, fields: impl IntoIterator<Item = Field>) -> Logger {
        let context: Vec<Field> = self.context.iter().cloned().chain(fields).collect();
        Logger {
            sink: Arc::clone(&self.sink),
            level: self.level,
            context: context.into(),
            caller: self.caller,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    #[track_caller]
    pub fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::Debug, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::Info, message, fields);
    }

    #[track_caller]
    pub fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::Warn, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: &str, fields: &[Field]) {
        self.log(Level::Error, message, fields);
    }

    /// Log, close the sink so queued records are written, then exit the
    /// process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: &str, fields: &[Field]) -> ! {
        self.log(Level::Fatal, message, fields);
        if let Err(err) = self.sink.close() {
            tracing::error!(target: "log_dispatch", error = %err, "closing sink before exit failed");
        }
        std::process::exit(1)
    }

    /// Log, then panic with `message`.
    #[track_caller]
    pub fn panic(&self, message: &str, fields: &[Field]) -> ! {
        self.log(Level::Panic, message, fields);
        panic!("{message}")
    }

    /// Log at `level`, discarding delivery errors. Failed writes are
    /// counted in the sink's [`Snapshot::failed`](crate::stats::Snapshot::failed).
    #[track_caller]
    pub fn log(&self, level: Level, message: &str, fields: &[Field]) {
        let _ = self.try_log(level, message, fields);
    }

    /// Log at `level` and report delivery errors.
    #[track_caller]
    pub fn try_log(&self, level: Level, message: &str, fields: &[Field]) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        let location = Location::caller();
        let caller = self.caller.then(|| CallerInfo::from(location));
        self.sink.handle_fast(
            Utc::now(),
            level,
            message,
            &self.context,
            fields,
            caller.as_ref(),
        )
    }

    pub fn close(&self) -> Result<()> {
        self.sink.close()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("context", &self.context)
            .field("caller", &self.caller)
            .finish()
    }
}

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// Install the process-wide logger. Only the first call succeeds; the
/// rejected logger is handed back.
///
/// Process-wide state outlives individual tests, so tests should build
/// their own [`Logger`] instead.
pub fn install(logger: Logger) -> std::result::Result<(), Logger> {
    GLOBAL.set(logger)
}

/// The installed logger, or a stdout text logger if none was installed.
pub fn global() -> &'static Logger {
    GLOBAL.get_or_init(|| Logger::builder().build())
}
