use crate::async_sink::{AsyncConfig, AsyncSink};
use crate::error::Result;
use crate::field::Field;
use crate::format::Formatter;
use crate::level::Level;
use crate::record::{CallerInfo, LogRecord};
use crate::rotation::{RotatingFile, RotationPolicy, DEFAULT_FILE_BUFFER};
use crate::sink::Sink;
use crate::stats::Snapshot;
use crate::sync_sink::SyncSink;
use crate::text::TextFormatter;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whether records are written on the caller's thread or queued.
#[derive(Debug, Clone)]
pub enum Delivery {
    Sync,
    Async(AsyncConfig),
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Async(AsyncConfig::default())
    }
}

/// Configuration of a [`FileSink`].
///
/// **Fields**
/// - `path`: log file; parent directories are created on open.
/// - `rotation`: triggers and backup retention, all off by default.
/// - `buffer_capacity`: size of the buffered writer in front of the file.
/// - `formatter`: text output when unset.
/// - `delivery`: asynchronous with [`AsyncConfig::default`] unless changed.
#[derive(Clone)]
pub struct FileConfig {
    pub path: PathBuf,
    pub rotation: RotationPolicy,
    pub buffer_capacity: usize,
    pub formatter: Option<Arc<dyn Formatter>>,
    pub delivery: Delivery,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileConfig {
            path: path.into(),
            rotation: RotationPolicy::default(),
            buffer_capacity: DEFAULT_FILE_BUFFER,
            formatter: None,
            delivery: Delivery::default(),
        }
    }

    pub fn rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }
}

impl fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileConfig")
            .field("path", &self.path)
            .field("rotation", &self.rotation)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("formatter", &self.formatter.as_ref().map(|_| ".."))
            .field("delivery", &self.delivery)
            .finish()
    }
}

/// A sync or async sink writing to a [`RotatingFile`].
pub struct FileSink {
    sink: Box<dyn Sink>,
    file: Arc<RotatingFile>,
}

impl FileSink {
    pub fn open(config: FileConfig) -> Result<Self> {
        let file = Arc::new(RotatingFile::open(
            config.path,
            config.rotation,
            config.buffer_capacity,
        )?);
        let formatter = config
            .formatter
            .unwrap_or_else(|| Arc::new(TextFormatter::default()));

        let sink: Box<dyn Sink> = match config.delivery {
            Delivery::Sync => Box::new(SyncSink::from_parts(file.clone(), formatter)),
            Delivery::Async(async_config) => Box::new(AsyncSink::from_parts(
                file.clone(),
                formatter,
                async_config,
            )?),
        };

        Ok(FileSink { sink, file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn rotations(&self) -> u64 {
        self.file.rotations()
    }

    /// Force a rotation outside the configured triggers.
    pub fn rotate(&self) -> Result<()> {
        self.file.rotate()
    }
}

impl Sink for FileSink {
    fn handle(&self, record: &LogRecord) -> Result<()> {
        self.sink.handle(record)
    }

    fn handle_owned(&self, record: Box<LogRecord>) -> Result<()> {
        self.sink.handle_owned(record)
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
        self.sink
            .handle_fast(timestamp, level, message, context, fields, caller)
    }

    fn has_fast_path(&self) -> bool {
        self.sink.has_fast_path()
    }

    fn close(&self) -> Result<()> {
        self.sink.close()
    }

    fn stats(&self) -> Snapshot {
        self.sink.stats()
    }
}

impl fmt::Debug for FileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSink")
            .field("file", &self.file)
            .field("stats", &self.stats())
            .finish()
    }
}
