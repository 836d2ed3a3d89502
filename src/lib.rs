//! Structured log sinks with bounded queues, per-level overflow
//! policies, pooled formatting and file rotation.
//!
//! ```no_run
//! use log_dispatch::{AsyncConfig, AsyncSink, Field, JsonFormatter, Logger};
//!
//! let sink = AsyncSink::new(
//!     log_dispatch::destination::stdout(),
//!     JsonFormatter::default(),
//!     AsyncConfig::default(),
//! )
//! .expect("start consumer");
//! let logger = Logger::builder().sink(sink).caller(true).build();
//! logger.info("listening", &[Field::int("port", 8080)]);
//! logger.close().expect("flush");
//! ```

pub mod error;
pub mod level;
pub mod field;
pub mod record;
pub mod pool;
pub mod stats;
pub mod policy;

pub mod format;
pub mod text;
pub mod json;

pub mod destination;
pub mod rotation;
mod dispatch;

pub mod sink;
pub mod sync_sink;
pub mod async_sink;
pub mod file;
pub mod fanout;
pub mod noop_sink;

pub mod logger;
pub mod backend;
pub mod env;

#[cfg(feature = "layer")]
pub mod layer;
#[cfg(feature = "layer")]
pub mod init;

pub use async_sink::{AsyncConfig, AsyncSink};
pub use error::{Result, SinkError};
pub use fanout::FanoutSink;
pub use field::{Field, Value};
pub use file::{Delivery, FileConfig, FileSink};
pub use format::{FormatConfig, Formatter};
pub use json::JsonFormatter;
pub use level::Level;
pub use logger::Logger;
pub use policy::{LevelPolicies, OverflowPolicy};
pub use record::{CallerInfo, LogRecord};
pub use rotation::{RotatingFile, RotationPolicy};
pub use sink::Sink;
pub use stats::Snapshot;
pub use sync_sink::SyncSink;
pub use text::TextFormatter;
