use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::async_sink::{AsyncConfig, AsyncSink};
use crate::destination::{self, Destination, Discard};
use crate::error::SinkError;
use crate::file::{Delivery, FileConfig, FileSink};
use crate::format::Formatter;
use crate::json::JsonFormatter;
use crate::rotation::RotationPolicy;
use crate::sink::Sink;
use crate::sync_sink::SyncSink;
use crate::text::TextFormatter;

/// Output a target string can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Stdout,
    Stderr,
    Discard,
    File,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatKind {
    #[default]
    Text,
    Json,
}

impl FromStr for FormatKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(FormatKind::Text),
            "json" => Ok(FormatKind::Json),
            _ => Err(TargetError::InvalidParam {
                key: "format".into(),
                value: s.into(),
            }),
        }
    }
}

/// Sink configuration built from a target string or explicit fields.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub kind: TargetKind,
    /// Set for [`TargetKind::File`] only.
    pub path: Option<PathBuf>,
    pub format: FormatKind,
    /// Queue records on a consumer thread. Defaults to `true` for files.
    pub is_async: bool,
    pub buffer_size: usize,
    pub drain_timeout: Duration,
    pub rotation: RotationPolicy,
}

impl TargetConfig {
    pub fn new(kind: TargetKind) -> Self {
        let defaults = AsyncConfig::default();
        TargetConfig {
            kind,
            path: None,
            format: FormatKind::default(),
            is_async: kind == TargetKind::File,
            buffer_size: defaults.buffer_size,
            drain_timeout: defaults.drain_timeout,
            rotation: RotationPolicy::default(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        TargetConfig {
            path: Some(path.into()),
            ..TargetConfig::new(TargetKind::File)
        }
    }

    fn async_config(&self) -> AsyncConfig {
        AsyncConfig {
            buffer_size: self.buffer_size,
            drain_timeout: self.drain_timeout,
            ..AsyncConfig::default()
        }
    }
}

/// Parse a target string.
///
/// Examples:
/// - "stdout", "stderr", "discard"
/// - "stdout?format=json&async=true&buffer=4096"
/// - "file:///var/log/app.log?max_size=10485760&max_backups=5"
/// - "file://logs/app%201.log?format=json&interval_secs=3600"
///
/// Query keys: `format`, `async`, `buffer`, `max_size`, `max_backups`,
/// `max_age_secs`, `interval_secs`, `drain_timeout_ms`. Rotation keys only
/// apply to files. Path and values are percent-decoded.
pub fn parse_target(target: &str) -> Result<TargetConfig, TargetError> {
    let target = target.trim();
    let (location, query) = match target.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (target, None),
    };

    let lower = location.to_ascii_lowercase();
    let mut cfg = if lower.starts_with("file://") {
        let raw = &location["file://".len()..];
        if raw.is_empty() {
            return Err(TargetError::MissingPath);
        }
        let path = urlencoding::decode(raw).map_err(|_| TargetError::BadEncoding(raw.into()))?;
        TargetConfig::file(path.into_owned())
    } else {
        match lower.as_str() {
            "stdout" => TargetConfig::new(TargetKind::Stdout),
            "stderr" => TargetConfig::new(TargetKind::Stderr),
            "discard" => TargetConfig::new(TargetKind::Discard),
            _ => return Err(TargetError::UnknownScheme(location.into())),
        }
    };

    for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(raw).map_err(|_| TargetError::BadEncoding(raw.into()))?;
        apply_param(&mut cfg, key, &value)?;
    }

    let rotates = cfg.rotation != RotationPolicy::default();
    if rotates && cfg.kind != TargetKind::File {
        return Err(TargetError::RotationWithoutFile);
    }
    Ok(cfg)
}

fn apply_param(cfg: &mut TargetConfig, key: &str, value: &str) -> Result<(), TargetError> {
    fn num<T: FromStr>(key: &str, value: &str) -> Result<T, TargetError> {
        value.parse().map_err(|_| TargetError::InvalidParam {
            key: key.into(),
            value: value.into(),
        })
    }

    match key {
        "format" => cfg.format = value.parse()?,
        "async" => {
            cfg.is_async = match value.to_ascii_lowercase().as_str() {
                "" | "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(TargetError::InvalidParam {
                        key: key.into(),
                        value: value.into(),
                    })
                }
            }
        }
        "buffer" => cfg.buffer_size = num(key, value)?,
        "drain_timeout_ms" => cfg.drain_timeout = Duration::from_millis(num(key, value)?),
        "max_size" => cfg.rotation.max_size = num(key, value)?,
        "max_backups" => cfg.rotation.max_backups = num(key, value)?,
        "max_age_secs" => {
            cfg.rotation.max_age = Some(Duration::from_secs(num(key, value)?)).filter(|d| !d.is_zero())
        }
        "interval_secs" => {
            cfg.rotation.rotate_interval =
                Some(Duration::from_secs(num(key, value)?)).filter(|d| !d.is_zero())
        }
        _ => return Err(TargetError::UnknownParam(key.into())),
    }
    Ok(())
}

/// Error type returned when parsing a target string.
#[derive(thiserror::Error, Debug)]
pub enum TargetError {
    #[error("unknown or unsupported target: {0}")]
    UnknownScheme(String),

    #[error("file target without a path")]
    MissingPath,

    #[error("target contains invalid percent-encoding: {0}")]
    BadEncoding(String),

    #[error("unknown target parameter: {0}")]
    UnknownParam(String),

    #[error("invalid value {value:?} for target parameter {key}")]
    InvalidParam { key: String, value: String },

    #[error("rotation parameters require a file target")]
    RotationWithoutFile,
}

impl From<TargetError> for SinkError {
    fn from(err: TargetError) -> Self {
        SinkError::Config(err.to_string())
    }
}

/// Create a concrete [`Sink`] from a [`TargetConfig`].
///
/// This is the main entry point for applications that select their
/// output with a single target string instead of constructing sinks
/// manually.
pub fn make_sink_from_config(cfg: &TargetConfig) -> Result<Arc<dyn Sink>, SinkError> {
    let formatter: Arc<dyn Formatter> = match cfg.format {
        FormatKind::Text => Arc::new(TextFormatter::default()),
        FormatKind::Json => Arc::new(JsonFormatter::default()),
    };

    let destination: Arc<dyn Destination> = match cfg.kind {
        TargetKind::Stdout => Arc::new(destination::stdout()),
        TargetKind::Stderr => Arc::new(destination::stderr()),
        TargetKind::Discard => Arc::new(Discard),
        TargetKind::File => {
            let path = cfg
                .path
                .clone()
                .ok_or_else(|| SinkError::Config("file target without a path".into()))?;
            let delivery = if cfg.is_async {
                Delivery::Async(cfg.async_config())
            } else {
                Delivery::Sync
            };
            let config = FileConfig {
                formatter: Some(formatter),
                ..FileConfig::new(path).rotation(cfg.rotation.clone()).delivery(delivery)
            };
            return Ok(Arc::new(FileSink::open(config)?));
        }
    };

    if cfg.is_async {
        Ok(Arc::new(AsyncSink::from_parts(destination, formatter, cfg.async_config())?))
    } else {
        Ok(Arc::new(SyncSink::from_parts(destination, formatter)))
    }
}

/// Parse `target` and build its sink.
pub fn make_sink(target: &str) -> Result<Arc<dyn Sink>, SinkError> {
    make_sink_from_config(&parse_target(target)?)
}
