//! Rendering of [`LogRecord`]s into bytes.
//!
//! Sinks always call [`Formatter::format_into`] with a buffer they own
//! or took from a pool. The copy-returning and streaming variants exist
//! for callers outside the dispatch path.

use crate::pool::buffers;
use crate::record::LogRecord;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::io::{self, Write};

pub trait Formatter: Send + Sync {
    /// Append the rendered record, including its trailing newline.
    fn format_into(&self, record: &LogRecord, buf: &mut Vec<u8>);

    /// Render into a new vector.
    fn format(&self, record: &LogRecord) -> Vec<u8> {
        let pool = buffers();
        let mut buf = pool.get();
        self.format_into(record, &mut buf);
        let out = buf.to_vec();
        pool.put(buf);
        out
    }

    /// Render and hand the bytes to `w` in a single write.
    fn format_to(&self, record: &LogRecord, w: &mut dyn Write) -> io::Result<()> {
        let pool = buffers();
        let mut buf = pool.get();
        self.format_into(record, &mut buf);
        let res = w.write_all(&buf);
        pool.put(buf);
        res
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatConfig {
    /// Render `file:line` of the logging call when the record carries it.
    pub include_caller: bool,
    /// chrono strftime pattern. Unset means RFC 3339 in UTC, rendered
    /// without allocating; a custom pattern allocates per record.
    pub timestamp_format: Option<String>,
}

impl FormatConfig {
    /// Drop a timestamp pattern chrono cannot render.
    pub(crate) fn validated(mut self) -> Self {
        if let Some(pattern) = &self.timestamp_format {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                tracing::warn!(
                    target: "log_dispatch",
                    pattern = %pattern,
                    "ignoring invalid timestamp format"
                );
                self.timestamp_format = None;
            }
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Precision {
    Seconds,
    Nanos,
}

/// Write `ts` as RFC 3339 with a `Z` offset.
pub(crate) fn write_rfc3339(buf: &mut Vec<u8>, ts: &DateTime<Utc>, precision: Precision) {
    let date = ts.date_naive();
    let time = ts.time();
    // Writes into a Vec<u8> cannot fail.
    let _ = write!(
        buf,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        date.year(),
        date.month(),
        date.day(),
        time.hour(),
        time.minute(),
        time.second()
    );
    if precision == Precision::Nanos {
        let _ = write!(buf, ".{:09}", time.nanosecond() % 1_000_000_000);
    }
    buf.push(b'Z');
}

/// Write the record timestamp with either the configured pattern or the
/// built-in RFC 3339 renderer.
pub(crate) fn write_timestamp(
    buf: &mut Vec<u8>,
    ts: &DateTime<Utc>,
    pattern: Option<&str>,
    precision: Precision,
) {
    match pattern {
        Some(pattern) => {
            let _ = write!(buf, "{}", ts.format(pattern));
        }
        None => write_rfc3339(buf, ts, precision),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_rendering() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 5).unwrap();
        let mut buf = Vec::new();
        write_rfc3339(&mut buf, &ts, Precision::Seconds);
        assert_eq!(buf, b"2023-11-14T22:13:20Z");

        buf.clear();
        write_rfc3339(&mut buf, &ts, Precision::Nanos);
        assert_eq!(buf, b"2023-11-14T22:13:20.000000005Z");
    }

    #[test]
    fn custom_pattern_is_used() {
        let ts = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let mut buf = Vec::new();
        write_timestamp(&mut buf, &ts, Some("%Y/%m/%d"), Precision::Seconds);
        assert_eq!(buf, b"1970/01/01");
    }

    #[test]
    fn invalid_pattern_is_dropped() {
        let config = FormatConfig {
            include_caller: false,
            timestamp_format: Some("%Q%".into()),
        }
        .validated();
        assert_eq!(config.timestamp_format, None);
    }
}
