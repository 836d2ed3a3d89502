use crate::field::{nanos_to_utc, Value};
use crate::format::{write_timestamp, FormatConfig, Formatter, Precision};
use crate::record::LogRecord;
use std::io::Write;

/// Human-readable single-line output:
///
/// ```text
/// 2024-05-01T10:00:00Z [INFO] [main.rs:42] request done status=200 took=3ms
/// ```
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    config: FormatConfig,
}

impl TextFormatter {
    pub fn new(config: FormatConfig) -> Self {
        TextFormatter { config: config.validated() }
    }
}

impl Formatter for TextFormatter {
    fn format_into(&self, record: &LogRecord, buf: &mut Vec<u8>) {
        write_timestamp(
            buf,
            &record.timestamp,
            self.config.timestamp_format.as_deref(),
            Precision::Seconds,
        );

        buf.extend_from_slice(b" [");
        buf.extend_from_slice(record.level.as_str().as_bytes());
        buf.extend_from_slice(b"] ");

        if self.config.include_caller {
            if let Some(caller) = &record.caller {
                buf.push(b'[');
                buf.extend_from_slice(caller.short_file().as_bytes());
                let _ = write!(buf, ":{}] ", caller.line);
            }
        }

        buf.extend_from_slice(record.message.as_bytes());

        for field in &record.fields {
            buf.push(b' ');
            buf.extend_from_slice(field.key.as_bytes());
            buf.push(b'=');
            write_value(buf, &field.value);
        }

        buf.push(b'\n');
    }
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Str(s) | Value::Error(s) => buf.extend_from_slice(s.as_bytes()),
        Value::Int(v) => {
            let _ = write!(buf, "{v}");
        }
        Value::Time(nanos) => {
            crate::format::write_rfc3339(buf, &nanos_to_utc(*nanos), Precision::Seconds)
        }
        other => {
            let _ = write!(buf, "{other}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::level::Level;
    use crate::record::CallerInfo;
    use chrono::{DateTime, Utc};
    use std::borrow::Cow;
    use std::time::Duration;

    fn record() -> LogRecord {
        let mut record = LogRecord::new(Level::Info, "request done")
            .with_field(Field::int("status", 200))
            .with_field(Field::duration("took", Duration::from_millis(3)))
            .with_caller(CallerInfo {
                file: Cow::Borrowed("src/bin/main.rs"),
                line: 42,
                function: Cow::Borrowed("main"),
            });
        record.timestamp = DateTime::<Utc>::from_timestamp(1_714_557_600, 0).unwrap();
        record
    }

    #[test]
    fn renders_line_without_caller() {
        let out = TextFormatter::default().format(&record());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2024-05-01T10:00:00Z [INFO] request done status=200 took=3ms\n"
        );
    }

    #[test]
    fn renders_caller_when_enabled() {
        let formatter = TextFormatter::new(FormatConfig {
            include_caller: true,
            ..Default::default()
        });
        let out = String::from_utf8(formatter.format(&record())).unwrap();
        assert!(out.contains("[INFO] [main.rs:42] request done"), "{out}");
    }

    #[test]
    fn format_to_writes_once() {
        let mut sink = Vec::new();
        TextFormatter::default().format_to(&record(), &mut sink).unwrap();
        assert!(sink.ends_with(b"\n"));
        assert!(sink.starts_with(b"2024-05-01T10:00:00Z"));
    }
}
