use crate::field::{nanos_to_utc, Value};
use crate::format::{write_rfc3339, FormatConfig, Formatter, Precision};
use crate::record::LogRecord;
use serde::Serializer as _;
use serde_json::ser::{CompactFormatter, Formatter as _};
use std::fmt;

/// Keys written for every record. User fields with these names are
/// renamed with [`FIELD_KEY_PREFIX`] so no key appears twice.
pub const RESERVED_KEYS: [&str; 4] = ["time", "level", "message", "caller"];

pub const FIELD_KEY_PREFIX: &str = "fields.";

/// One JSON object per line. Fields follow the fixed keys in insertion
/// order; durations are integer nanoseconds and non-finite floats are
/// `null`.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    config: FormatConfig,
}

impl JsonFormatter {
    pub fn new(config: FormatConfig) -> Self {
        JsonFormatter { config: config.validated() }
    }
}

impl Formatter for JsonFormatter {
    fn format_into(&self, record: &LogRecord, buf: &mut Vec<u8>) {
        buf.extend_from_slice(br#"{"time":"#);
        match self.config.timestamp_format.as_deref() {
            Some(pattern) => write_display(buf, record.timestamp.format(pattern)),
            None => {
                buf.push(b'"');
                write_rfc3339(buf, &record.timestamp, Precision::Nanos);
                buf.push(b'"');
            }
        }
        buf.extend_from_slice(br#","level":""#);
        buf.extend_from_slice(record.level.as_str().as_bytes());
        buf.extend_from_slice(br#"","message":"#);
        write_str(buf, &record.message);

        if self.config.include_caller {
            if let Some(caller) = &record.caller {
                buf.extend_from_slice(br#","caller":{"file":"#);
                write_str(buf, caller.short_file());
                buf.extend_from_slice(br#","line":"#);
                let _ = CompactFormatter.write_u32(buf, caller.line);
                if !caller.function.is_empty() {
                    buf.extend_from_slice(br#","function":"#);
                    write_str(buf, &caller.function);
                }
                buf.push(b'}');
            }
        }

        for field in &record.fields {
            buf.push(b',');
            if RESERVED_KEYS.contains(&field.key.as_ref()) {
                write_display(buf, format_args!("{FIELD_KEY_PREFIX}{}", field.key));
            } else {
                write_str(buf, &field.key);
            }
            buf.push(b':');
            write_value(buf, &field.value);
        }

        buf.extend_from_slice(b"}\n");
    }
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Str(s) | Value::Error(s) => write_str(buf, s),
        Value::Int(v) | Value::Duration(v) => {
            let _ = CompactFormatter.write_i64(buf, *v);
        }
        Value::Float(v) if v.is_finite() => {
            let _ = CompactFormatter.write_f64(buf, *v);
        }
        Value::Float(_) => {
            let _ = CompactFormatter.write_null(buf);
        }
        Value::Bool(v) => {
            let _ = CompactFormatter.write_bool(buf, *v);
        }
        Value::Time(nanos) => {
            buf.push(b'"');
            write_rfc3339(buf, &nanos_to_utc(*nanos), Precision::Nanos);
            buf.push(b'"');
        }
        Value::Any(v) => write_display(buf, format_args!("{v:?}")),
    }
}

/// Quoted and escaped. Writing to a `Vec` cannot fail.
fn write_str(buf: &mut Vec<u8>, value: &str) {
    let _ = serde_json::to_writer(&mut *buf, value);
}

/// Quoted and escaped as it is rendered, without an intermediate `String`.
fn write_display(buf: &mut Vec<u8>, value: impl fmt::Display) {
    let mut ser = serde_json::Serializer::new(&mut *buf);
    let _ = (&mut ser).collect_str(&value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::level::Level;

    fn render(record: &LogRecord, config: FormatConfig) -> serde_json::Value {
        serde_json::from_slice(&JsonFormatter::new(config).format(record)).unwrap()
    }

    #[test]
    fn escapes_control_and_quote_characters() {
        let mut buf = Vec::new();
        write_str(&mut buf, "a\"b\\c\nd\u{1}é");
        assert_eq!(String::from_utf8(buf).unwrap(), r#""a\"b\\c\nd\u0001é""#);
    }

    #[test]
    fn non_finite_floats_are_null() {
        let mut buf = Vec::new();
        write_value(&mut buf, &Value::Float(f64::NAN));
        assert_eq!(buf, b"null");
    }

    #[test]
    fn debug_values_are_escaped() {
        let mut buf = Vec::new();
        write_value(&mut buf, &Value::Any(std::sync::Arc::new("quoted")));
        assert_eq!(String::from_utf8(buf).unwrap(), r#""\"quoted\"""#);
    }

    #[test]
    fn line_is_one_object() {
        let out = JsonFormatter::default().format(&LogRecord::new(Level::Warn, "disk \"low\""));
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(r#"{"time":""#));
        assert!(text.contains(r#""level":"WARN","message":"disk \"low\"""#));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn custom_timestamp_is_escaped() {
        let record = LogRecord::new(Level::Info, "m");
        let config = FormatConfig {
            timestamp_format: Some("%Y\"%m".into()),
            ..Default::default()
        };
        let json = render(&record, config);
        let time = json["time"].as_str().unwrap();
        assert_eq!(time, record.timestamp.format("%Y\"%m").to_string());
    }

    #[test]
    fn reserved_field_keys_are_prefixed() {
        let record = LogRecord::new(Level::Info, "m")
            .with_field(Field::str("message", "dup"))
            .with_field(Field::int("level", 7))
            .with_field(Field::bool("caller", true));
        let json = render(&record, FormatConfig::default());
        assert_eq!(json["message"], "m");
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["fields.message"], "dup");
        assert_eq!(json["fields.level"], 7);
        assert_eq!(json["fields.caller"], true);
    }
}
