//! Structured key/value fields attached to a [`LogRecord`](crate::record::LogRecord).
//!
//! [`Value`] is a closed set of variants so the common scalar kinds are
//! stored inline. Keys and string values are `Cow<'static, str>`: a
//! `&'static str` costs nothing, an owned `String` is moved in. Only
//! [`Value::Any`] always allocates.

use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum Value {
    Str(Cow<'static, str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Nanoseconds since the Unix epoch.
    Time(i64),
    /// Signed nanoseconds.
    Duration(i64),
    /// Rendered error message.
    Error(Cow<'static, str>),
    /// Arbitrary value rendered through `Debug`. Allocates on construction.
    Any(Arc<dyn fmt::Debug + Send + Sync>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Time(v) => f.debug_tuple("Time").field(v).finish(),
            Value::Duration(v) => f.debug_tuple("Duration").field(v).finish(),
            Value::Error(s) => f.debug_tuple("Error").field(s).finish(),
            Value::Any(v) => f.debug_tuple("Any").field(v).finish(),
        }
    }
}

/// Renders the value the way the text formatter prints it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Error(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Time(nanos) => {
                write!(f, "{}", nanos_to_utc(*nanos).format("%Y-%m-%dT%H:%M:%SZ"))
            }
            Value::Duration(nanos) => {
                let d = Duration::from_nanos(nanos.unsigned_abs());
                if *nanos < 0 {
                    write!(f, "-{d:?}")
                } else {
                    write!(f, "{d:?}")
                }
            }
            Value::Any(v) => write!(f, "{v:?}"),
        }
    }
}

pub(crate) fn nanos_to_utc(nanos: i64) -> DateTime<Utc> {
    let secs = nanos.div_euclid(1_000_000_000);
    let sub = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, sub).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<Cow<'static, str>>, value: Value) -> Self {
        Field { key: key.into(), value }
    }

    pub fn str(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Field::new(key, Value::Str(value.into()))
    }

    pub fn int(key: impl Into<Cow<'static, str>>, value: i64) -> Self {
        Field::new(key, Value::Int(value))
    }

    /// Values above `i64::MAX` saturate.
    pub fn uint(key: impl Into<Cow<'static, str>>, value: u64) -> Self {
        Field::new(key, Value::Int(i64::try_from(value).unwrap_or(i64::MAX)))
    }

    pub fn float(key: impl Into<Cow<'static, str>>, value: f64) -> Self {
        Field::new(key, Value::Float(value))
    }

    pub fn bool(key: impl Into<Cow<'static, str>>, value: bool) -> Self {
        Field::new(key, Value::Bool(value))
    }

    pub fn time(key: impl Into<Cow<'static, str>>, value: DateTime<Utc>) -> Self {
        Field::new(key, Value::Time(value.timestamp_nanos_opt().unwrap_or(i64::MAX)))
    }

    pub fn duration(key: impl Into<Cow<'static, str>>, value: Duration) -> Self {
        Field::new(key, Value::Duration(i64::try_from(value.as_nanos()).unwrap_or(i64::MAX)))
    }

    /// Renders the error message eagerly; allocates.
    pub fn error(key: impl Into<Cow<'static, str>>, err: &dyn Error) -> Self {
        Field::new(key, Value::Error(Cow::Owned(err.to_string())))
    }

    /// Boxes an arbitrary value; allocates.
    pub fn any<T>(key: impl Into<Cow<'static, str>>, value: T) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        Field::new(key, Value::Any(Arc::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_text_rendering() {
        assert_eq!(Field::int("n", -7).value.to_string(), "-7");
        assert_eq!(Field::bool("ok", true).value.to_string(), "true");
        assert_eq!(Field::float("r", 0.25).value.to_string(), "0.25");
        assert_eq!(
            Field::duration("d", Duration::from_millis(1500)).value.to_string(),
            "1.5s"
        );
        assert_eq!(Value::Duration(-1_000_000).to_string(), "-1ms");
        assert_eq!(Field::any("v", vec![1, 2]).value.to_string(), "[1, 2]");
    }

    #[test]
    fn time_renders_rfc3339() {
        let ts = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        assert_eq!(Field::time("t", ts).value.to_string(), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn uint_saturates() {
        match Field::uint("big", u64::MAX).value {
            Value::Int(v) => assert_eq!(v, i64::MAX),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn static_keys_are_borrowed() {
        let f = Field::str("k", "v");
        assert!(matches!(f.key, Cow::Borrowed(_)));
        assert!(matches!(f.value, Value::Str(Cow::Borrowed(_))));
    }
}
