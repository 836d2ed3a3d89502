use chrono::{DateTime, Utc};
use log_dispatch::{CallerInfo, Field, FormatConfig, Formatter, JsonFormatter, Level, LogRecord};
use serde_json::Value;
use std::borrow::Cow;
use std::io;
use std::time::Duration;

fn parse(record: &LogRecord, config: FormatConfig) -> Value {
    let out = JsonFormatter::new(config).format(record);
    assert_eq!(out.last(), Some(&b'\n'));
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn every_scalar_kind_round_trips() {
    let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_789).unwrap();
    let err = io::Error::new(io::ErrorKind::Other, "disk \"full\"");
    let record = LogRecord::new(Level::Error, "line one\nline \"two\"\t\\")
        .with_field(Field::str("user", "zoë"))
        .with_field(Field::int("count", -42))
        .with_field(Field::uint("big", u64::MAX))
        .with_field(Field::float("ratio", 0.5))
        .with_field(Field::bool("ok", false))
        .with_field(Field::time("at", at))
        .with_field(Field::duration("took", Duration::from_micros(1500)))
        .with_field(Field::error("err", &err))
        .with_field(Field::any("tags", vec!["a", "b"]));

    let json = parse(&record, FormatConfig::default());

    assert_eq!(json["level"], "ERROR");
    assert_eq!(json["message"], "line one\nline \"two\"\t\\");
    assert!(DateTime::parse_from_rfc3339(json["time"].as_str().unwrap()).is_ok());
    assert_eq!(json["user"], "zoë");
    assert_eq!(json["count"], -42);
    assert_eq!(json["big"], i64::MAX);
    assert_eq!(json["ratio"], 0.5);
    assert_eq!(json["ok"], false);
    assert_eq!(
        DateTime::parse_from_rfc3339(json["at"].as_str().unwrap()).unwrap(),
        at
    );
    assert_eq!(json["took"], 1_500_000);
    assert_eq!(json["err"], "disk \"full\"");
    assert_eq!(json["tags"], r#"["a", "b"]"#);
    assert!(json.get("caller").is_none());
}

#[test]
fn field_order_follows_insertion() {
    let record = LogRecord::new(Level::Info, "ordered")
        .with_field(Field::int("z", 1))
        .with_field(Field::int("a", 2));
    let out = String::from_utf8(JsonFormatter::default().format(&record)).unwrap();
    assert!(out.find("\"z\"").unwrap() < out.find("\"a\"").unwrap());
}

#[test]
fn non_finite_floats_become_null() {
    let record = LogRecord::new(Level::Info, "nan")
        .with_field(Field::float("a", f64::NAN))
        .with_field(Field::float("b", f64::INFINITY));
    let json = parse(&record, FormatConfig::default());
    assert!(json["a"].is_null());
    assert!(json["b"].is_null());
}

#[test]
fn caller_object_when_enabled() {
    let record = LogRecord::new(Level::Warn, "where").with_caller(CallerInfo {
        file: Cow::Borrowed("src/service/handler.rs"),
        line: 77,
        function: Cow::Borrowed("service::handler"),
    });
    let config = FormatConfig {
        include_caller: true,
        ..Default::default()
    };
    let json = parse(&record, config);
    assert_eq!(json["caller"]["file"], "handler.rs");
    assert_eq!(json["caller"]["line"], 77);
    assert_eq!(json["caller"]["function"], "service::handler");
}

#[test]
fn custom_timestamp_format() {
    let mut record = LogRecord::new(Level::Info, "stamp");
    record.timestamp = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    let config = FormatConfig {
        timestamp_format: Some("%d/%m/%Y".into()),
        ..Default::default()
    };
    assert_eq!(parse(&record, config)["time"], "01/01/1970");
}
