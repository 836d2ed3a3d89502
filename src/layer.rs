use crate::field::{Field, Value};
use crate::level::Level;
use crate::record::{self, CallerInfo, LogRecord};
use crate::sink::Sink;
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target of this crate's own diagnostics. Events under it are never
/// fed back into a sink.
pub const INTERNAL_TARGET: &str = "log_dispatch";

/// `tracing_subscriber` layer that turns events into pooled
/// [`LogRecord`]s and hands them to a [`Sink`].
///
/// TRACE events are recorded as [`Level::Debug`]. Delivery errors cannot
/// be returned from `on_event`; failed writes are counted in the sink's
/// [`Snapshot::failed`](crate::stats::Snapshot::failed).
pub struct SinkLayer {
    sink: Arc<dyn Sink>,
    min_level: Level,
    include_caller: bool,
}

impl SinkLayer {
    pub fn new(sink: Arc<dyn Sink>, min_level: Level) -> Self {
        SinkLayer {
            sink,
            min_level,
            include_caller: true,
        }
    }

    /// Attach the event's file, line and module path as caller metadata.
    pub fn with_caller(mut self, enabled: bool) -> Self {
        self.include_caller = enabled;
        self
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(INTERNAL_TARGET) {
            return;
        }
        let level = Level::from(*meta.level());
        if level < self.min_level {
            return;
        }

        let mut record = record::acquire();
        record.level = level;
        event.record(&mut FieldVisitor { record: &mut record });
        record.fields.push(Field::str("target", meta.target()));

        if self.include_caller {
            if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
                record.caller = Some(CallerInfo {
                    file: Cow::Borrowed(file),
                    line,
                    function: Cow::Borrowed(meta.module_path().unwrap_or_default()),
                });
            }
        }

        let _ = self.sink.handle_owned(record);
    }
}

/// Copies event fields into a record; `message` becomes the record's
/// message.
pub struct FieldVisitor<'a> {
    pub record: &'a mut LogRecord,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.record.message.push_str(value);
        } else {
            self.record.fields.push(Field::str(field.name(), value.to_owned()));
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.record.fields.push(Field::int(field.name(), value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.record.fields.push(Field::uint(field.name(), value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.record.fields.push(Field::float(field.name(), value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.record.fields.push(Field::bool(field.name(), value));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.record.fields.push(Field::new(
            field.name(),
            Value::Error(Cow::Owned(value.to_string())),
        ));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.record.message, "{value:?}");
        } else {
            self.record
                .fields
                .push(Field::str(field.name(), format!("{value:?}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop_sink::NoopSink;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[test]
    fn filters_by_level_and_internal_target() {
        let sink = Arc::new(NoopSink::new());
        let layer = SinkLayer::new(sink.clone(), Level::Info);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("below threshold");
            tracing::info!(n = 1, "counted");
            tracing::error!(target: "log_dispatch", "own diagnostics");
            tracing::warn!("counted too");
        });

        assert_eq!(sink.stats().processed, 2);
    }
}
