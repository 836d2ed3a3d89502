use crate::field::Field;
use crate::level::Level;
use crate::pool::{Pool, Reusable};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::panic::Location;
use std::sync::OnceLock;

/// Fields reserved in a freshly allocated record.
pub const DEFAULT_FIELD_CAPACITY: usize = 8;

const RECORD_POOL_SIZE: usize = 1024;

/// Source location of the logging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    pub file: Cow<'static, str>,
    pub line: u32,
    pub function: Cow<'static, str>,
}

impl CallerInfo {
    /// File name without its directories.
    pub fn short_file(&self) -> &str {
        self.file.rsplit(['/', '\\']).next().unwrap_or_default()
    }
}

impl From<&'static Location<'static>> for CallerInfo {
    fn from(location: &'static Location<'static>) -> Self {
        CallerInfo {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            function: Cow::Borrowed(""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    /// Rendered in insertion order.
    pub fields: Vec<Field>,
    pub caller: Option<CallerInfo>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: Vec::with_capacity(DEFAULT_FIELD_CAPACITY),
            caller: None,
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_caller(mut self, caller: CallerInfo) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Overwrite this record in place, reusing its message and field storage.
    pub fn fill(
        &mut self,
        timestamp: DateTime<Utc>,
        level: Level,
        message: &str,
        context: &[Field],
        fields: &[Field],
        caller: Option<&CallerInfo>,
    ) {
        self.timestamp = timestamp;
        self.level = level;
        self.message.clear();
        self.message.push_str(message);
        self.fields.clear();
        self.fields.extend_from_slice(context);
        self.fields.extend_from_slice(fields);
        self.caller = caller.cloned();
    }

    /// Copy `other` into this record, reusing its storage.
    pub fn copy_from(&mut self, other: &LogRecord) {
        self.timestamp = other.timestamp;
        self.level = other.level;
        self.message.clone_from(&other.message);
        self.fields.clone_from(&other.fields);
        self.caller.clone_from(&other.caller);
    }
}

impl Default for LogRecord {
    fn default() -> Self {
        LogRecord::new(Level::Info, String::new())
    }
}

impl Reusable for LogRecord {
    fn fresh() -> Self {
        LogRecord::default()
    }

    fn reset(&mut self) {
        self.message.clear();
        self.fields.clear();
        self.caller = None;
    }

    fn reusable(&self) -> bool {
        self.message.capacity() <= crate::pool::MAX_POOLED_BUFFER
    }
}

fn pool() -> &'static Pool<LogRecord> {
    static POOL: OnceLock<Pool<LogRecord>> = OnceLock::new();
    POOL.get_or_init(|| Pool::new(RECORD_POOL_SIZE))
}

/// Take an empty record from the process-wide pool, stamped with the
/// current time.
pub fn acquire() -> Box<LogRecord> {
    let mut record = pool().get();
    record.timestamp = Utc::now();
    record
}

/// Hand a record back to the process-wide pool. Only call this once no
/// other stage will read it.
pub fn release(record: Box<LogRecord>) {
    pool().put(record);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_reuses_storage_and_orders_fields() {
        let mut record = LogRecord::default();
        record.message.reserve(64);
        let cap = record.message.capacity();

        let ctx = [Field::str("service", "api")];
        let call = [Field::int("attempt", 2)];
        record.fill(Utc::now(), Level::Warn, "retrying", &ctx, &call, None);

        assert_eq!(record.message, "retrying");
        assert_eq!(record.message.capacity(), cap);
        let keys: Vec<_> = record.fields.iter().map(|f| f.key.as_ref()).collect();
        assert_eq!(keys, ["service", "attempt"]);
    }

    #[test]
    fn released_records_come_back_empty() {
        let mut record = acquire();
        record.message.push_str("payload");
        record.fields.push(Field::bool("x", true));
        record.caller = Some(CallerInfo::from(Location::caller()));
        release(record);

        let record = acquire();
        assert!(record.message.is_empty());
        assert!(record.fields.is_empty());
        assert!(record.caller.is_none());
    }

    #[test]
    fn short_file_strips_directories() {
        let caller = CallerInfo {
            file: Cow::Borrowed("src/handlers/user.rs"),
            line: 10,
            function: Cow::Borrowed(""),
        };
        assert_eq!(caller.short_file(), "user.rs");
    }

    #[test]
    fn copy_from_duplicates_everything() {
        let src = LogRecord::new(Level::Error, "boom")
            .with_field(Field::int("code", 500))
            .with_caller(CallerInfo::from(Location::caller()));
        let mut dst = LogRecord::default();
        dst.copy_from(&src);

        assert_eq!(dst.level, Level::Error);
        assert_eq!(dst.message, "boom");
        assert_eq!(dst.fields.len(), 1);
        assert_eq!(dst.caller, src.caller);
    }
}
