use crate::level::Level;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// How long a `Block` policy waits for queue space by default.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// What an asynchronous sink does with a record when its queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming record.
    #[default]
    DropNewest,
    /// Evict the oldest queued record to make room.
    DropOldest,
    /// Wait up to the timeout for space, then write on the caller's thread.
    Block(#[serde(with = "duration_ms")] Duration),
}

impl OverflowPolicy {
    pub const fn block() -> Self {
        OverflowPolicy::Block(DEFAULT_BLOCK_TIMEOUT)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => f.write_str("DropNewest"),
            OverflowPolicy::DropOldest => f.write_str("DropOldest"),
            OverflowPolicy::Block(timeout) => write!(f, "Block({timeout:?})"),
        }
    }
}

/// Per-level overflow policies, fixed once a sink is built.
///
/// Levels without an entry resolve to [`OverflowPolicy::DropNewest`].
/// The default table blocks for Error and above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPolicies {
    slots: [Option<OverflowPolicy>; Level::COUNT],
}

impl LevelPolicies {
    /// A table with no entries: every level drops the newest record.
    pub const fn empty() -> Self {
        LevelPolicies { slots: [None; Level::COUNT] }
    }

    /// The same policy for every level.
    pub const fn uniform(policy: OverflowPolicy) -> Self {
        LevelPolicies { slots: [Some(policy); Level::COUNT] }
    }

    pub fn with(mut self, level: Level, policy: OverflowPolicy) -> Self {
        self.slots[level.index()] = Some(policy);
        self
    }

    pub fn without(mut self, level: Level) -> Self {
        self.slots[level.index()] = None;
        self
    }

    #[inline]
    pub fn resolve(&self, level: Level) -> OverflowPolicy {
        self.slots[level.index()].unwrap_or_default()
    }
}

impl Default for LevelPolicies {
    fn default() -> Self {
        LevelPolicies::empty()
            .with(Level::Error, OverflowPolicy::block())
            .with(Level::Fatal, OverflowPolicy::block())
            .with(Level::Panic, OverflowPolicy::block())
    }
}

impl FromIterator<(Level, OverflowPolicy)> for LevelPolicies {
    fn from_iter<I: IntoIterator<Item = (Level, OverflowPolicy)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(LevelPolicies::empty(), |table, (level, policy)| table.with(level, policy))
    }
}

/// The end of a blocking enqueue or a shutdown drain, as a plain value.
///
/// A timeout too large to add to the current instant means no deadline:
/// [`Deadline::remaining`] is `None` and the deadline never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Deadline { at: Instant::now().checked_add(timeout) }
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_blocks_error_and_above() {
        let table = LevelPolicies::default();
        assert_eq!(table.resolve(Level::Debug), OverflowPolicy::DropNewest);
        assert_eq!(table.resolve(Level::Warn), OverflowPolicy::DropNewest);
        assert_eq!(table.resolve(Level::Error), OverflowPolicy::block());
        assert_eq!(table.resolve(Level::Panic), OverflowPolicy::block());
    }

    #[test]
    fn unspecified_levels_drop_newest() {
        let table: LevelPolicies = [(Level::Info, OverflowPolicy::DropOldest)].into_iter().collect();
        assert_eq!(table.resolve(Level::Info), OverflowPolicy::DropOldest);
        assert_eq!(table.resolve(Level::Error), OverflowPolicy::DropNewest);
    }

    #[test]
    fn overrides_replace_defaults() {
        let table = LevelPolicies::default()
            .with(Level::Error, OverflowPolicy::DropOldest)
            .without(Level::Fatal);
        assert_eq!(table.resolve(Level::Error), OverflowPolicy::DropOldest);
        assert_eq!(table.resolve(Level::Fatal), OverflowPolicy::DropNewest);
    }

    #[test]
    fn deadline_expiry() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));

        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.expired());
        assert!(deadline.remaining().unwrap() > Duration::from_secs(59));
    }

    #[test]
    fn huge_timeout_is_unbounded() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(!deadline.expired());
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(OverflowPolicy::DropOldest.to_string(), "DropOldest");
        assert_eq!(
            OverflowPolicy::Block(Duration::from_millis(50)).to_string(),
            "Block(50ms)"
        );
    }
}
