//! Environment variable names used by this crate for convenient
//! configuration of sinks from services.
//!
//! These are purely helpers; the core sink types remain decoupled from
//! environment access.

use crate::backend::{parse_target, FormatKind, TargetConfig, TargetError};
use crate::level::Level;
use std::str::FromStr;

/// Target string, e.g. `stdout` or `file:///var/log/app.log?max_size=1048576`.
pub const LOG_DISPATCH_TARGET_ENV: &str = "LOG_DISPATCH_TARGET";

/// `text` or `json`; overrides the target's `format` parameter.
pub const LOG_DISPATCH_FORMAT_ENV: &str = "LOG_DISPATCH_FORMAT";

/// `true` or `false`; overrides the target's `async` parameter.
pub const LOG_DISPATCH_ASYNC_ENV: &str = "LOG_DISPATCH_ASYNC";

/// Queue capacity for asynchronous sinks.
pub const LOG_DISPATCH_BUFFER_ENV: &str = "LOG_DISPATCH_BUFFER";

/// Minimum level, e.g. `debug` or `warn`.
pub const LOG_DISPATCH_LEVEL_ENV: &str = "LOG_DISPATCH_LEVEL";

const DEFAULT_TARGET: &str = "stdout";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an environment variable. Unset yields `None`; a value
/// that does not parse is logged and ignored.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(target: "log_dispatch", key, value = %raw, "ignoring unparsable variable");
            None
        }
    }
}

/// Minimum level from [`LOG_DISPATCH_LEVEL_ENV`].
pub fn level_from_env() -> Option<Level> {
    env_parse(LOG_DISPATCH_LEVEL_ENV)
}

impl TargetConfig {
    /// Build a configuration from the `LOG_DISPATCH_*` variables,
    /// defaulting to `stdout`.
    pub fn from_env() -> Result<TargetConfig, TargetError> {
        let mut cfg = parse_target(&env_or(LOG_DISPATCH_TARGET_ENV, DEFAULT_TARGET))?;
        if let Some(format) = env_parse::<FormatKind>(LOG_DISPATCH_FORMAT_ENV) {
            cfg.format = format;
        }
        if let Some(is_async) = env_parse::<bool>(LOG_DISPATCH_ASYNC_ENV) {
            cfg.is_async = is_async;
        }
        if let Some(buffer_size) = env_parse::<usize>(LOG_DISPATCH_BUFFER_ENV) {
            cfg.buffer_size = buffer_size;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("LOG_DISPATCH_TEST_UNSET_VARIABLE", "dflt"), "dflt");
        assert_eq!(env_parse::<usize>("LOG_DISPATCH_TEST_UNSET_VARIABLE"), None);
    }
}
