use std::io;
use std::path::PathBuf;

/// Errors returned by sinks, destinations and their constructors.
///
/// Capacity problems (a full queue) are never reported here; they are
/// resolved by the sink's overflow policy and show up in its stats.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("rotation of {path} failed: {source}")]
    Rotation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The rename step of a rotation failed; the original file was
    /// reopened and logging continues without rotating.
    #[error("could not rename {path} for rotation: {source}")]
    RenameFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rotation failed: {rename}, reopen failed: {reopen}")]
    Reopen { rename: io::Error, reopen: io::Error },

    #[error("sink is closed")]
    Closed,

    #[error("async consumer stopped: {0}")]
    ConsumerStopped(String),

    #[error("failed to spawn consumer thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled,
}

pub type Result<T, E = SinkError> = std::result::Result<T, E>;

impl SinkError {
    /// Carry this error through an `io::Result` boundary such as
    /// [`Destination::write_all`](crate::destination::Destination::write_all).
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}

/// Unwraps errors packed with `into_io`; any other I/O error is a write failure.
impl From<io::Error> for SinkError {
    fn from(err: io::Error) -> Self {
        let wrapped = err.get_ref().is_some_and(|inner| inner.is::<SinkError>());
        if !wrapped {
            return SinkError::Write(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<SinkError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => SinkError::Write(io::Error::other(other)),
            None => SinkError::Write(io::Error::from(io::ErrorKind::Other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_round_trip_keeps_variant() {
        let err = SinkError::RenameFailed {
            path: PathBuf::from("app.log"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        match SinkError::from(err.into_io()) {
            SinkError::RenameFailed { path, .. } => assert_eq!(path, PathBuf::from("app.log")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_io_errors_are_write_failures() {
        let err = SinkError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(err, SinkError::Write(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
