//! Crate error types
//!
//! Error taxonomy for capture startup and server plumbing. Crash-during-run
//! and per-subscriber delivery failures are not represented here: they are
//! logged and drive recovery transitions instead of propagating as errors.

use std::io;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, StreamError>;

/// Error type for capture and server operations
#[derive(Debug)]
pub enum StreamError {
    /// No supported camera backend was detected on this host
    NoCameraAvailable,
    /// The capture process itself failed to spawn (missing binary, permissions)
    CaptureLaunchFailed(io::Error),
    /// Listener/socket-level I/O failure
    Io(io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NoCameraAvailable => write!(f, "No camera available"),
            StreamError::CaptureLaunchFailed(e) => {
                write!(f, "Failed to launch capture process: {}", e)
            }
            StreamError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::NoCameraAvailable => None,
            StreamError::CaptureLaunchFailed(e) | StreamError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StreamError::NoCameraAvailable.to_string(),
            "No camera available"
        );

        let e = StreamError::CaptureLaunchFailed(io::Error::new(
            io::ErrorKind::NotFound,
            "no such file",
        ));
        assert!(e.to_string().contains("Failed to launch"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let e = StreamError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(e.source().is_some());
        assert!(StreamError::NoCameraAvailable.source().is_none());
    }
}
