//! Unified error types for the cig workspace.
//!
//! Failures in this system come in two severities: fatal ones that
//! abort the surrounding operation, and recoverable ones that are
//! logged and absorbed because halting would cost more than a degraded
//! container (cgroup file writes, loopback setup, cleanup unmounts).
//! [`Fault`] makes that distinction explicit so teardown logic can be
//! written once regardless of which phase failed.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CigError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or argument is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A kernel interface (mount, namespace, cgroup) rejected an operation.
    #[error("{op} failed: {source}")]
    Syscall {
        /// Operation that was attempted.
        op: &'static str,
        /// Underlying errno.
        source: std::io::Error,
    },

    /// A netlink operation failed.
    #[error("netlink error: {message}")]
    Net {
        /// Description of the failed network operation.
        message: String,
    },

    /// An image could not be pulled, parsed, or unpacked.
    #[error("image error: {message}")]
    Image {
        /// Description of the image failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CigError {
    /// Wraps this error as a fault that aborts the surrounding operation.
    #[must_use]
    pub fn fatal(self) -> Fault {
        Fault {
            severity: Severity::Fatal,
            source: self,
        }
    }

    /// Wraps this error as a fault that is logged and absorbed.
    #[must_use]
    pub fn recoverable(self) -> Fault {
        Fault {
            severity: Severity::Recoverable,
            source: self,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CigError>;

/// Whether a failure aborts the surrounding operation or is absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged and swallowed; the surrounding operation continues.
    Recoverable,
    /// Propagated; the surrounding operation stops.
    Fatal,
}

/// An error tagged with its severity.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct Fault {
    /// Whether this fault aborts the caller.
    pub severity: Severity,
    /// The underlying error.
    #[source]
    pub source: CigError,
}

/// Resolves a fault according to its severity: recoverable faults are
/// logged under `context` and dropped, fatal ones are returned to the
/// caller.
///
/// # Errors
///
/// Returns the underlying error when the fault is [`Severity::Fatal`].
pub fn absorb(result: std::result::Result<(), Fault>, context: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(fault) => match fault.severity {
            Severity::Recoverable => {
                tracing::warn!(context, error = %fault.source, "continuing past recoverable fault");
                Ok(())
            }
            Severity::Fatal => Err(fault.source),
        },
    }
}

/// Logs a failed best-effort operation and discards the error.
pub fn log_best_effort<T>(result: Result<T>, context: &str) {
    if let Err(e) = result {
        tracing::warn!(context, error = %e, "best-effort operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_error() -> CigError {
        CigError::Config {
            message: "bad value".into(),
        }
    }

    #[test]
    fn absorb_passes_ok_through() {
        assert!(absorb(Ok(()), "noop").is_ok());
    }

    #[test]
    fn absorb_swallows_recoverable_fault() {
        let fault = sample_error().recoverable();
        assert!(absorb(Err(fault), "cgroup write").is_ok());
    }

    #[test]
    fn absorb_propagates_fatal_fault() {
        let fault = sample_error().fatal();
        assert!(absorb(Err(fault), "netns unmount").is_err());
    }

    #[test]
    fn fault_display_matches_source() {
        let fault = sample_error().fatal();
        assert_eq!(fault.to_string(), "invalid configuration: bad value");
    }
}
