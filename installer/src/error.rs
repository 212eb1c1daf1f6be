//! Error types for the Wheelwright installer.
//!
//! This module defines the semantic error variants surfaced by both install
//! strategies. Every variant that aborts an install carries the path or
//! target it concerns so callers can report it to an end user.

use camino::Utf8PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while installing a package.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// A scheme was requested that the destination's scheme map lacks.
    #[error("no install path configured for scheme {scheme}")]
    DestinationLookup {
        /// Name of the scheme that could not be resolved.
        scheme: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container of a wheel could not be read.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A wheel is structurally unusable (bad filename, missing metadata).
    #[error("invalid wheel {path}: {reason}")]
    InvalidWheel {
        /// Path to the offending wheel.
        path: Utf8PathBuf,
        /// Description of what is wrong with it.
        reason: String,
    },

    /// An archive entry would be written outside its scheme directory.
    #[error("refusing to install entry with unsafe path: {path}")]
    InvalidEntryPath {
        /// The offending path from the archive.
        path: String,
    },

    /// An editable install was requested for something that is not a
    /// directory.
    #[error("cannot install non-directory target {path} in editable mode")]
    EditableTargetNotDirectory {
        /// The rejected target.
        path: Utf8PathBuf,
    },

    /// An external command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        /// Program that was invoked.
        program: String,
        /// Exit status reported by the operating system.
        status: ExitStatus,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The pip fallback failed to install a target.
    #[error("failed to install {target}")]
    PipInstallFailed {
        /// The path or URL that was being installed.
        target: String,
        /// The underlying command failure.
        #[source]
        source: Box<InstallerError>,
    },

    /// Script launchers for this platform cannot be generated.
    #[error("launcher kind {kind} is not supported")]
    UnsupportedLauncher {
        /// The requested launcher kind.
        kind: String,
    },

    /// The environment could not describe its install layout.
    #[error("environment discovery failed: {reason}")]
    EnvironmentDiscovery {
        /// Description of the failure.
        reason: String,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl InstallerError {
    /// Wraps a failed pip invocation with the target it was installing.
    pub(crate) fn pip_install_failed(target: impl Into<String>, source: Self) -> Self {
        Self::PipInstallFailed {
            target: target.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
