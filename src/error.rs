//! Error types for the provisioning pipeline.
//!
//! One variant per failure class. Unmount failures are deliberately absent:
//! cleanup problems are reported as warnings, never as errors, so a failed
//! `umount` cannot mask a successful extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Target configuration unreadable, unparseable, or empty
    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    /// Required directory could not be created
    #[error("failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ISO download failed (network, HTTP status, or disk write)
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Loopback mount/unmount invocation failed
    #[error("mount operation at {mount_point} failed: {detail}")]
    Mount { mount_point: PathBuf, detail: String },

    /// Boot artifact copy failed
    #[error("failed to copy {src} to {dest}: {source}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Menu template missing/unparseable or destination unwritable
    #[error("menu render failed: {0}")]
    Render(String),

    /// I/O error outside the classes above
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;
