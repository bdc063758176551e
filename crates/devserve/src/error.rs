//! Error handling for the development server.
//!
//! Errors are split the same way the startup chain is: configuration problems
//! ([`ConfigError`]) are raised while the immutable [`ServerConfiguration`] is
//! assembled, everything else surfaces as a [`DevServerError`] variant. Every
//! variant reaching `main` is fatal and maps to exit code 1; the one
//! recoverable "failure" (no free port) is modelled as an
//! [`Outcome`](crate::server::Outcome) instead so it can exit cleanly.
//!
//! [`ServerConfiguration`]: crate::config::ServerConfiguration
//!
//! # Example
//!
//! ```rust,no_run
//! use devserve::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Run devserve from your project root")
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Error returned by the startup chain.
#[derive(Debug, Error)]
pub enum DevServerError {
    #[error("Could not find a required file: {}\n\nHint: Make sure these files exist in your project", display_paths(.0))]
    MissingRequiredFiles(Vec<PathBuf>),

    /// A preflight compatibility check rejected the project
    #[error("{0}")]
    CompatibilityCheckFailed(String),

    #[error("Invalid proxy declaration: {value}\n\nHint: {reason}")]
    InvalidProxyDeclaration { value: String, reason: String },

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Why a compile failed; reported as a compile event, never fatal
    #[error("Failed to compile: {0}")]
    Compile(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// The HTTP server or one of its helpers failed while running
    #[error("Server error: {0}")]
    Server(String),

    #[error("{source}\n\nHint: {hint}")]
    Hinted {
        #[source]
        source: Box<DevServerError>,
        hint: String,
    },
}

impl DevServerError {
    /// Exit code for the process. Anything reaching `main` as an error is
    /// fatal, so this is always 1.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Problems found while assembling the [`ServerConfiguration`].
///
/// [`ServerConfiguration`]: crate::config::ServerConfiguration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// package.json or an explicit config file is missing
    #[error("Config file not found: {}\n\nHint: Run devserve from a directory containing package.json or pass --cwd <dir>", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid JSON in config file: {0}\n\nHint: Use a JSON validator to check syntax")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField { field: String, hint: String },

    /// A setting parsed but is out of range, e.g. `port: 0`
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using `DevServerError` as the default error type.
pub type Result<T, E = DevServerError> = std::result::Result<T, E>;

/// Context helpers for fallible calls in the startup chain.
pub trait ResultExt<T> {
    /// Report a "not found" I/O error as [`DevServerError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Attach a hint shown under the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<DevServerError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            DevServerError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DevServerError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| DevServerError::Hinted {
            source: Box::new(e.into()),
            hint: hint.to_string(),
        })
    }
}

/// Render a startup error for the terminal.
pub fn to_miette(err: DevServerError) -> miette::Report {
    match err {
        DevServerError::Bind { addr, source } => miette::miette!(
            help = "Another process may have claimed the port; try again or set PORT",
            "Failed to bind to {}: {}",
            addr,
            source
        ),
        DevServerError::Hinted { source, hint } => {
            miette::miette!(help = hint, "{}", source)
        }
        other => miette::miette!("{}", other),
    }
}
