//! Error types for the tutorial harness
//!
//! Messages name the script, attribute or file involved so a failing
//! scenario can be diagnosed from the report alone.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tutorial harness
#[derive(Error, Debug)]
pub enum Error {
    // === Script Execution Errors ===
    #[error("Tutorial script not found: '{}'", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Failed to launch tutorial script '{}': {error}", .path.display())]
    ScriptLaunch { path: PathBuf, error: String },

    #[error(
        "Tutorial script '{}' failed with exit code {code:?}{}",
        .path.display(),
        format_stderr(.stderr)
    )]
    ScriptFailed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Tutorial script '{}' finished without writing results", .0.display())]
    MissingResults(PathBuf),

    #[error("Malformed results from '{}': {reason}", .path.display())]
    MalformedResults { path: PathBuf, reason: String },

    // === Assertion Errors ===
    #[error("{attribute}: expected {expected} ± {delta}, got {actual}")]
    AssertionMismatch {
        attribute: String,
        actual: f64,
        expected: f64,
        delta: f64,
    },

    #[error("Attribute '{name}' not found. Available: {available:?}")]
    AttributeNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Attribute '{name}': index {index} out of range (length {len})")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("Attribute '{name}': {reason}")]
    AttributeShape { name: String, reason: String },

    #[error("Results differ between identically seeded runs at '{0}'")]
    NonDeterministic(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Capability probe failed: {0}")]
    CapabilityProbe(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an assertion mismatch error
    pub fn mismatch(attribute: &str, actual: f64, expected: f64, delta: f64) -> Self {
        Self::AssertionMismatch {
            attribute: attribute.to_string(),
            actual,
            expected,
            delta,
        }
    }

    /// Create a malformed results error
    pub fn malformed(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::MalformedResults {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a failed check rather than a broken run
    ///
    /// Failed checks report as `failed`; everything else as `errored`.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Error::AssertionMismatch { .. }
                | Error::AttributeNotFound { .. }
                | Error::IndexOutOfRange { .. }
                | Error::AttributeShape { .. }
                | Error::NonDeterministic(_)
        )
    }
}

/// Last lines of stderr, for error messages
const STDERR_TAIL_LINES: usize = 20;

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    format!("\n--- stderr (tail) ---\n{}", lines[start..].join("\n"))
}
