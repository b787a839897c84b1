//! Typed errors exposed at the library seam.
//!
//! Resolution and metadata-extraction errors surface to the caller so a
//! scheduler can react to them (e.g. treat a missing conditions cell as
//! non-fatal). Execution failures are deliberately *not* represented here:
//! they are consumed by the runner boundary and delivered through the
//! failure hook instead of the error channel (see [`crate::io::runner`]).

use std::path::PathBuf;

use thiserror::Error;

/// A deferred value failed to resolve.
///
/// Carries the originating lookup and its cause. Not retried locally.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("read document {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse document {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("convert document {path} to a value tree")]
    Convert {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing key '{key}' in document {path}")]
    MissingKey { path: PathBuf, key: String },

    #[error("index {index} out of range (sequence has {len} items) in document {path}")]
    IndexOutOfRange {
        path: PathBuf,
        index: usize,
        len: usize,
    },

    #[error("cannot index into a {kind} with '{key}' in document {path}")]
    NotIndexable {
        path: PathBuf,
        kind: &'static str,
        key: String,
    },

    /// A nested lookup key resolved to something unusable as a key.
    #[error("derived lookup key is not a string or unsigned integer: {0}")]
    BadKey(serde_json::Value),

    #[error("derive function failed: {0:#}")]
    Function(anyhow::Error),

    /// Wraps the failing entry's name when a bundle materializes.
    #[error("resolve parameter '{name}'")]
    Entry {
        name: String,
        #[source]
        source: Box<ResolveError>,
    },
}

/// Metadata extraction from a tagged notebook cell failed.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The required tagged cell is absent. The caller decides whether this
    /// is fatal; batch discovery treats it as "no per-file overrides".
    #[error("no cell tagged '{0}'")]
    MissingCell(String),

    #[error("conditions cell line {line}: {message}")]
    Malformed { line: usize, message: String },
}
