//! Structured-document loading for lookup-backed parameters.
//!
//! Documents are YAML files parsed into a `serde_json::Value` tree so the
//! rest of the crate speaks a single value currency.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::ResolveError;

/// Load and parse a YAML document into a nested value tree.
pub fn load_document(path: &Path) -> Result<Value, ResolveError> {
    debug!(path = %path.display(), "loading document");
    let contents = fs::read_to_string(path).map_err(|source| ResolveError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|source| ResolveError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::to_value(parsed).map_err(|source| ResolveError::Convert {
        path: path.to_path_buf(),
        source,
    })
}
