//! Hierarchical task identity derived from artifact paths.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Ordered name tuple identifying a task, e.g. `("sub", "analysis")` for
/// `sub/analysis.ipynb` relative to the discovery root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskName(Vec<String>);

impl TaskName {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// Single-part name, the default for a task constructed from one file.
    pub fn single(part: impl Into<String>) -> Self {
        Self(vec![part.into()])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Default task identity: the relative path's components, with the artifact
/// extension stripped from the file component.
pub fn name_from_relative_path(relative: &Path) -> TaskName {
    let mut parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(last) = parts.last_mut()
        && let Some(stem) = Path::new(last.as_str()).file_stem()
    {
        *last = stem.to_string_lossy().into_owned();
    }
    TaskName(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_file_yields_single_part() {
        let name = name_from_relative_path(Path::new("report.ipynb"));
        assert_eq!(name.parts(), ["report"]);
    }

    #[test]
    fn nested_file_keeps_directory_components() {
        let name = name_from_relative_path(Path::new("sub/analysis.ipynb"));
        assert_eq!(name.parts(), ["sub", "analysis"]);
        assert_eq!(name.to_string(), "sub/analysis");
    }

    #[test]
    fn only_the_file_extension_is_stripped() {
        let name = name_from_relative_path(Path::new("daily.reports/load.ipynb"));
        assert_eq!(name.parts(), ["daily.reports", "load"]);
    }
}
