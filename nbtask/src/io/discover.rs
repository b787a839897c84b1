//! Batch discovery of notebook tasks under a folder.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::conditions::ConditionMetadata;
use crate::core::naming::{TaskName, name_from_relative_path};
use crate::error::ExtractError;
use crate::meta::{discover_parameter_names, extract_conditions};
use crate::io::notebook::NotebookStore;
use crate::task::{NotebookTask, PARAMETER_TAG};

/// Derives a task identity from a path relative to the discovery root.
pub type NameFn = Box<dyn Fn(&Path) -> TaskName + Send + Sync>;

/// Options for [`discover_tasks`].
pub struct DiscoverOptions {
    /// File-name pattern (`*` wildcard); a pattern containing `/` matches
    /// the whole root-relative path instead.
    pub pattern: String,
    /// Tag of the cell that receives injected parameters.
    pub parameter_tag: String,
    /// Clear code-cell outputs before execution.
    pub clear_outputs: bool,
    /// Shared condition defaults; per-file values take precedence.
    pub shared: ConditionMetadata,
    /// Identity derivation; defaults to path components with the artifact
    /// extension stripped.
    pub name_fn: Option<NameFn>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            pattern: "*.ipynb".to_string(),
            parameter_tag: PARAMETER_TAG.to_string(),
            clear_outputs: true,
            shared: ConditionMetadata::default(),
            name_fn: None,
        }
    }
}

impl fmt::Debug for DiscoverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverOptions")
            .field("pattern", &self.pattern)
            .field("parameter_tag", &self.parameter_tag)
            .field("clear_outputs", &self.clear_outputs)
            .field("shared", &self.shared)
            .field("name_fn", &self.name_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Enumerate matching notebook files under `root` and construct one task per
/// file, merging per-file condition metadata over the shared defaults.
///
/// Files are visited in filesystem-enumeration order; callers requiring
/// determinism sort the result. A notebook without a conditions cell simply
/// contributes no overrides; malformed conditions abort discovery.
pub fn discover_tasks(
    root: &Path,
    store: Arc<dyn NotebookStore>,
    options: &DiscoverOptions,
) -> Result<Vec<NotebookTask>> {
    let mut tasks = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("relativize {}", path.display()))?;
        if !matches_pattern(&options.pattern, relative) {
            continue;
        }

        let notebook = store
            .fetch(path)
            .with_context(|| format!("fetch notebook {}", path.display()))?;
        let conditions = match extract_conditions(&notebook) {
            Ok(metadata) => metadata.merge_over(&options.shared),
            Err(ExtractError::MissingCell(_)) => {
                debug!(path = %path.display(), "no conditions cell");
                options.shared.clone()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("extract conditions from {}", path.display()));
            }
        };
        let param_names = discover_parameter_names(&notebook);
        let name = match &options.name_fn {
            Some(name_fn) => name_fn(relative),
            None => name_from_relative_path(relative),
        };

        debug!(task = %name, path = %path.display(), "discovered task");
        tasks.push(
            NotebookTask::new(path, Arc::clone(&store))
                .with_name(name)
                .with_parameter_tag(options.parameter_tag.clone())
                .with_clear_outputs(options.clear_outputs)
                .with_conditions(conditions)
                .with_param_names(param_names),
        );
    }

    Ok(tasks)
}

/// Match a root-relative path against the pattern. `*` matches any run of
/// characters except the path separator.
fn matches_pattern(pattern: &str, relative: &Path) -> bool {
    if pattern.contains('/') {
        return glob_match(pattern, &relative.to_string_lossy());
    }
    match relative.file_name() {
        Some(name) => glob_match(pattern, &name.to_string_lossy()),
        None => false,
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[char], text: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some((&'*', rest)) => (0..=text.len())
                .take_while(|&skip| !text[..skip].contains(&'/'))
                .any(|skip| inner(rest, &text[skip..])),
            Some((&c, rest)) => text.split_first().is_some_and(|(&t, text_rest)| {
                t == c && inner(rest, text_rest)
            }),
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    inner(&pattern, &text)
}
