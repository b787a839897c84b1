//! Notebook artifact access: tagged-cell lookup, source rewrite, storage.
//!
//! The notebook is treated as opaque JSON apart from the small contract this
//! crate needs: find a cell by tag, read its source, overwrite its source,
//! and clear code-cell outputs. Unknown structure is preserved on write.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::debug;

/// A parsed notebook document.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    value: Value,
}

impl Notebook {
    /// Wrap a parsed notebook, requiring only that `cells` is an array.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.get("cells").and_then(Value::as_array).is_none() {
            return Err(anyhow!("notebook has no cells array"));
        }
        Ok(Self { value })
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    fn cells(&self) -> &[Value] {
        self.value
            .get("cells")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn cells_mut(&mut self) -> &mut Vec<Value> {
        self.value
            .get_mut("cells")
            .and_then(Value::as_array_mut)
            .expect("cells array checked at construction")
    }

    /// Index of the first cell carrying `tag` in `metadata.tags`.
    pub fn cell_index_by_tag(&self, tag: &str) -> Option<usize> {
        self.cells().iter().position(|cell| {
            cell_tags(cell).any(|candidate| candidate == tag)
        })
    }

    /// Cell source as one string; handles both nbformat source shapes
    /// (plain string and array of lines).
    pub fn cell_source(&self, index: usize) -> Option<String> {
        let source = self.cells().get(index)?.get("source")?;
        match source {
            Value::String(text) => Some(text.clone()),
            Value::Array(lines) => Some(
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<String>(),
            ),
            _ => None,
        }
    }

    /// Destructively replace a cell's source (full replace, not append).
    pub fn overwrite_cell_source(&mut self, index: usize, source: &str) -> Result<()> {
        let cell = self
            .cells_mut()
            .get_mut(index)
            .ok_or_else(|| anyhow!("cell index {index} out of range"))?;
        let object = cell
            .as_object_mut()
            .ok_or_else(|| anyhow!("cell {index} is not an object"))?;
        let lines: Vec<Value> = source
            .split_inclusive('\n')
            .map(|line| Value::String(line.to_string()))
            .collect();
        object.insert("source".to_string(), Value::Array(lines));
        Ok(())
    }

    /// Empty outputs and execution counts of every code cell.
    pub fn clear_outputs(&mut self) {
        for cell in self.cells_mut() {
            let Some(object) = cell.as_object_mut() else {
                continue;
            };
            if object.get("cell_type").and_then(Value::as_str) != Some("code") {
                continue;
            }
            object.insert("outputs".to_string(), json!([]));
            object.insert("execution_count".to_string(), Value::Null);
        }
    }
}

fn cell_tags(cell: &Value) -> impl Iterator<Item = &str> {
    cell.get("metadata")
        .and_then(|metadata| metadata.get("tags"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Fetch of a notebook artifact by path.
///
/// A trait seam so tests can substitute counting or scripted stores; the
/// production store reads from the filesystem.
pub trait NotebookStore: Send + Sync {
    fn fetch(&self, path: &Path) -> Result<Notebook>;
}

/// Store backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsNotebookStore;

impl NotebookStore for FsNotebookStore {
    fn fetch(&self, path: &Path) -> Result<Notebook> {
        load_notebook(path)
    }
}

/// Load a notebook from disk.
pub fn load_notebook(path: &Path) -> Result<Notebook> {
    debug!(path = %path.display(), "loading notebook");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read notebook {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse notebook {}", path.display()))?;
    Notebook::from_value(value).with_context(|| format!("invalid notebook {}", path.display()))
}

/// Atomically write a notebook to disk (temp file + rename).
pub fn write_notebook(path: &Path, notebook: &Notebook) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(notebook.as_value())?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("notebook path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("ipynb.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp notebook {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace notebook {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{code_cell, notebook};

    #[test]
    fn finds_first_cell_by_tag() {
        let nb = notebook(vec![
            code_cell("import this\n", &[]),
            code_cell("x = 1\n", &["parameter"]),
            code_cell("x = 2\n", &["parameter"]),
        ]);
        assert_eq!(nb.cell_index_by_tag("parameter"), Some(1));
        assert_eq!(nb.cell_index_by_tag("conditions"), None);
    }

    #[test]
    fn reads_string_and_array_sources() {
        let mut nb = notebook(vec![code_cell("a = 1\nb = 2\n", &[])]);
        assert_eq!(nb.cell_source(0).as_deref(), Some("a = 1\nb = 2\n"));

        nb.overwrite_cell_source(0, "c = 3\nd = 4").expect("overwrite");
        // Overwrite stores the array-of-lines shape; reading joins it back.
        assert_eq!(nb.cell_source(0).as_deref(), Some("c = 3\nd = 4"));
    }

    #[test]
    fn overwrite_replaces_rather_than_appends() {
        let mut nb = notebook(vec![code_cell("old = True\n", &["parameter"])]);
        nb.overwrite_cell_source(0, "new = False\n").expect("overwrite");
        let source = nb.cell_source(0).expect("source");
        assert!(!source.contains("old"));
        assert_eq!(source, "new = False\n");
    }

    #[test]
    fn clear_outputs_touches_only_code_cells() {
        let mut nb = notebook(vec![code_cell("print('x')\n", &[])]);
        {
            let cells = nb
                .value
                .get_mut("cells")
                .and_then(Value::as_array_mut)
                .expect("cells");
            cells[0]["outputs"] = json!([{"output_type": "stream", "text": ["x\n"]}]);
            cells[0]["execution_count"] = json!(3);
        }
        nb.clear_outputs();
        assert_eq!(nb.as_value()["cells"][0]["outputs"], json!([]));
        assert_eq!(nb.as_value()["cells"][0]["execution_count"], Value::Null);
    }

    #[test]
    fn rejects_documents_without_cells() {
        let err = Notebook::from_value(json!({"nbformat": 4})).unwrap_err();
        assert!(err.to_string().contains("no cells array"));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.ipynb");
        let nb = notebook(vec![code_cell("x = 1\n", &["parameter"])]);

        write_notebook(&path, &nb).expect("write");
        let loaded = load_notebook(&path).expect("load");
        assert_eq!(loaded, nb);
    }
}
