//! Test-only helpers for constructing notebook fixtures.

use std::path::Path;

use serde_json::{Value, json};

use crate::io::notebook::{Notebook, write_notebook};

/// Create a code cell with the given source and tags.
pub fn code_cell(source: &str, tags: &[&str]) -> Value {
    json!({
        "cell_type": "code",
        "metadata": { "tags": tags },
        "source": source,
        "outputs": [],
        "execution_count": null,
    })
}

/// Create a markdown cell (never matched by tag lookups in these tests).
pub fn markdown_cell(source: &str) -> Value {
    json!({
        "cell_type": "markdown",
        "metadata": {},
        "source": source,
    })
}

/// Assemble a minimal nbformat 4 notebook from cells.
pub fn notebook(cells: Vec<Value>) -> Notebook {
    Notebook::from_value(json!({
        "cells": cells,
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 5,
    }))
    .expect("valid fixture notebook")
}

/// Write a fixture notebook to disk, creating parent directories.
pub fn write_notebook_file(path: &Path, cells: Vec<Value>) {
    write_notebook(path, &notebook(cells)).expect("write fixture notebook");
}
