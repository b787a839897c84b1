//! Per-notebook metadata: scheduling conditions and declared parameters.
//!
//! Both operations inspect tagged cells of an already-fetched notebook.
//! Condition extraction evaluates the cell (in a disposable namespace);
//! parameter-name discovery never executes anything.

use tracing::debug;

use crate::core::conditions::{ConditionMetadata, eval_conditions};
use crate::core::scan::declared_names;
use crate::error::ExtractError;
use crate::io::notebook::Notebook;
use crate::task::PARAMETER_TAG;

/// Tag of the cell carrying scheduling conditions.
pub const CONDITIONS_TAG: &str = "conditions";

/// Extract scheduling metadata from the conditions cell.
///
/// A notebook without a conditions cell fails with
/// [`ExtractError::MissingCell`]; the caller decides whether that is fatal.
pub fn extract_conditions(notebook: &Notebook) -> Result<ConditionMetadata, ExtractError> {
    let Some(index) = notebook.cell_index_by_tag(CONDITIONS_TAG) else {
        return Err(ExtractError::MissingCell(CONDITIONS_TAG.to_string()));
    };
    let source = notebook.cell_source(index).unwrap_or_default();
    let metadata = eval_conditions(&source)?;
    debug!(?metadata, "extracted conditions");
    Ok(metadata)
}

/// Discover declared parameter names by static inspection of the parameter
/// cell. A notebook without one declares nothing.
pub fn discover_parameter_names(notebook: &Notebook) -> Vec<String> {
    let Some(index) = notebook.cell_index_by_tag(PARAMETER_TAG) else {
        return Vec::new();
    };
    let Some(source) = notebook.cell_source(index) else {
        return Vec::new();
    };
    declared_names(&source)
}
