//! Scheduling metadata evaluated from a notebook's conditions cell.
//!
//! The cell is a small declarative configuration, one `name = expression`
//! binding per line, evaluated into a fresh scratch namespace that is
//! discarded after the five well-known names are read back. Expressions are
//! YAML-flavored literals (`true`, `"daily"`, `[...]`, `{...}`) or bare
//! references to names bound earlier in the same cell. The resulting values
//! are opaque to this crate and handed unmodified to the external scheduler.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractError;

const START_CONDITION: &str = "start_condition";
const END_CONDITION: &str = "end_condition";
const RUN_CONDITION: &str = "run_condition";
const DEPENDENT: &str = "dependent";
const EXECUTION: &str = "execution";

/// Per-task scheduling predicates, each absent unless the conditions cell
/// defines it. Produced once per notebook file and not mutated afterward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionMetadata {
    pub start_cond: Option<Value>,
    pub end_cond: Option<Value>,
    pub run_cond: Option<Value>,
    pub dependent: Option<Value>,
    pub execution: Option<Value>,
}

impl ConditionMetadata {
    /// Merge per-file values over shared defaults; a concrete file value
    /// wins, an absent field falls back to the shared one.
    pub fn merge_over(self, shared: &ConditionMetadata) -> ConditionMetadata {
        ConditionMetadata {
            start_cond: self.start_cond.or_else(|| shared.start_cond.clone()),
            end_cond: self.end_cond.or_else(|| shared.end_cond.clone()),
            run_cond: self.run_cond.or_else(|| shared.run_cond.clone()),
            dependent: self.dependent.or_else(|| shared.dependent.clone()),
            execution: self.execution.or_else(|| shared.execution.clone()),
        }
    }
}

/// Evaluate conditions cell source in a fresh, disposable namespace.
///
/// Bindings beyond the five well-known names are evaluated (they may be
/// referenced by later lines) and then dropped with the namespace.
pub fn eval_conditions(source: &str) -> Result<ConditionMetadata, ExtractError> {
    let mut namespace: HashMap<String, Value> = HashMap::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, expression)) = line.split_once('=') else {
            return Err(ExtractError::Malformed {
                line: idx + 1,
                message: format!("expected 'name = expression', got '{}'", raw.trim_end()),
            });
        };
        let name = name.trim();
        if !is_identifier(name) {
            return Err(ExtractError::Malformed {
                line: idx + 1,
                message: format!("invalid binding name '{name}'"),
            });
        }
        let value = eval_expression(expression.trim(), &namespace)
            .map_err(|message| ExtractError::Malformed { line: idx + 1, message })?;
        namespace.insert(name.to_string(), value);
    }

    Ok(ConditionMetadata {
        start_cond: namespace.remove(START_CONDITION),
        end_cond: namespace.remove(END_CONDITION),
        run_cond: namespace.remove(RUN_CONDITION),
        dependent: namespace.remove(DEPENDENT),
        execution: namespace.remove(EXECUTION),
    })
}

/// A bare identifier bound earlier in the cell is a reference; everything
/// else is a YAML literal (so unquoted words like `daily` are strings).
fn eval_expression(expression: &str, namespace: &HashMap<String, Value>) -> Result<Value, String> {
    if expression.is_empty() {
        return Err("empty expression".to_string());
    }
    if is_identifier(expression)
        && let Some(bound) = namespace.get(expression)
    {
        return Ok(bound.clone());
    }
    let parsed: serde_yaml::Value =
        serde_yaml::from_str(expression).map_err(|err| format!("unparsable expression: {err}"))?;
    serde_json::to_value(parsed).map_err(|err| format!("unrepresentable expression: {err}"))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
