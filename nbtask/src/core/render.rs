//! Rendering of materialized parameters into injectable cell source.
//!
//! The parameter cell is replaced with one assignment statement per
//! parameter. The generated source must be parseable by the notebook's
//! execution environment, so values render as kernel literals (the default
//! Jupyter kernel parses Python literal notation: `None`, `True`,
//! single-quoted strings, `[...]`, `{...}`).

use indexmap::IndexMap;
use serde_json::Value;

/// Render one `name = literal` line per entry, in map insertion order.
///
/// An empty mapping renders as an empty string.
pub fn render_assignments(params: &IndexMap<String, Value>) -> String {
    let mut buf = String::new();
    for (name, value) in params {
        buf.push_str(name);
        buf.push_str(" = ");
        buf.push_str(&render_literal(value));
        buf.push('\n');
    }
    buf
}

/// Render a single value as a kernel literal.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => render_string(text),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(entries) => {
            let rendered: Vec<String> = entries
                .iter()
                .map(|(key, item)| format!("{}: {}", render_string(key), render_literal(item)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

fn render_string(text: &str) -> String {
    let mut buf = String::with_capacity(text.len() + 2);
    buf.push('\'');
    for c in text.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\'' => buf.push_str("\\'"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => buf.push_str(&format!("\\x{:02x}", c as u32)),
            c => buf.push(c),
        }
    }
    buf.push('\'');
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_scalars_as_kernel_literals() {
        assert_eq!(render_literal(&json!(null)), "None");
        assert_eq!(render_literal(&json!(true)), "True");
        assert_eq!(render_literal(&json!(false)), "False");
        assert_eq!(render_literal(&json!(42)), "42");
        assert_eq!(render_literal(&json!(2.5)), "2.5");
        assert_eq!(render_literal(&json!("report")), "'report'");
    }

    #[test]
    fn escapes_strings() {
        assert_eq!(render_literal(&json!("it's\na\tpath\\x")), "'it\\'s\\na\\tpath\\\\x'");
    }

    #[test]
    fn renders_nested_collections() {
        // serde_json orders object keys; the rendered dict follows suit.
        let value = json!({"rows": [1, 2], "meta": {"deep": null}});
        assert_eq!(
            render_literal(&value),
            "{'meta': {'deep': None}, 'rows': [1, 2]}"
        );
    }

    /// Verifies assignments come out one per line in insertion order, so the
    /// injected cell is reproducible across runs.
    #[test]
    fn renders_assignments_in_insertion_order() {
        let mut params = IndexMap::new();
        params.insert("zeta".to_string(), json!(1));
        params.insert("alpha".to_string(), json!("x"));
        assert_eq!(render_assignments(&params), "zeta = 1\nalpha = 'x'\n");
    }

    #[test]
    fn empty_mapping_renders_empty_string() {
        assert_eq!(render_assignments(&IndexMap::new()), "");
    }
}
