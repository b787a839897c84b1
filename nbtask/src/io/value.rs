//! Deferred parameter values.
//!
//! A [`ValueSource`] resolves a parameter either immediately, by invoking a
//! function, or by loading a structured document and indexing into it. Keys
//! for the document lookup may themselves be deferred, which allows
//! data-dependent key paths. Resolution is never memoized: every `resolve`
//! call re-executes its side effects, and callers wanting
//! once-per-run semantics resolve once and hold the result (as
//! [`crate::io::params::ParameterBundle::materialize`] does).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ResolveError;
use crate::io::document::load_document;

/// Named-argument function invoked by [`ValueSource::FunctionDerived`].
pub type ValueFn = Arc<dyn Fn(&IndexMap<String, Value>) -> anyhow::Result<Value> + Send + Sync>;

/// A deferred parameter value.
#[derive(Clone)]
pub enum ValueSource {
    /// A concrete value, returned unchanged.
    Immediate(Value),

    /// A value produced by invoking `func` with `kwargs`. Arguments are
    /// passed as-is, not recursively resolved.
    FunctionDerived {
        func: ValueFn,
        kwargs: IndexMap<String, Value>,
    },

    /// A value read from a structured document by applying `keys` in order.
    DocumentLookup {
        path: PathBuf,
        keys: Vec<LookupKey>,
    },
}

/// One step of a document lookup: a literal key, a literal index, or a
/// nested source resolved to a key before indexing.
#[derive(Debug, Clone)]
pub enum LookupKey {
    Key(String),
    Index(usize),
    Source(Box<ValueSource>),
}

impl ValueSource {
    pub fn immediate(value: impl Into<Value>) -> Self {
        ValueSource::Immediate(value.into())
    }

    pub fn derived<F>(func: F, kwargs: IndexMap<String, Value>) -> Self
    where
        F: Fn(&IndexMap<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        ValueSource::FunctionDerived {
            func: Arc::new(func),
            kwargs,
        }
    }

    pub fn document_lookup(path: impl Into<PathBuf>, keys: Vec<LookupKey>) -> Self {
        ValueSource::DocumentLookup {
            path: path.into(),
            keys,
        }
    }

    /// Resolve to a concrete value, re-executing side effects on every call.
    pub fn resolve(&self) -> Result<Value, ResolveError> {
        match self {
            ValueSource::Immediate(value) => Ok(value.clone()),
            ValueSource::FunctionDerived { func, kwargs } => {
                func(kwargs).map_err(ResolveError::Function)
            }
            ValueSource::DocumentLookup { path, keys } => {
                let mut current = load_document(path)?;
                for key in keys {
                    current = index_into(path, current, key)?;
                }
                Ok(current)
            }
        }
    }
}

impl From<Value> for ValueSource {
    fn from(value: Value) -> Self {
        ValueSource::Immediate(value)
    }
}

impl From<&str> for LookupKey {
    fn from(key: &str) -> Self {
        LookupKey::Key(key.to_string())
    }
}

impl From<String> for LookupKey {
    fn from(key: String) -> Self {
        LookupKey::Key(key)
    }
}

impl From<usize> for LookupKey {
    fn from(index: usize) -> Self {
        LookupKey::Index(index)
    }
}

impl From<ValueSource> for LookupKey {
    fn from(source: ValueSource) -> Self {
        LookupKey::Source(Box::new(source))
    }
}

fn index_into(path: &Path, value: Value, key: &LookupKey) -> Result<Value, ResolveError> {
    match key {
        LookupKey::Key(key) => index_with_key(path, value, key),
        LookupKey::Index(index) => index_with_index(path, value, *index),
        LookupKey::Source(source) => {
            // Nested sources resolve first, to arbitrary depth, so the key
            // path can depend on data.
            match source.resolve()? {
                Value::String(key) => index_with_key(path, value, &key),
                Value::Number(number) => match number.as_u64() {
                    Some(index) => index_with_index(path, value, index as usize),
                    None => Err(ResolveError::BadKey(Value::Number(number))),
                },
                other => Err(ResolveError::BadKey(other)),
            }
        }
    }
}

fn index_with_key(path: &Path, value: Value, key: &str) -> Result<Value, ResolveError> {
    match value {
        Value::Object(mut entries) => entries.remove(key).ok_or_else(|| ResolveError::MissingKey {
            path: path.to_path_buf(),
            key: key.to_string(),
        }),
        other => Err(ResolveError::NotIndexable {
            path: path.to_path_buf(),
            kind: value_kind(&other),
            key: key.to_string(),
        }),
    }
}

fn index_with_index(path: &Path, value: Value, index: usize) -> Result<Value, ResolveError> {
    match value {
        Value::Array(mut items) => {
            if index >= items.len() {
                return Err(ResolveError::IndexOutOfRange {
                    path: path.to_path_buf(),
                    index,
                    len: items.len(),
                });
            }
            Ok(items.swap_remove(index))
        }
        other => Err(ResolveError::NotIndexable {
            path: path.to_path_buf(),
            kind: value_kind(&other),
            key: index.to_string(),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            ValueSource::FunctionDerived { kwargs, .. } => f
                .debug_struct("FunctionDerived")
                .field("func", &"<fn>")
                .field("kwargs", kwargs)
                .finish(),
            ValueSource::DocumentLookup { path, keys } => f
                .debug_struct("DocumentLookup")
                .field("path", path)
                .field("keys", keys)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use serde_json::json;

    #[test]
    fn immediate_returns_the_value_unchanged() {
        for value in [json!(null), json!(true), json!(7), json!("x"), json!([1, {"k": 2}])] {
            assert_eq!(ValueSource::immediate(value.clone()).resolve().expect("resolve"), value);
        }
    }

    /// Two resolves invoke the function twice: no memoization.
    #[test]
    fn function_derived_invokes_per_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut kwargs = IndexMap::new();
        kwargs.insert("base".to_string(), json!(40));

        let source = ValueSource::derived(
            move |kwargs: &IndexMap<String, Value>| {
                counted.fetch_add(1, Ordering::SeqCst);
                let base = kwargs["base"].as_i64().unwrap_or(0);
                Ok(json!(base + 2))
            },
            kwargs,
        );

        assert_eq!(source.resolve().expect("resolve"), json!(42));
        assert_eq!(source.resolve().expect("resolve"), json!(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn function_errors_become_resolve_errors() {
        let source = ValueSource::derived(
            |_kwargs: &IndexMap<String, Value>| Err(anyhow::anyhow!("boom")),
            IndexMap::new(),
        );
        let err = source.resolve().unwrap_err();
        assert!(matches!(err, ResolveError::Function(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn empty_key_list_yields_whole_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.yaml");
        fs::write(&path, "a: 1\nb: [x, y]\n").expect("write");

        let source = ValueSource::document_lookup(&path, Vec::new());
        assert_eq!(source.resolve().expect("resolve"), json!({"a": 1, "b": ["x", "y"]}));
    }

    #[test]
    fn keys_apply_in_declared_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.yaml");
        fs::write(&path, "envs:\n  prod:\n    hosts: [alpha, beta]\n").expect("write");

        let source = ValueSource::document_lookup(
            &path,
            vec!["envs".into(), "prod".into(), "hosts".into(), 1.into()],
        );
        assert_eq!(source.resolve().expect("resolve"), json!("beta"));
    }

    /// A deferred key selects between branches only after it resolves.
    #[test]
    fn nested_source_key_resolves_before_indexing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.yaml");
        fs::write(&path, "left: cold\nright: warm\n").expect("write");

        let pick = ValueSource::derived(
            |_kwargs: &IndexMap<String, Value>| Ok(json!("right")),
            IndexMap::new(),
        );
        let source = ValueSource::document_lookup(&path, vec![pick.into()]);
        assert_eq!(source.resolve().expect("resolve"), json!("warm"));
    }

    #[test]
    fn missing_key_and_bad_index_fail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.yaml");
        fs::write(&path, "items: [only]\n").expect("write");

        let missing = ValueSource::document_lookup(&path, vec!["absent".into()]);
        assert!(matches!(missing.resolve().unwrap_err(), ResolveError::MissingKey { .. }));

        let out_of_range = ValueSource::document_lookup(&path, vec!["items".into(), 3.into()]);
        assert!(matches!(
            out_of_range.resolve().unwrap_err(),
            ResolveError::IndexOutOfRange { len: 1, .. }
        ));

        let scalar_indexed = ValueSource::document_lookup(&path, vec!["items".into(), 0.into(), "k".into()]);
        assert!(matches!(
            scalar_indexed.resolve().unwrap_err(),
            ResolveError::NotIndexable { kind: "string", .. }
        ));
    }

    #[test]
    fn nested_key_resolving_to_bool_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.yaml");
        fs::write(&path, "a: 1\n").expect("write");

        let source =
            ValueSource::document_lookup(&path, vec![ValueSource::immediate(true).into()]);
        assert!(matches!(source.resolve().unwrap_err(), ResolveError::BadKey(_)));
    }
}
