//! Named parameter bundles handed to a task invocation.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::core::render::render_assignments;
use crate::error::ResolveError;
use crate::io::value::ValueSource;

/// Mapping from parameter name to deferred value, in insertion order.
///
/// Entries resolve independently: no entry may rely on another entry's side
/// effects within the same bundle. Callers needing composition nest
/// [`ValueSource`] instances explicitly.
#[derive(Debug, Clone, Default)]
pub struct ParameterBundle {
    entries: IndexMap<String, ValueSource>,
}

impl ParameterBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<ValueSource>) {
        self.entries.insert(name.into(), source.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve every entry exactly once, in insertion order.
    ///
    /// The first failing entry aborts materialization; its error carries the
    /// entry name.
    pub fn materialize(&self) -> Result<IndexMap<String, Value>, ResolveError> {
        debug!(entries = self.entries.len(), "materializing parameter bundle");
        let mut resolved = IndexMap::with_capacity(self.entries.len());
        for (name, source) in &self.entries {
            let value = source.resolve().map_err(|source| ResolveError::Entry {
                name: name.clone(),
                source: Box::new(source),
            })?;
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    /// Materialize, then render one `name = literal` assignment per entry.
    pub fn extract_as_code(&self) -> Result<String, ResolveError> {
        Ok(render_assignments(&self.materialize()?))
    }
}

impl<N, S> FromIterator<(N, S)> for ParameterBundle
where
    N: Into<String>,
    S: Into<ValueSource>,
{
    fn from_iter<I: IntoIterator<Item = (N, S)>>(iter: I) -> Self {
        let mut bundle = ParameterBundle::new();
        for (name, source) in iter {
            bundle.insert(name, source);
        }
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_bundle_materializes_to_empty_mapping_and_code() {
        let bundle = ParameterBundle::new();
        assert!(bundle.materialize().expect("materialize").is_empty());
        assert_eq!(bundle.extract_as_code().expect("extract"), "");
    }

    #[test]
    fn materialize_keeps_insertion_order() {
        let mut bundle = ParameterBundle::new();
        bundle.insert("zeta", json!(1));
        bundle.insert("alpha", json!("report"));

        let resolved = bundle.materialize().expect("materialize");
        let names: Vec<&String> = resolved.keys().collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(
            bundle.extract_as_code().expect("extract"),
            "zeta = 1\nalpha = 'report'\n"
        );
    }

    /// Each materialize call resolves each entry exactly once.
    #[test]
    fn materialize_resolves_each_entry_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let mut bundle = ParameterBundle::new();
        bundle.insert(
            "n",
            ValueSource::derived(
                move |_kwargs| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(1))
                },
                indexmap::IndexMap::new(),
            ),
        );

        bundle.materialize().expect("materialize");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        bundle.materialize().expect("materialize");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_entry_reports_its_name() {
        let mut bundle = ParameterBundle::new();
        bundle.insert("ok", json!(1));
        bundle.insert(
            "broken",
            ValueSource::derived(
                |_kwargs| Err(anyhow::anyhow!("no value")),
                indexmap::IndexMap::new(),
            ),
        );

        let err = bundle.materialize().unwrap_err();
        match err {
            ResolveError::Entry { ref name, .. } => assert_eq!(name, "broken"),
            ref other => panic!("unexpected error: {other}"),
        }
    }
}
