//! Orchestration for one notebook-backed task.
//!
//! A [`NotebookTask`] runs in phases: materialize the parameter bundle,
//! preprocess (inject resolved parameters into the tagged cell), delegate
//! execution to the runner collaborator, and finish by invalidating the
//! cached artifact so the next run fetches a clean copy. The runner drives
//! the success/failure/finish hook protocol; the lifecycle drives it itself
//! only when a failure occurs before execution can be delegated, so hooks
//! fire exactly once on every path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::conditions::ConditionMetadata;
use crate::core::naming::TaskName;
use crate::core::render::render_assignments;
use crate::error::ResolveError;
use crate::io::notebook::{Notebook, NotebookStore};
use crate::io::params::ParameterBundle;
use crate::io::runner::{FailureHook, FinishHook, NotebookRunner, RunRequest, RunStatus, SuccessHook, TaskHooks};
use crate::meta::{discover_parameter_names, extract_conditions};

/// Default tag of the cell that receives injected parameters.
pub const PARAMETER_TAG: &str = "parameter";

/// Marker line prefixed to every generated parameter cell.
pub const PARAMETER_CELL_MARKER: &str = "# autogenerated parameter cell\n";

/// Hook invoked after parameter injection, before execution.
pub type PreprocessHook = Box<dyn Fn(&mut Notebook, &IndexMap<String, Value>) + Send + Sync>;

/// Lazy-loaded, invalidatable handle to the notebook artifact.
///
/// The first access fetches from the backing store; `invalidate` drops the
/// cached object so the next access re-fetches. Ownership guarantees that no
/// stale reference survives invalidation.
pub struct NotebookHandle {
    path: PathBuf,
    store: Arc<dyn NotebookStore>,
    cached: Option<Notebook>,
}

impl NotebookHandle {
    pub fn new(path: impl Into<PathBuf>, store: Arc<dyn NotebookStore>) -> Self {
        Self {
            path: path.into(),
            store,
            cached: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// Fetch on first access, then serve the cached object.
    pub fn get(&mut self) -> Result<&mut Notebook> {
        if self.cached.is_none() {
            debug!(path = %self.path.display(), "fetching notebook");
            let notebook = self
                .store
                .fetch(&self.path)
                .with_context(|| format!("fetch notebook {}", self.path.display()))?;
            self.cached = Some(notebook);
        }
        Ok(self.cached.as_mut().expect("cached above"))
    }

    /// Drop the cached object; the next `get` re-fetches from the store.
    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!(path = %self.path.display(), "invalidated cached notebook");
        }
    }
}

impl fmt::Debug for NotebookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotebookHandle")
            .field("path", &self.path)
            .field("loaded", &self.cached.is_some())
            .finish()
    }
}

/// A notebook-backed unit of work.
pub struct NotebookTask {
    action: PathBuf,
    name: TaskName,
    parameter_tag: String,
    clear_outputs: bool,
    param_names: Vec<String>,
    conditions: ConditionMetadata,
    on_preprocess: Option<PreprocessHook>,
    hooks: TaskHooks,
    handle: NotebookHandle,
}

impl NotebookTask {
    /// Construct a task for a notebook path. The default name is the file
    /// stem; discovery and callers override it for hierarchical identities.
    pub fn new(action: impl Into<PathBuf>, store: Arc<dyn NotebookStore>) -> Self {
        let action = action.into();
        let name = action
            .file_stem()
            .map(|stem| TaskName::single(stem.to_string_lossy().into_owned()))
            .unwrap_or_else(|| TaskName::single(action.to_string_lossy().into_owned()));
        let handle = NotebookHandle::new(action.clone(), store);
        Self {
            action,
            name,
            parameter_tag: PARAMETER_TAG.to_string(),
            clear_outputs: true,
            param_names: Vec::new(),
            conditions: ConditionMetadata::default(),
            on_preprocess: None,
            hooks: TaskHooks::default(),
            handle,
        }
    }

    /// Construct a task from a file, reading its condition metadata (absent
    /// cell means no conditions) and declared parameter names.
    pub fn from_file(action: impl Into<PathBuf>, store: Arc<dyn NotebookStore>) -> Result<Self> {
        let action = action.into();
        let notebook = store
            .fetch(&action)
            .with_context(|| format!("fetch notebook {}", action.display()))?;
        let conditions = extract_conditions(&notebook)
            .or_else(|err| match err {
                crate::error::ExtractError::MissingCell(_) => Ok(ConditionMetadata::default()),
                other => Err(other),
            })
            .with_context(|| format!("extract conditions from {}", action.display()))?;
        let param_names = discover_parameter_names(&notebook);
        Ok(Self::new(action, store)
            .with_conditions(conditions)
            .with_param_names(param_names))
    }

    pub fn with_name(mut self, name: TaskName) -> Self {
        self.name = name;
        self
    }

    pub fn with_parameter_tag(mut self, tag: impl Into<String>) -> Self {
        self.parameter_tag = tag.into();
        self
    }

    pub fn with_clear_outputs(mut self, clear_outputs: bool) -> Self {
        self.clear_outputs = clear_outputs;
        self
    }

    pub fn with_param_names(mut self, param_names: Vec<String>) -> Self {
        self.param_names = param_names;
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionMetadata) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn on_preprocess(mut self, hook: PreprocessHook) -> Self {
        self.on_preprocess = Some(hook);
        self
    }

    pub fn on_success(mut self, hook: SuccessHook) -> Self {
        self.hooks.on_success = Some(hook);
        self
    }

    pub fn on_failure(mut self, hook: FailureHook) -> Self {
        self.hooks.on_failure = Some(hook);
        self
    }

    pub fn on_finish(mut self, hook: FinishHook) -> Self {
        self.hooks.on_finish = Some(hook);
        self
    }

    pub fn action(&self) -> &Path {
        &self.action
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn conditions(&self) -> &ConditionMetadata {
        &self.conditions
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Execute one run: materialize → preprocess → execute → finish.
    ///
    /// Resolution errors propagate to the caller; every later failure is
    /// routed through the hook protocol and reported via the returned
    /// status. The artifact handle is invalidated before returning, success
    /// or failure, so the next run fetches a clean artifact.
    #[instrument(skip_all, fields(task = %self.name))]
    pub fn run<R: NotebookRunner>(
        &mut self,
        runner: &R,
        parameters: &ParameterBundle,
    ) -> Result<RunStatus, ResolveError> {
        let resolved = parameters.materialize()?;

        let status = match self.preprocess(&resolved) {
            Ok(()) => self.execute(runner),
            Err(err) => {
                warn!(err = %err, "preprocessing failed");
                self.hooks.fail(&err)
            }
        };

        self.finish(status);
        Ok(status)
    }

    /// Inject resolved parameters into the tagged cell. A missing parameter
    /// cell is a no-op: the task proceeds unparameterized.
    fn preprocess(&mut self, parameters: &IndexMap<String, Value>) -> Result<()> {
        debug!(parameters = parameters.len(), "preprocessing");
        let notebook = self.handle.get()?;
        match notebook.cell_index_by_tag(&self.parameter_tag) {
            None => {
                debug!(tag = %self.parameter_tag, "no parameter cell, running unparameterized");
            }
            Some(index) => {
                let mut source = String::from(PARAMETER_CELL_MARKER);
                source.push_str(&render_assignments(parameters));
                notebook
                    .overwrite_cell_source(index, &source)
                    .context("overwrite parameter cell")?;
            }
        }
        if let Some(hook) = &self.on_preprocess {
            hook(notebook, parameters);
        }
        Ok(())
    }

    /// Delegate the run to the runner, which owns the hook protocol.
    fn execute<R: NotebookRunner>(&mut self, runner: &R) -> RunStatus {
        let Self {
            action,
            parameter_tag,
            clear_outputs,
            hooks,
            handle,
            ..
        } = self;
        let notebook = match handle.get() {
            Ok(notebook) => notebook,
            Err(err) => return hooks.fail(&err),
        };
        runner.run(RunRequest {
            action,
            notebook,
            hooks,
            clear_outputs: *clear_outputs,
            parameter_tag,
        })
    }

    /// Invalidate the cached artifact so the next run re-fetches. Runs
    /// unconditionally after every run.
    fn finish(&mut self, status: RunStatus) {
        debug!(?status, "run finished");
        self.handle.invalidate();
    }
}

impl fmt::Debug for NotebookTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotebookTask")
            .field("action", &self.action)
            .field("name", &self.name)
            .field("parameter_tag", &self.parameter_tag)
            .field("clear_outputs", &self.clear_outputs)
            .field("param_names", &self.param_names)
            .field("conditions", &self.conditions)
            .finish()
    }
}
