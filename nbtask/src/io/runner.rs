//! Execution delegation for notebook tasks.
//!
//! The [`NotebookRunner`] trait decouples the task lifecycle from the actual
//! execution backend (currently `jupyter nbconvert --execute`). Tests use
//! scripted runners that invoke the hook protocol without spawning
//! processes.
//!
//! # Hook protocol
//!
//! A runner receives the lifecycle hooks and is solely responsible for
//! invoking exactly one of success/failure, followed by finish, exactly once
//! each per run. The [`TaskHooks::succeed`] and [`TaskHooks::fail`] helpers
//! perform a complete, correctly ordered protocol round; implementations
//! must call exactly one of them exactly once.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::io::config::RunnerConfig;
use crate::io::notebook::{Notebook, load_notebook, write_notebook};
use crate::io::process::run_command_with_timeout;

/// Outcome of one notebook run, delivered to the finish hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

pub type SuccessHook = Box<dyn Fn(&Notebook) + Send + Sync>;
pub type FailureHook = Box<dyn Fn(&anyhow::Error) + Send + Sync>;
pub type FinishHook = Box<dyn Fn(RunStatus) + Send + Sync>;

/// Lifecycle hook slots, 0 or 1 registered each.
#[derive(Default)]
pub struct TaskHooks {
    pub on_success: Option<SuccessHook>,
    pub on_failure: Option<FailureHook>,
    pub on_finish: Option<FinishHook>,
}

impl TaskHooks {
    /// Deliver the success arm of the protocol: success hook, then finish.
    pub fn succeed(&self, executed: &Notebook) -> RunStatus {
        if let Some(hook) = &self.on_success {
            hook(executed);
        }
        if let Some(hook) = &self.on_finish {
            hook(RunStatus::Succeeded);
        }
        RunStatus::Succeeded
    }

    /// Deliver the failure arm of the protocol: failure hook, then finish.
    pub fn fail(&self, error: &anyhow::Error) -> RunStatus {
        if let Some(hook) = &self.on_failure {
            hook(error);
        }
        if let Some(hook) = &self.on_finish {
            hook(RunStatus::Failed);
        }
        RunStatus::Failed
    }
}

/// Parameters for one delegated notebook run.
pub struct RunRequest<'a> {
    /// Path of the backing notebook artifact.
    pub action: &'a Path,
    /// The preprocessed in-memory notebook.
    pub notebook: &'a mut Notebook,
    /// Hook slots the runner must drive (see module docs).
    pub hooks: &'a TaskHooks,
    /// Clear code-cell outputs before execution.
    pub clear_outputs: bool,
    /// Tag of the parameter cell, for backends that re-inject parameters.
    pub parameter_tag: &'a str,
}

/// Abstraction over notebook execution backends.
///
/// Errors never escape `run`: they are consumed into the failure hook and
/// reported through the returned status, so one failing task cannot abort a
/// batch or a sibling task.
pub trait NotebookRunner {
    fn run(&self, request: RunRequest<'_>) -> RunStatus;
}

/// Runner that executes the artifact in place via a conversion command
/// (`jupyter nbconvert --to notebook --execute --inplace` by default).
///
/// The injected notebook is written back to the artifact path before
/// execution; the artifact is mutated destructively, not versioned.
pub struct CommandRunner {
    config: RunnerConfig,
    log_path: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            log_path: None,
        }
    }

    /// Also write the captured execution output to `path` after each run.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    #[instrument(skip_all, fields(action = %request.action.display()))]
    fn execute(&self, request: &mut RunRequest<'_>) -> Result<Notebook> {
        if request.clear_outputs {
            request.notebook.clear_outputs();
        }
        write_notebook(request.action, request.notebook)
            .with_context(|| format!("persist injected notebook {}", request.action.display()))?;

        let mut parts = self.config.execute_command.iter();
        let program = parts.next().ok_or_else(|| anyhow!("empty execute command"))?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        cmd.arg("--to").arg("notebook").arg("--execute").arg("--inplace");
        if let Some(kernel) = &self.config.kernel_name {
            cmd.arg(format!("--ExecutePreprocessor.kernel_name={kernel}"));
        }
        cmd.arg(request.action);

        info!(program = %program, "executing notebook");
        let output = run_command_with_timeout(
            cmd,
            Duration::from_secs(self.config.execute_timeout_secs),
            self.config.output_limit_bytes,
        )?;
        if let Some(log_path) = &self.log_path {
            output.write_log(log_path)?;
        }
        if output.timed_out {
            bail!(
                "notebook execution timed out after {}s",
                self.config.execute_timeout_secs
            );
        }
        if !output.status.success() {
            bail!(
                "notebook execution failed with status {:?}",
                output.status.code()
            );
        }

        debug!("reloading executed notebook");
        load_notebook(request.action)
    }
}

impl NotebookRunner for CommandRunner {
    fn run(&self, mut request: RunRequest<'_>) -> RunStatus {
        match self.execute(&mut request) {
            Ok(executed) => request.hooks.succeed(&executed),
            Err(err) => {
                warn!(err = %err, "notebook run failed");
                request.hooks.fail(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{code_cell, notebook};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hooks(
        success: &Arc<AtomicUsize>,
        failure: &Arc<AtomicUsize>,
        finish: &Arc<AtomicUsize>,
    ) -> TaskHooks {
        let (success, failure, finish) =
            (Arc::clone(success), Arc::clone(failure), Arc::clone(finish));
        TaskHooks {
            on_success: Some(Box::new(move |_nb: &Notebook| {
                success.fetch_add(1, Ordering::SeqCst);
            })),
            on_failure: Some(Box::new(move |_err: &anyhow::Error| {
                failure.fetch_add(1, Ordering::SeqCst);
            })),
            on_finish: Some(Box::new(move |_status: RunStatus| {
                finish.fetch_add(1, Ordering::SeqCst);
            })),
        }
    }

    /// An unrunnable command must surface as a failure-hook invocation, not
    /// an error return.
    #[test]
    fn unrunnable_command_routes_to_failure_hook() {
        let temp = tempfile::tempdir().expect("tempdir");
        let action = temp.path().join("report.ipynb");
        let mut nb = notebook(vec![code_cell("x = 1\n", &["parameter"])]);

        let success = Arc::new(AtomicUsize::new(0));
        let failure = Arc::new(AtomicUsize::new(0));
        let finish = Arc::new(AtomicUsize::new(0));
        let hooks = counting_hooks(&success, &failure, &finish);

        let config = RunnerConfig {
            execute_command: vec!["nbtask-no-such-binary".to_string()],
            ..RunnerConfig::default()
        };
        let runner = CommandRunner::new(config);
        let status = runner.run(RunRequest {
            action: &action,
            notebook: &mut nb,
            hooks: &hooks,
            clear_outputs: true,
            parameter_tag: "parameter",
        });

        assert_eq!(status, RunStatus::Failed);
        assert_eq!(success.load(Ordering::SeqCst), 0);
        assert_eq!(failure.load(Ordering::SeqCst), 1);
        assert_eq!(finish.load(Ordering::SeqCst), 1);
        // The injected notebook was still persisted before the spawn failed.
        assert!(action.exists());
    }

    #[test]
    fn succeed_and_fail_helpers_order_finish_last() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (for_success, for_finish) = (Arc::clone(&order), Arc::clone(&order));
        let hooks = TaskHooks {
            on_success: Some(Box::new(move |_nb: &Notebook| {
                for_success.lock().expect("lock").push("success");
            })),
            on_failure: None,
            on_finish: Some(Box::new(move |_status: RunStatus| {
                for_finish.lock().expect("lock").push("finish");
            })),
        };

        let nb = notebook(vec![code_cell("pass\n", &[])]);
        assert_eq!(hooks.succeed(&nb), RunStatus::Succeeded);
        assert_eq!(*order.lock().expect("lock"), ["success", "finish"]);
    }
}
