//! Execution configuration for the command-based notebook runner (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Runner configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Command prefix used to execute notebooks (e.g. `["jupyter", "nbconvert"]`).
    pub execute_command: Vec<String>,

    /// Wall-clock budget for one notebook execution in seconds.
    pub execute_timeout_secs: u64,

    /// Truncate execution stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Kernel to execute with; `None` uses the notebook's own kernel spec.
    pub kernel_name: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            execute_command: vec!["jupyter".to_string(), "nbconvert".to_string()],
            execute_timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
            kernel_name: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.execute_command.is_empty() || self.execute_command[0].trim().is_empty() {
            return Err(anyhow!("execute_command must be a non-empty array"));
        }
        if self.execute_timeout_secs == 0 {
            return Err(anyhow!("execute_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunnerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunnerConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nbtask.toml");
        let cfg = RunnerConfig {
            kernel_name: Some("python3".to_string()),
            ..RunnerConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn rejects_empty_execute_command() {
        let cfg = RunnerConfig {
            execute_command: Vec::new(),
            ..RunnerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
