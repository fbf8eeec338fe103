//! Engine configuration stored in `planner.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::Strategy;
use crate::plan::{DEFAULT_MAX_REPLANS, DEFAULT_REPLANNING_THRESHOLD};

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE_NAME: &str = "planner.toml";

/// Engine configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Planning and execution discipline.
    pub strategy: Strategy,

    /// In-flight cap for the bounded-parallel executor.
    pub max_parallel_tasks: usize,

    /// Failed fraction above which the adaptive executor replans.
    pub replanning_threshold: f64,

    /// Upper bound on replanning cycles per objective.
    pub max_replans: u32,

    /// Result/error previews in replanning and summary prompts are cut to this many characters.
    pub preview_chars: usize,

    /// Byte budget for a rendered prompt.
    pub prompt_budget_bytes: usize,

    pub collaborator: CollaboratorConfig,
}

/// Child-process collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Command that reads a prompt on stdin and answers on stdout (e.g. `["codex","exec","-"]`).
    pub command: Vec<String>,

    /// Per-call wall-clock limit in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_parallel_tasks: 3,
            replanning_threshold: DEFAULT_REPLANNING_THRESHOLD,
            max_replans: DEFAULT_MAX_REPLANS,
            preview_chars: 200,
            prompt_budget_bytes: 40_000,
            collaborator: CollaboratorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_tasks == 0 {
            return Err(anyhow!("max_parallel_tasks must be > 0"));
        }
        if !(self.replanning_threshold > 0.0 && self.replanning_threshold <= 1.0) {
            return Err(anyhow!("replanning_threshold must be in (0, 1]"));
        }
        if self.preview_chars == 0 {
            return Err(anyhow!("preview_chars must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.collaborator.command.is_empty() || self.collaborator.command[0].trim().is_empty()
        {
            return Err(anyhow!("collaborator.command must be a non-empty array"));
        }
        if self.collaborator.timeout_secs == 0 {
            return Err(anyhow!("collaborator.timeout_secs must be > 0"));
        }
        if self.collaborator.output_limit_bytes == 0 {
            return Err(anyhow!("collaborator.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
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
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.strategy, Strategy::Adaptive);
        assert_eq!(cfg.max_parallel_tasks, 3);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join(CONFIG_FILE_NAME);
        let cfg = EngineConfig {
            strategy: Strategy::Parallel,
            max_parallel_tasks: 5,
            ..EngineConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "strategy = \"sequential\"\n[collaborator]\ntimeout_secs = 5\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.strategy, Strategy::Sequential);
        assert_eq!(cfg.collaborator.timeout_secs, 5);
        assert_eq!(cfg.collaborator.command, CollaboratorConfig::default().command);
        assert_eq!(cfg.preview_chars, 200);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let cases = [
            EngineConfig {
                max_parallel_tasks: 0,
                ..EngineConfig::default()
            },
            EngineConfig {
                replanning_threshold: 0.0,
                ..EngineConfig::default()
            },
            EngineConfig {
                replanning_threshold: 1.5,
                ..EngineConfig::default()
            },
            EngineConfig {
                collaborator: CollaboratorConfig {
                    command: vec![" ".to_string()],
                    ..CollaboratorConfig::default()
                },
                ..EngineConfig::default()
            },
        ];
        for cfg in cases {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn invalid_file_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_parallel_tasks = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_parallel_tasks"));
    }
}
