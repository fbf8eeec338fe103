//! Collaborator abstractions for text generation and task execution.
//!
//! The [`TextGenerator`] and [`TaskExecutor`] traits decouple planning and
//! execution from the actual backend (by default a `codex exec` child
//! process). Tests use scripted collaborators that return predetermined
//! outputs without spawning processes.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::io::config::CollaboratorConfig;
use crate::io::process::run_command_with_timeout;

/// Produces decomposition, dependency, replanning and summary text from prompts.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Performs the work described by one leaf task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, description: &str) -> Result<String>;
}

/// Collaborator that pipes its input into a configured command.
///
/// The same process answers both planning prompts and task descriptions.
#[derive(Debug, Clone)]
pub struct CommandCollaborator {
    config: CollaboratorConfig,
}

impl CommandCollaborator {
    pub fn new(config: CollaboratorConfig) -> Self {
        Self { config }
    }

    #[instrument(skip_all, fields(program = %self.config.command.first().map(String::as_str).unwrap_or(""), input_bytes = input.len()))]
    async fn call(&self, input: &str) -> Result<String> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("collaborator command is empty"))?;
        info!("invoking collaborator command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_command_with_timeout(
            cmd,
            Some(input.as_bytes()),
            self.config.timeout(),
            self.config.output_limit_bytes,
        )
        .await
        .with_context(|| format!("run collaborator {}", program))?;

        if output.timed_out {
            warn!(
                timeout_secs = self.config.timeout_secs,
                "collaborator timed out"
            );
            return Err(anyhow!(
                "collaborator timed out after {}s",
                self.config.timeout_secs
            ));
        }
        if !output.success() {
            let code = output.status.and_then(|status| status.code());
            warn!(exit_code = ?code, "collaborator failed");
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "collaborator failed with status {:?}: {}{}",
                code,
                stderr.trim(),
                output.stderr_truncated_notice("collaborator").trim_end()
            ));
        }

        let mut text = output.stdout_text().trim().to_string();
        if text.is_empty() {
            return Err(anyhow!("collaborator produced no output"));
        }
        text.push_str(output.stdout_truncated_notice("collaborator").trim_end());
        debug!(output_bytes = text.len(), "collaborator completed");
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for CommandCollaborator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.call(prompt).await.context("generate text")
    }
}

#[async_trait]
impl TaskExecutor for CommandCollaborator {
    async fn execute(&self, description: &str) -> Result<String> {
        self.call(description).await.context("execute task")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn collaborator(script: &str) -> CommandCollaborator {
        CommandCollaborator::new(CollaboratorConfig {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_secs: 5,
            output_limit_bytes: 1_000,
        })
    }

    #[tokio::test]
    async fn returns_trimmed_stdout() {
        let out = collaborator("cat; echo")
            .generate("  1. Draft outline ")
            .await
            .expect("generate");
        assert_eq!(out, "1. Draft outline");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = collaborator("echo boom >&2; exit 3")
            .execute("task")
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Some(3)"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        let err = collaborator("cat >/dev/null").execute("task").await.unwrap_err();
        assert!(format!("{err:#}").contains("no output"));
    }
}
