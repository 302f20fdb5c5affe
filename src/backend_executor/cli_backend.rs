//! Model CLIs driven as subprocesses

use super::types::{BackendError, BackendExecutor, ModelResponse, PromptRequest};
use crate::config::BackendConfig;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs a model CLI such as `gemini -p` once per prompt
///
/// The prompt goes in as the last argument, or on stdin when
/// `prompt_stdin` is set (needed once an SDK file no longer fits on a
/// command line). A system prompt, if any, is prepended.
#[derive(Debug, Clone)]
pub struct CliBackend {
    name: String,
    config: BackendConfig,
}

impl CliBackend {
    pub fn new(name: impl Into<String>, config: &BackendConfig) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
        }
    }

    fn command(&self, request: &PromptRequest, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.config.prompt_stdin {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.arg(prompt).stdin(Stdio::null());
        }
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

fn joined_prompt(request: &PromptRequest) -> String {
    match &request.system {
        Some(system) => format!("{}\n\n{}", system, request.prompt),
        None => request.prompt.clone(),
    }
}

#[async_trait]
impl BackendExecutor for CliBackend {
    async fn execute(&self, request: &PromptRequest) -> Result<ModelResponse, BackendError> {
        let start = Instant::now();
        let prompt = joined_prompt(request);
        let limit = self.config.timeout();

        let mut child = self.command(request, &prompt).spawn().map_err(|e| {
            BackendError::Unavailable(format!("failed to spawn '{}': {}", self.config.command, e))
        })?;

        // Fed from its own task so a child that never reads stdin cannot
        // hold the call past the timeout.
        let feeder = child.stdin.take().map(|mut stdin| {
            let bytes = prompt.into_bytes();
            tokio::spawn(async move {
                let written = stdin.write_all(&bytes).await;
                drop(stdin);
                written
            })
        });

        tracing::debug!(backend = %self.name, command = %self.config.command, "spawned backend");
        let waited = tokio::time::timeout(limit, child.wait_with_output()).await;

        if let Some(feeder) = feeder {
            if !feeder.is_finished() {
                feeder.abort();
            } else if let Ok(Err(e)) = feeder.await {
                tracing::debug!(backend = %self.name, error = %e, "backend closed stdin early");
            }
        }

        let output = match waited {
            Err(_) => return Err(BackendError::Timeout(limit)),
            Ok(Err(e)) => {
                return Err(BackendError::Unavailable(format!(
                    "failed to wait for '{}': {}",
                    self.config.command, e
                )));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(BackendError::Exited {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(
            backend = %self.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = text.len(),
            "backend answered"
        );
        let mut response = ModelResponse::new(text, start.elapsed());
        if let Some(model) = &self.config.model {
            response = response.with_model(model.clone());
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        let which = Command::new("which")
            .arg(&self.config.command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        matches!(
            tokio::time::timeout(Duration::from_secs(5), which).await,
            Ok(Ok(status)) if status.success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(command: &str, timeout: u64, prompt_stdin: bool) -> CliBackend {
        CliBackend::new(
            command,
            &BackendConfig {
                command: command.into(),
                timeout,
                prompt_stdin,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_prompt_as_last_argument() {
        let response = backend("echo", 10, false)
            .execute(&PromptRequest::new("Hello, SDK"))
            .await
            .unwrap();
        assert_eq!(response.text.trim(), "Hello, SDK");
    }

    #[tokio::test]
    async fn test_system_prompt_leads() {
        let request = PromptRequest::new("user part").with_system("system part");
        let response = backend("echo", 10, false).execute(&request).await.unwrap();
        assert_eq!(response.text.trim(), "system part\n\nuser part");
    }

    #[tokio::test]
    async fn test_prompt_on_stdin() {
        let request = PromptRequest::new(r#"{"search_text": [], "replacement_text": []}"#);
        let response = backend("cat", 10, true).execute(&request).await.unwrap();
        assert!(response.text.contains("search_text"));
    }

    #[tokio::test]
    async fn test_large_stdin_prompt_to_child_that_never_reads() {
        // `sleep` ignores stdin, so a 1 MiB prompt fills the pipe
        let config = BackendConfig {
            command: "sleep".into(),
            args: vec!["10".into()],
            timeout: 1,
            prompt_stdin: true,
            ..Default::default()
        };
        let backend = CliBackend::new("sleep", &config);

        let start = Instant::now();
        let result = backend
            .execute(&PromptRequest::new("x".repeat(1 << 20)))
            .await;

        assert!(matches!(result, Err(BackendError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout() {
        let result = backend("sleep", 1, false)
            .execute(&PromptRequest::new("10"))
            .await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let result = backend("false", 10, false).execute(&PromptRequest::new("")).await;
        assert!(matches!(result, Err(BackendError::Exited { .. })));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let missing = backend("definitely_not_a_real_command_12345", 10, false);
        let result = missing.execute(&PromptRequest::new("test")).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
        assert!(!missing.is_available().await);
        assert!(backend("echo", 10, false).is_available().await);
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = BackendConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "pwd".into()],
            ..Default::default()
        };
        let request = PromptRequest::new("sh").in_dir(dir.path());
        let response = CliBackend::new("sh", &config).execute(&request).await.unwrap();
        let reported = std::fs::canonicalize(response.text.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
