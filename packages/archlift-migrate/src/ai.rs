//! AI backend process contract.
//!
//! Each provider is an external command: prompt on stdin, response on
//! stdout, non-zero exit signals failure. Availability is probed with
//! `--version`. Timeouts are imposed by the block executor, not here.

use crate::error::{MigrateError, Result};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AiProvider {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
}

impl AiProvider {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
        }
    }

    /// `<command> --version` exits zero when the backend is usable.
    pub async fn probe(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    pub async fn invoke(&self, prompt: &str) -> Result<String> {
        debug!("Invoking AI provider '{}' ({} chars)", self.name, prompt.len());
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MigrateError::Config(format!(
                    "Cannot spawn AI provider '{}' ({}): {}",
                    self.name, self.command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(MigrateError::BlockFailure {
                block: self.name.clone(),
                kind: "provider".into(),
                message: format!(
                    "provider exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Closed provider set for a run; `--ai-provider` selects from it.
pub struct AiProviderRegistry {
    providers: BTreeMap<String, AiProvider>,
}

impl AiProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(AiProvider::new("claude", "claude", vec!["-p".into()]));
        registry.register(AiProvider::new("codex", "codex", vec!["exec".into()]));
        registry.register(AiProvider::new("gemini", "gemini", vec![]));
        registry
    }

    pub fn register(&mut self, provider: AiProvider) {
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn resolve(&self, name: &str) -> Result<&AiProvider> {
        self.providers.get(name).ok_or_else(|| {
            MigrateError::Config(format!(
                "Unknown AI provider '{}'; valid providers: {}",
                name,
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

impl Default for AiProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_lists_valid_set() {
        let registry = AiProviderRegistry::with_builtins();
        let err = registry.resolve("skynet").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("skynet"));
        assert!(message.contains("claude"));
        assert!(message.contains("gemini"));
    }

    #[tokio::test]
    async fn test_invoke_round_trips_through_cat() {
        // `cat` satisfies the process contract: stdin in, stdout out.
        let provider = AiProvider::new("echo-backend", "cat", vec![]);
        let response = provider.invoke("refactor this bean").await.unwrap();
        assert_eq!(response, "refactor this bean");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let provider = AiProvider::new("broken", "false", vec![]);
        let err = provider.invoke("anything").await.unwrap_err();
        assert!(matches!(err, MigrateError::BlockFailure { .. }));
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let provider = AiProvider::new("ghost", "definitely-not-a-binary-xyz", vec![]);
        assert!(!provider.probe().await);
    }
}
