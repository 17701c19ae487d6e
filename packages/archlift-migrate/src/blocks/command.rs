//! COMMAND blocks: shell commands with captured output.

use super::BlockOutcome;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub async fn run(
    block_name: &str,
    command: &str,
    working_dir: &Path,
    ctx: &MigrationContext,
) -> Result<BlockOutcome> {
    let rendered = ctx.render(command)?;
    debug!("Command block '{}': {}", block_name, rendered);

    let output = Command::new("sh")
        .arg("-c")
        .arg(&rendered)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code().unwrap_or(-1);

    if !output.status.success() {
        return Err(MigrateError::BlockFailure {
            block: block_name.to_string(),
            kind: "exit_code".into(),
            message: format!("exit code {}: {}", exit_code, stderr.trim()),
        });
    }

    let trimmed = stdout.trim_end_matches('\n').to_string();
    Ok(
        BlockOutcome::of(Value::String(trimmed)).with_message(format!(
            "command succeeded (exit 0, {} bytes stdout)",
            stdout.len()
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MigrationContext {
        MigrationContext::new()
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run("echo", "echo 21", dir.path(), &ctx()).await.unwrap();
        assert_eq!(outcome.primary, Some(Value::String("21".into())));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("fail", "exit 3", dir.path(), &ctx()).await.unwrap_err();
        match err {
            MigrateError::BlockFailure { kind, message, .. } => {
                assert_eq!(kind, "exit_code");
                assert!(message.contains("3"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_command_substitutes_scope() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = MigrationContext::new();
        ctx.set_variable("detected_java_version", "21");
        let outcome = run("echo", "echo v=${detected_java_version}", dir.path(), &ctx)
            .await
            .unwrap();
        let Some(Value::String(stdout)) = outcome.primary else {
            panic!("expected string output");
        };
        assert!(stdout.contains("v=21"));
    }

    #[tokio::test]
    async fn test_unresolved_placeholder_is_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("echo", "echo ${missing}", dir.path(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Template(_)));
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let outcome = run("ls", "ls", dir.path(), &ctx()).await.unwrap();
        let Some(Value::String(stdout)) = outcome.primary else {
            panic!();
        };
        assert!(stdout.contains("marker.txt"));
    }
}
