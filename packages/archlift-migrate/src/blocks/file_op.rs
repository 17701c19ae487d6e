//! FILE_OPERATION blocks.

use super::BlockOutcome;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::plan::model::FileOperationKind;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub async fn run(
    block_name: &str,
    operation: FileOperationKind,
    path: &str,
    content: Option<&str>,
    destination: Option<&str>,
    ctx: &MigrationContext,
    project_root: &Path,
) -> Result<BlockOutcome> {
    let path = resolve(ctx.render(path)?, project_root);
    debug!("File block '{}': {:?} {}", block_name, operation, path.display());

    let message = match operation {
        FileOperationKind::Create => {
            let content = match content {
                Some(c) => ctx.render(c)?,
                None => String::new(),
            };
            ensure_parent(&path)?;
            tokio::fs::write(&path, content).await?;
            format!("created {}", path.display())
        }
        FileOperationKind::CreateDir => {
            tokio::fs::create_dir_all(&path).await?;
            format!("created directory {}", path.display())
        }
        FileOperationKind::Copy => {
            let dest = destination_path(block_name, destination, ctx, project_root)?;
            ensure_parent(&dest)?;
            tokio::fs::copy(&path, &dest).await?;
            format!("copied {} -> {}", path.display(), dest.display())
        }
        FileOperationKind::Move => {
            let dest = destination_path(block_name, destination, ctx, project_root)?;
            ensure_parent(&dest)?;
            tokio::fs::rename(&path, &dest).await?;
            format!("moved {} -> {}", path.display(), dest.display())
        }
        FileOperationKind::Delete => {
            if path.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
                format!("deleted directory {}", path.display())
            } else if path.exists() {
                tokio::fs::remove_file(&path).await?;
                format!("deleted {}", path.display())
            } else {
                format!("nothing to delete at {}", path.display())
            }
        }
    };

    Ok(BlockOutcome::of(Value::String(path.display().to_string())).with_message(message))
}

fn resolve(rendered: String, project_root: &Path) -> PathBuf {
    let path = PathBuf::from(rendered);
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}

fn destination_path(
    block_name: &str,
    destination: Option<&str>,
    ctx: &MigrationContext,
    project_root: &Path,
) -> Result<PathBuf> {
    let raw = destination.ok_or_else(|| {
        MigrateError::Config(format!(
            "Block '{}': copy/move requires a destination",
            block_name
        ))
    })?;
    Ok(resolve(ctx.render(raw)?, project_root))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
