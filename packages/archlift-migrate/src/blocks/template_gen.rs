//! TEMPLATE_GENERATION blocks: substitute a named template file and write
//! the result. Operationally a thin layer over file creation.

use super::BlockOutcome;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub async fn run(
    block_name: &str,
    template: &str,
    output_path: &str,
    ctx: &MigrationContext,
    project_root: &Path,
) -> Result<BlockOutcome> {
    let template_path = resolve(template, project_root);
    let source = std::fs::read_to_string(&template_path).map_err(|e| {
        MigrateError::Config(format!(
            "Block '{}': cannot read template {}: {}",
            block_name,
            template_path.display(),
            e
        ))
    })?;

    let rendered = ctx.render(&source)?;
    let out_path = resolve(&ctx.render(output_path)?, project_root);
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tokio::fs::write(&out_path, rendered).await?;

    Ok(
        BlockOutcome::of(Value::String(out_path.display().to_string())).with_message(format!(
            "generated {} from {}",
            out_path.display(),
            template
        )),
    )
}

fn resolve(raw: &str, project_root: &Path) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generates_file_with_iteration() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join("service.tmpl"),
            "package ${package};\n{% for bean in beans %}// migrated: {{ bean }}\n{% endfor %}",
        )
        .unwrap();

        let mut ctx = MigrationContext::new();
        ctx.set_variable("package", "com.shop");
        ctx.set_value("beans", serde_json::json!(["CartBean", "OrderBean"]));

        run(
            "gen",
            "service.tmpl",
            "out/Services.java",
            &ctx,
            root.path(),
        )
        .await
        .unwrap();

        let written = std::fs::read_to_string(root.path().join("out/Services.java")).unwrap();
        assert!(written.contains("package com.shop;"));
        assert!(written.contains("// migrated: CartBean"));
        assert!(written.contains("// migrated: OrderBean"));
    }

    #[tokio::test]
    async fn test_missing_template_is_config_error() {
        let root = tempfile::tempdir().unwrap();
        let ctx = MigrationContext::new();
        let err = run("gen", "missing.tmpl", "out.txt", &ctx, root.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }
}
