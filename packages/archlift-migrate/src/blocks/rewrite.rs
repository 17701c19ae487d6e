//! OPENREWRITE blocks: apply a registered deterministic recipe over a set
//! of target files.
//!
//! Targets come from a `file-pattern` base directory (every `.java` file
//! beneath it) or from an `input-nodes` variable holding a GRAPH_QUERY
//! projection list (the `sourceFilePath` attribute of each node).

use super::BlockOutcome;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::recipes::RecipeRegistry;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    block_name: &str,
    recipe_name: &str,
    file_pattern: Option<&str>,
    input_nodes: Option<&str>,
    require_changes: bool,
    recipes: &RecipeRegistry,
    ctx: &MigrationContext,
    project_root: &Path,
) -> Result<BlockOutcome> {
    let recipe = recipes.resolve(recipe_name)?;
    let targets = resolve_targets(block_name, file_pattern, input_nodes, ctx, project_root)?;
    debug!(
        "Rewrite block '{}': {} targets for recipe '{}'",
        block_name,
        targets.len(),
        recipe_name
    );

    let mut files_changed = 0usize;
    let mut files_errored = 0usize;
    for target in &targets {
        let source = match std::fs::read_to_string(target) {
            Ok(s) => s,
            Err(e) => {
                warn!("Rewrite skipped {}: {}", target.display(), e);
                files_errored += 1;
                continue;
            }
        };
        if let Some(rewritten) = recipe.apply(&source) {
            if let Err(e) = std::fs::write(target, rewritten) {
                warn!("Rewrite failed to write {}: {}", target.display(), e);
                files_errored += 1;
                continue;
            }
            files_changed += 1;
        }
    }

    if require_changes && files_changed == 0 {
        return Err(MigrateError::BlockFailure {
            block: block_name.to_string(),
            kind: "no_changes".into(),
            message: format!(
                "recipe '{}' changed no files out of {} targets",
                recipe_name,
                targets.len()
            ),
        });
    }

    Ok(BlockOutcome::of(json!({
        "files_changed": files_changed,
        "files_errored": files_errored,
        "files_targeted": targets.len(),
    }))
    .with_message(format!(
        "{} changed, {} errored of {} targets",
        files_changed,
        files_errored,
        targets.len()
    )))
}

fn resolve_targets(
    block_name: &str,
    file_pattern: Option<&str>,
    input_nodes: Option<&str>,
    ctx: &MigrationContext,
    project_root: &Path,
) -> Result<Vec<PathBuf>> {
    if let Some(variable) = input_nodes {
        let Some(Value::Array(items)) = ctx.get(variable) else {
            return Err(MigrateError::Config(format!(
                "Block '{}': input-nodes variable '{}' is not a node list in scope",
                block_name, variable
            )));
        };
        let mut targets = Vec::new();
        for item in items {
            if let Some(path) = item.get("sourceFilePath").and_then(Value::as_str) {
                targets.push(project_root.join(path));
            }
        }
        return Ok(targets);
    }

    if let Some(pattern) = file_pattern {
        let base = {
            let rendered = ctx.render(pattern)?;
            let path = PathBuf::from(rendered);
            if path.is_absolute() {
                path
            } else {
                project_root.join(path)
            }
        };
        let mut targets = Vec::new();
        for entry in WalkDir::new(&base).into_iter().flatten() {
            if entry.file_type().is_file()
                && entry.path().extension().map_or(false, |e| e == "java")
            {
                targets.push(entry.path().to_path_buf());
            }
        }
        targets.sort();
        return Ok(targets);
    }

    Err(MigrateError::Config(format!(
        "Block '{}': OPENREWRITE needs either file-pattern or input-nodes",
        block_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rewrite_over_file_pattern() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src/shop");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("CartBean.java"),
            "import javax.ejb.Stateless;\n@Stateless\npublic class CartBean {}\n",
        )
        .unwrap();
        std::fs::write(src.join("Util.java"), "public class Util {}\n").unwrap();

        let recipes = RecipeRegistry::with_builtins();
        let ctx = MigrationContext::new();
        let outcome = run(
            "rw",
            "stateless-to-service",
            Some("src"),
            None,
            false,
            &recipes,
            &ctx,
            root.path(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.primary.as_ref().unwrap()["files_changed"], 1);
        let rewritten = std::fs::read_to_string(src.join("CartBean.java")).unwrap();
        assert!(rewritten.contains("@Service"));
    }

    #[tokio::test]
    async fn test_rewrite_over_input_nodes() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::write(
            root.path().join("src/A.java"),
            "@Stateless\nclass A {}\n",
        )
        .unwrap();

        let mut ctx = MigrationContext::new();
        ctx.set_value(
            "beans",
            json!([{"id": "A", "sourceFilePath": "src/A.java"}]),
        );

        let recipes = RecipeRegistry::with_builtins();
        let outcome = run(
            "rw",
            "stateless-to-service",
            None,
            Some("beans"),
            true,
            &recipes,
            &ctx,
            root.path(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.primary.as_ref().unwrap()["files_changed"], 1);
    }

    #[tokio::test]
    async fn test_require_changes_with_no_matches_fails() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::write(root.path().join("src/B.java"), "class B {}\n").unwrap();

        let recipes = RecipeRegistry::with_builtins();
        let ctx = MigrationContext::new();
        let err = run(
            "rw",
            "stateless-to-service",
            Some("src"),
            None,
            true,
            &recipes,
            &ctx,
            root.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::BlockFailure { ref kind, .. } if kind == "no_changes"
        ));
    }

    #[tokio::test]
    async fn test_unknown_recipe_is_config_error() {
        let root = tempfile::tempdir().unwrap();
        let recipes = RecipeRegistry::with_builtins();
        let ctx = MigrationContext::new();
        let err = run(
            "rw", "ghost", Some("src"), None, false, &recipes, &ctx, root.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }
}
