//! AI_PROMPT and AI_PROMPT_BATCH blocks.

use super::BlockOutcome;
use crate::ai::AiProvider;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub async fn run_single(
    block_name: &str,
    prompt: &str,
    ctx: &MigrationContext,
    provider: &AiProvider,
) -> Result<BlockOutcome> {
    let rendered = ctx.render(prompt)?;
    let response = provider.invoke(&rendered).await.map_err(|e| match e {
        MigrateError::BlockFailure { kind, message, .. } => MigrateError::BlockFailure {
            block: block_name.to_string(),
            kind,
            message,
        },
        other => other,
    })?;
    Ok(BlockOutcome::of(Value::String(response))
        .with_message(format!("provider '{}' answered", provider.name)))
}

/// Iterate over an `input-nodes` list, binding `current_item` (alias
/// `item`), `current_index` and `total_items` per iteration. A failed item
/// yields a partial result; the block fails only when every item failed.
pub async fn run_batch(
    block_name: &str,
    prompt: &str,
    input_nodes: &str,
    ctx: &MigrationContext,
    provider: &AiProvider,
) -> Result<BlockOutcome> {
    let Some(Value::Array(items)) = ctx.get(input_nodes) else {
        return Err(MigrateError::Config(format!(
            "Block '{}': input-nodes variable '{}' is not a list in scope",
            block_name, input_nodes
        )));
    };
    let items = items.clone();
    let total = items.len();

    let mut results = Vec::with_capacity(total);
    let mut failures = 0usize;
    for (index, item) in items.into_iter().enumerate() {
        let mut item_ctx = ctx.clone();
        item_ctx.set_value("current_item", item.clone());
        item_ctx.set_value("item", item.clone());
        item_ctx.set_value("current_index", json!(index));
        item_ctx.set_value("total_items", json!(total));

        let rendered = item_ctx.render(prompt)?;
        debug!(
            "Batch prompt {}/{} for block '{}'",
            index + 1,
            total,
            block_name
        );
        match provider.invoke(&rendered).await {
            Ok(response) => results.push(json!({
                "index": index,
                "item": item,
                "success": true,
                "response": response,
            })),
            Err(e) => {
                warn!("Batch item {} failed: {}", index, e);
                failures += 1;
                results.push(json!({
                    "index": index,
                    "item": item,
                    "success": false,
                    "error": e.to_string(),
                }));
            }
        }
    }

    if total > 0 && failures == total {
        return Err(MigrateError::BlockFailure {
            block: block_name.to_string(),
            kind: "provider".into(),
            message: format!("all {} batch items failed", total),
        });
    }

    Ok(BlockOutcome::of(Value::Array(results)).with_message(format!(
        "{}/{} items succeeded",
        total - failures,
        total
    )))
}
