//! The block library: the smallest executable units of a migration plan.
//!
//! `execute_block` applies the cross-cutting rules (enable_if skipping,
//! dry-run, timeout, output-variable binding) and dispatches on the block
//! kind. Operational failures come back inside the `BlockResult`;
//! configuration problems (unknown recipe, unknown provider, no graph) are
//! returned as errors and abort the plan.

mod ai_prompt;
mod command;
mod file_op;
mod graph_query;
mod rewrite;
mod template_gen;
mod validation;

use crate::ai::AiProvider;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::plan::model::{Block, BlockSpec};
use crate::prompt::Prompter;
use crate::recipes::RecipeRegistry;
use crate::template::Scope;
use archlift_graph::GraphStore;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Everything a block may touch besides the variable scope.
pub struct BlockEnv {
    pub project_root: PathBuf,
    pub graph: Option<Arc<GraphStore>>,
    pub recipes: Arc<RecipeRegistry>,
    pub provider: Option<AiProvider>,
    pub prompter: Arc<Mutex<dyn Prompter>>,
    pub dry_run: bool,
}

/// What a block hands back on success.
#[derive(Debug)]
pub struct BlockOutcome {
    pub primary: Option<Value>,
    /// Additional bindings; the suffix is appended to the output-variable
    /// name (`_ids`, `_summary`).
    pub extras: Vec<(String, Value)>,
    pub message: Option<String>,
}

impl BlockOutcome {
    pub fn of(primary: Value) -> Self {
        Self {
            primary: Some(primary),
            extras: Vec::new(),
            message: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            primary: None,
            extras: Vec::new(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockResult {
    pub name: String,
    pub block_type: String,
    pub success: bool,
    pub skipped: bool,
    pub dry_run: bool,
    pub failure_kind: Option<String>,
    pub message: Option<String>,
    #[serde(skip)]
    pub outputs: Scope,
    pub duration_ms: u64,
}

impl BlockResult {
    fn base(block: &Block) -> Self {
        Self {
            name: block.name.clone(),
            block_type: block.spec.kind().to_string(),
            success: true,
            skipped: false,
            dry_run: false,
            failure_kind: None,
            message: None,
            outputs: Scope::new(),
            duration_ms: 0,
        }
    }
}

/// Human-readable form of what the block would do, used by dry-run and
/// step mode. Never fails: unresolved placeholders stay verbatim.
pub fn describe_block(block: &Block, ctx: &MigrationContext) -> String {
    match &block.spec {
        BlockSpec::Command { command } => {
            format!("run command: {}", ctx.render_lenient(command))
        }
        BlockSpec::FileOperation {
            operation, path, ..
        } => format!("file {:?}: {}", operation, ctx.render_lenient(path)),
        BlockSpec::TemplateGeneration {
            template,
            output_path,
        } => format!(
            "generate {} from template {}",
            ctx.render_lenient(output_path),
            template
        ),
        BlockSpec::GraphQuery { query, tags, node_type } => format!(
            "graph query {} tags={:?} nodeType={}",
            query.as_str(),
            tags,
            node_type.as_deref().unwrap_or("-")
        ),
        BlockSpec::AstRewrite { recipe, .. } => format!("apply rewrite recipe '{}'", recipe),
        BlockSpec::AiPrompt { .. } => "send AI prompt".to_string(),
        BlockSpec::AiPromptBatch { input_nodes, .. } => {
            format!("send AI prompt per item of '{}'", input_nodes)
        }
        BlockSpec::InteractiveValidation { message, .. } => {
            format!("ask operator: {}", ctx.render_lenient(message))
        }
    }
}

pub async fn execute_block(
    block: &Block,
    ctx: &MigrationContext,
    env: &BlockEnv,
) -> Result<BlockResult> {
    let start = Instant::now();
    let mut result = BlockResult::base(block);

    // enable_if gate: a disabled block is a successful skip.
    if let Some(predicate) = &block.enable_if {
        if !ctx.eval_predicate(predicate) {
            result.skipped = true;
            result.message = Some(format!("skipped: enable_if '{}' is false", predicate));
            result.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }
    }

    if env.dry_run {
        result.dry_run = true;
        result.message = Some(describe_block(block, ctx));
        // Keep later template chains resolvable without side effects.
        if let Some(var) = &block.output_variable {
            result
                .outputs
                .insert(var.clone(), Value::String(format!("<dry-run:{}>", block.name)));
        }
        result.duration_ms = start.elapsed().as_millis() as u64;
        info!("[dry-run] {}", result.message.as_deref().unwrap_or_default());
        return Ok(result);
    }

    let work = run_block(block, ctx, env);
    let outcome = match block.timeout_seconds {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(MigrateError::BlockFailure {
                    block: block.name.clone(),
                    kind: "timeout".into(),
                    message: format!("timed out after {}s", secs),
                }),
            }
        }
        None => work.await,
    };

    result.duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(outcome) => {
            result.message = outcome.message;
            bind_outputs(block, outcome.primary, outcome.extras, &mut result.outputs);
            Ok(result)
        }
        Err(MigrateError::BlockFailure { kind, message, .. }) => {
            result.success = false;
            result.failure_kind = Some(kind);
            result.message = Some(message);
            Ok(result)
        }
        Err(MigrateError::Template(message)) => {
            result.success = false;
            result.failure_kind = Some("template".into());
            result.message = Some(message);
            Ok(result)
        }
        Err(MigrateError::Io(e)) => {
            result.success = false;
            result.failure_kind = Some("io".into());
            result.message = Some(e.to_string());
            Ok(result)
        }
        // Configuration problems abort the plan.
        Err(other) => Err(other),
    }
}

async fn run_block(block: &Block, ctx: &MigrationContext, env: &BlockEnv) -> Result<BlockOutcome> {
    let working_dir = match &block.working_directory {
        Some(dir) => {
            let rendered = ctx.render(dir)?;
            let path = PathBuf::from(rendered);
            if path.is_absolute() {
                path
            } else {
                env.project_root.join(path)
            }
        }
        None => env.project_root.clone(),
    };

    match &block.spec {
        BlockSpec::Command { command } => {
            command::run(&block.name, command, &working_dir, ctx).await
        }
        BlockSpec::FileOperation {
            operation,
            path,
            content,
            destination,
        } => {
            file_op::run(
                &block.name,
                *operation,
                path,
                content.as_deref(),
                destination.as_deref(),
                ctx,
                &env.project_root,
            )
            .await
        }
        BlockSpec::TemplateGeneration {
            template,
            output_path,
        } => template_gen::run(&block.name, template, output_path, ctx, &env.project_root).await,
        BlockSpec::GraphQuery {
            query,
            tags,
            node_type,
        } => {
            let graph = env.graph.as_deref().ok_or_else(|| {
                MigrateError::Config(
                    "GRAPH_QUERY block requires a graph database; run analysis first".into(),
                )
            })?;
            graph_query::run(*query, tags, node_type.as_deref(), graph)
        }
        BlockSpec::AstRewrite {
            recipe,
            file_pattern,
            input_nodes,
            require_changes,
        } => {
            rewrite::run(
                &block.name,
                recipe,
                file_pattern.as_deref(),
                input_nodes.as_deref(),
                *require_changes,
                &env.recipes,
                ctx,
                &env.project_root,
            )
            .await
        }
        BlockSpec::AiPrompt { prompt } => {
            let provider = require_provider(env)?;
            ai_prompt::run_single(&block.name, prompt, ctx, provider).await
        }
        BlockSpec::AiPromptBatch {
            prompt,
            input_nodes,
        } => {
            let provider = require_provider(env)?;
            ai_prompt::run_batch(&block.name, prompt, input_nodes, ctx, provider).await
        }
        BlockSpec::InteractiveValidation {
            message,
            validation_type,
            required,
        } => {
            validation::run(
                &block.name,
                message,
                *validation_type,
                *required,
                ctx,
                env.prompter.clone(),
            )
            .await
        }
    }
}

fn require_provider(env: &BlockEnv) -> Result<&AiProvider> {
    env.provider.as_ref().ok_or_else(|| {
        MigrateError::Config(
            "AI block requires a provider; select one with --ai-provider".into(),
        )
    })
}

fn bind_outputs(
    block: &Block,
    primary: Option<Value>,
    extras: Vec<(String, Value)>,
    outputs: &mut Scope,
) {
    let base = block.output_variable.clone().or_else(|| {
        match &block.spec {
            // Command stdout has a conventional default binding.
            BlockSpec::Command { .. } => Some("output".to_string()),
            BlockSpec::GraphQuery { .. } => Some("result".to_string()),
            _ => None,
        }
    });
    let Some(base) = base else { return };
    if let Some(primary) = primary {
        outputs.insert(base.clone(), primary);
    }
    for (suffix, value) in extras {
        outputs.insert(format!("{}{}", base, suffix), value);
    }
}
