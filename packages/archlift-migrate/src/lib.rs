//! archlift-migrate — block-structured, listener-driven migration engine
//!
//! Consumes the knowledge graph built by analysis, executes declarative
//! YAML plans (phases -> task DAGs -> typed blocks), tracks progress in a
//! durable JSON state file and resumes after a crash.

pub mod ai;
pub mod blocks;
pub mod context;
pub mod engine;
pub mod error;
pub mod listener;
pub mod plan;
pub mod prompt;
pub mod recipes;
pub mod state;
pub mod template;

pub use ai::{AiProvider, AiProviderRegistry};
pub use blocks::{describe_block, execute_block, BlockEnv, BlockResult};
pub use context::MigrationContext;
pub use engine::{topological_order, EngineOptions, MigrationEngine, PlanRunSummary};
pub use error::{MigrateError, Result};
pub use listener::{ConsoleProgressListener, MigrationListener, StateFileListener, TaskResult};
pub use plan::{
    load_plan, parse_key_value, Block, BlockSpec, FileOperationKind, GraphQueryKind, LoadedPlan,
    MigrationPlan, Phase, PlanFile, PlanLoadOptions, Task, ValidationType,
};
pub use prompt::{Prompter, ScriptedPrompter, StdinPrompter};
pub use recipes::{FnRecipe, RecipeRegistry, RewriteRecipe};
pub use state::{
    ExecStatus, MigrationExecutionState, MigrationState, MigrationStateStore, SCHEMA_VERSION,
};
pub use template::{Scope, TemplateEngine};
