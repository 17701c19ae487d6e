//! Declarative migration plan model.
//!
//! A plan is phases of tasks of blocks. Field names follow the YAML surface
//! exactly (`depends-on`, `enable_if`, `output-variable`, ...); the block
//! list is a tagged union keyed on `type`.

use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    #[serde(rename = "migration-plan")]
    pub migration_plan: MigrationPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl MigrationPlan {
    /// Stable key identifying this plan in the state file.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Structural validation beyond what serde enforces: unique ids,
    /// dependencies that exist within the same phase, and per-task unique
    /// output-variable names.
    pub fn validate(&self) -> Result<()> {
        let mut phase_ids = HashSet::new();
        for phase in &self.phases {
            if !phase_ids.insert(&phase.id) {
                return Err(MigrateError::Config(format!(
                    "Duplicate phase id: {}",
                    phase.id
                )));
            }
            let task_ids: HashSet<&String> = phase.tasks.iter().map(|t| &t.id).collect();
            if task_ids.len() != phase.tasks.len() {
                return Err(MigrateError::Config(format!(
                    "Duplicate task id in phase '{}'",
                    phase.id
                )));
            }
            for task in &phase.tasks {
                for dep in &task.depends_on {
                    if !task_ids.contains(dep) {
                        return Err(MigrateError::Config(format!(
                            "Task '{}' depends on unknown task '{}' (dependencies must live in the same phase)",
                            task.id, dep
                        )));
                    }
                }
                let mut outputs = HashSet::new();
                for block in &task.blocks {
                    if let Some(var) = &block.output_variable {
                        if !outputs.insert(var) {
                            return Err(MigrateError::Config(format!(
                                "Task '{}' binds output variable '{}' more than once",
                                task.id, var
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub task_type: Option<String>,
    #[serde(rename = "depends-on", default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "enable_if", default)]
    pub enable_if: Option<String>,
    #[serde(rename = "output-variable", default)]
    pub output_variable: Option<String>,
    #[serde(rename = "working-directory", default)]
    pub working_directory: Option<String>,
    #[serde(rename = "timeout-seconds", default)]
    pub timeout_seconds: Option<u64>,
    #[serde(rename = "continue-on-failure", default)]
    pub continue_on_failure: bool,
    #[serde(flatten)]
    pub spec: BlockSpec,
}

/// The closed set of executable block kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlockSpec {
    #[serde(rename = "COMMAND")]
    Command { command: String },

    #[serde(rename = "FILE_OPERATION")]
    FileOperation {
        operation: FileOperationKind,
        path: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        destination: Option<String>,
    },

    #[serde(rename = "TEMPLATE_GENERATION")]
    TemplateGeneration {
        template: String,
        #[serde(rename = "output-path")]
        output_path: String,
    },

    #[serde(rename = "GRAPH_QUERY")]
    GraphQuery {
        query: GraphQueryKind,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(rename = "node-type", default)]
        node_type: Option<String>,
    },

    #[serde(rename = "OPENREWRITE")]
    AstRewrite {
        recipe: String,
        #[serde(rename = "file-pattern", default)]
        file_pattern: Option<String>,
        #[serde(rename = "input-nodes", default)]
        input_nodes: Option<String>,
        #[serde(rename = "require-changes", default)]
        require_changes: bool,
    },

    #[serde(rename = "AI_PROMPT")]
    AiPrompt { prompt: String },

    #[serde(rename = "AI_PROMPT_BATCH")]
    AiPromptBatch {
        prompt: String,
        #[serde(rename = "input-nodes")]
        input_nodes: String,
    },

    #[serde(rename = "INTERACTIVE_VALIDATION")]
    InteractiveValidation {
        message: String,
        #[serde(rename = "validation-type", default)]
        validation_type: ValidationType,
        #[serde(default)]
        required: bool,
    },
}

impl BlockSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            BlockSpec::Command { .. } => "COMMAND",
            BlockSpec::FileOperation { .. } => "FILE_OPERATION",
            BlockSpec::TemplateGeneration { .. } => "TEMPLATE_GENERATION",
            BlockSpec::GraphQuery { .. } => "GRAPH_QUERY",
            BlockSpec::AstRewrite { .. } => "OPENREWRITE",
            BlockSpec::AiPrompt { .. } => "AI_PROMPT",
            BlockSpec::AiPromptBatch { .. } => "AI_PROMPT_BATCH",
            BlockSpec::InteractiveValidation { .. } => "INTERACTIVE_VALIDATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileOperationKind {
    Create,
    CreateDir,
    Copy,
    Move,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphQueryKind {
    ByType,
    ByAnyTag,
    ByAllTag,
    ByTypeAndAnyTag,
    ByTypeAndAllTag,
}

impl GraphQueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphQueryKind::ByType => "byType",
            GraphQueryKind::ByAnyTag => "byAnyTag",
            GraphQueryKind::ByAllTag => "byAllTag",
            GraphQueryKind::ByTypeAndAnyTag => "byTypeAndAnyTag",
            GraphQueryKind::ByTypeAndAllTag => "byTypeAndAllTag",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ValidationType {
    #[default]
    ManualConfirm,
    Review,
    Approval,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
migration-plan:
  name: ejb-to-spring
  version: 1.0.0
  phases:
    - id: prep
      name: Preparation
      tasks:
        - id: scan
          name: Scan
          type: analysis
          blocks:
            - name: list sources
              type: COMMAND
              command: "find src -name '*.java'"
              output-variable: sources
"#;

    #[test]
    fn test_parse_minimal_plan() {
        let file: PlanFile = serde_yaml::from_str(MINIMAL).unwrap();
        let plan = file.migration_plan;
        assert_eq!(plan.name, "ejb-to-spring");
        assert_eq!(plan.key(), "ejb-to-spring@1.0.0");
        assert_eq!(plan.phases.len(), 1);
        let block = &plan.phases[0].tasks[0].blocks[0];
        assert_eq!(block.spec.kind(), "COMMAND");
        assert_eq!(block.output_variable.as_deref(), Some("sources"));
        plan.validate().unwrap();
    }

    #[test]
    fn test_unknown_block_type_lists_valid_types() {
        let yaml = r#"
migration-plan:
  name: p
  version: 0.1.0
  phases:
    - id: a
      name: A
      tasks:
        - id: t
          name: T
          blocks:
            - name: bad
              type: TELEPORT
"#;
        let err = serde_yaml::from_str::<PlanFile>(yaml).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("TELEPORT"));
        assert!(message.contains("COMMAND"));
        assert!(message.contains("GRAPH_QUERY"));
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let yaml = r#"
migration-plan:
  name: p
  version: 0.1.0
  phases:
    - id: a
      name: A
      tasks:
        - id: t1
          name: T1
          depends-on: [missing]
          blocks: []
"#;
        let plan = serde_yaml::from_str::<PlanFile>(yaml).unwrap().migration_plan;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_output_variable() {
        let yaml = r#"
migration-plan:
  name: p
  version: 0.1.0
  phases:
    - id: a
      name: A
      tasks:
        - id: t1
          name: T1
          blocks:
            - name: b1
              type: COMMAND
              command: "true"
              output-variable: out
            - name: b2
              type: COMMAND
              command: "true"
              output-variable: out
"#;
        let plan = serde_yaml::from_str::<PlanFile>(yaml).unwrap().migration_plan;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_block_common_fields() {
        let yaml = r#"
name: guarded
type: FILE_OPERATION
operation: create
path: "${project.root}/out.txt"
content: "hello"
enable_if: "migrate_db && backup_enabled"
timeout-seconds: 30
continue-on-failure: true
working-directory: "/tmp"
"#;
        let block: Block = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(block.enable_if.as_deref(), Some("migrate_db && backup_enabled"));
        assert_eq!(block.timeout_seconds, Some(30));
        assert!(block.continue_on_failure);
        match &block.spec {
            BlockSpec::FileOperation { operation, .. } => {
                assert_eq!(*operation, FileOperationKind::Create)
            }
            other => panic!("wrong spec: {:?}", other),
        }
    }
}
