//! Plan loading: YAML parse, single-level include merge, and the variable
//! precedence chain.
//!
//! Precedence, highest first: CLI `-D`, CLI `--variable`, `--variables`
//! properties file, main plan, included files (latest include wins),
//! auto-derived. `${env.NAME}` is a template-time syntax, not a scope entry.

use crate::error::{MigrateError, Result};
use crate::plan::model::{MigrationPlan, PlanFile};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct PlanLoadOptions {
    /// `-D key=value`, highest precedence.
    pub cli_defines: Vec<(String, String)>,
    /// `--variable key=value`.
    pub cli_variables: Vec<(String, String)>,
    /// `--variables file.properties`.
    pub variables_file: Option<PathBuf>,
    pub project_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: MigrationPlan,
    /// Effective variable map after the precedence chain.
    pub variables: BTreeMap<String, String>,
    /// Where each effective variable came from (for `--list-variables`).
    pub sources: BTreeMap<String, &'static str>,
}

pub fn load_plan(plan_path: &Path, options: &PlanLoadOptions) -> Result<LoadedPlan> {
    let mut plan = parse_plan_file(plan_path)?;
    let plan_dir = plan_path.parent().unwrap_or_else(|| Path::new("."));

    // Single-level include merge: main overrides includes; among includes
    // the latest listed wins. Included phases append in listed order.
    let mut included_variables: BTreeMap<String, String> = BTreeMap::new();
    let mut included_metadata = BTreeMap::new();
    let mut included_phases = Vec::new();
    let includes = std::mem::take(&mut plan.includes);
    for include in &includes {
        let include_path = plan_dir.join(include);
        let included = parse_plan_file(&include_path)?;
        if !included.includes.is_empty() {
            return Err(MigrateError::Config(format!(
                "Include '{}' declares its own includes; only a single include level is supported",
                include
            )));
        }
        info!("Merged include: {}", include);
        included_variables.extend(included.variables);
        included_metadata.extend(included.metadata);
        included_phases.extend(included.phases);
    }
    for (key, value) in included_metadata {
        plan.metadata.entry(key).or_insert(value);
    }
    plan.phases.extend(included_phases);

    plan.validate()?;

    // Variable precedence chain, lowest first.
    let mut variables = BTreeMap::new();
    let mut sources: BTreeMap<String, &'static str> = BTreeMap::new();
    let apply = |map: BTreeMap<String, String>,
                     source: &'static str,
                     variables: &mut BTreeMap<String, String>,
                     sources: &mut BTreeMap<String, &'static str>| {
        for (key, value) in map {
            variables.insert(key.clone(), value);
            sources.insert(key, source);
        }
    };

    apply(
        derived_variables(&plan, &options.project_root),
        "derived",
        &mut variables,
        &mut sources,
    );
    apply(included_variables, "include", &mut variables, &mut sources);
    apply(plan.variables.clone(), "plan", &mut variables, &mut sources);
    if let Some(file) = &options.variables_file {
        apply(
            parse_properties_file(file)?,
            "variables-file",
            &mut variables,
            &mut sources,
        );
    }
    apply(
        options.cli_variables.iter().cloned().collect(),
        "cli-variable",
        &mut variables,
        &mut sources,
    );
    apply(
        options.cli_defines.iter().cloned().collect(),
        "cli-define",
        &mut variables,
        &mut sources,
    );

    debug!("Effective variables: {}", variables.len());
    Ok(LoadedPlan {
        plan,
        variables,
        sources,
    })
}

fn parse_plan_file(path: &Path) -> Result<MigrationPlan> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        MigrateError::Config(format!("Cannot read plan file {}: {}", path.display(), e))
    })?;
    let file: PlanFile = serde_yaml::from_str(&text).map_err(|e| {
        MigrateError::Config(format!("Malformed plan file {}: {}", path.display(), e))
    })?;
    Ok(file.migration_plan)
}

fn derived_variables(plan: &MigrationPlan, project_root: &Path) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert(
        "project.root".to_string(),
        project_root.display().to_string(),
    );
    vars.insert(
        "project.name".to_string(),
        project_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string(),
    );
    vars.insert("plan.name".to_string(), plan.name.clone());
    vars.insert("current_datetime".to_string(), Utc::now().to_rfc3339());
    if let Ok(user) = std::env::var("USER") {
        vars.insert("user.name".to_string(), user);
    }
    if let Ok(home) = std::env::var("HOME") {
        vars.insert("user.home".to_string(), home);
    }
    vars
}

/// `key=value` lines; `#` starts a comment.
fn parse_properties_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        MigrateError::Config(format!(
            "Cannot read variables file {}: {}",
            path.display(),
            e
        ))
    })?;
    let mut vars = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(MigrateError::Config(format!(
                "Malformed properties line in {}: {}",
                path.display(),
                line
            )));
        };
        vars.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(vars)
}

/// Parse a `key=value` CLI argument.
pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(MigrateError::Config(format!(
            "Expected key=value, got '{}'",
            raw
        ))),
    }
}
