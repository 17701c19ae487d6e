//! Durable migration state.
//!
//! One JSON document at `<projectRoot>/.analysis/migration-state.json`.
//! Writes go through write-temp + fsync + rename with an advisory file lock
//! held across the rename window; one rolling `.bak` is kept and restored
//! from when the primary document is corrupt.

use crate::error::{MigrateError, Result};
use crate::template::Scope;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SCHEMA_VERSION: u32 = 1;
pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecStatus::Pending => "PENDING",
            ExecStatus::Running => "RUNNING",
            ExecStatus::Completed => "COMPLETED",
            ExecStatus::Failed => "FAILED",
            ExecStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockExecutionRecord {
    pub name: String,
    pub block_type: String,
    pub status: ExecStatus,
    #[serde(default)]
    pub message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionRecord {
    pub task_id: String,
    pub status: ExecStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub blocks: Vec<BlockExecutionRecord>,
}

impl TaskExecutionRecord {
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: ExecStatus::Pending,
            started_at: None,
            completed_at: None,
            message: None,
            blocks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseExecutionRecord {
    pub phase_id: String,
    pub status: ExecStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskExecutionRecord>,
}

impl PhaseExecutionRecord {
    pub fn pending(phase_id: impl Into<String>) -> Self {
        Self {
            phase_id: phase_id.into(),
            status: ExecStatus::Pending,
            started_at: None,
            completed_at: None,
            tasks: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationExecutionState {
    pub plan_key: String,
    pub status: ExecStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseExecutionRecord>,
}

impl MigrationExecutionState {
    pub fn new(plan_key: impl Into<String>) -> Self {
        Self {
            plan_key: plan_key.into(),
            status: ExecStatus::Pending,
            started_at: None,
            completed_at: None,
            phases: BTreeMap::new(),
        }
    }

    pub fn phase(&self, phase_id: &str) -> Option<&PhaseExecutionRecord> {
        self.phases.get(phase_id)
    }

    pub fn phase_completed(&self, phase_id: &str) -> bool {
        self.phase(phase_id)
            .map(|p| p.status == ExecStatus::Completed)
            .unwrap_or(false)
    }

    pub fn task_completed(&self, phase_id: &str, task_id: &str) -> bool {
        self.phase(phase_id)
            .and_then(|p| p.tasks.get(task_id))
            .map(|t| t.status == ExecStatus::Completed)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    pub schema_version: u32,
    #[serde(default)]
    pub current_plan_key: Option<String>,
    #[serde(default)]
    pub migrations: BTreeMap<String, MigrationExecutionState>,
    #[serde(default)]
    pub variable_snapshot: Scope,
    /// Bounded, newest-first.
    #[serde(default)]
    pub history: VecDeque<MigrationExecutionState>,
}

impl Default for MigrationState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            current_plan_key: None,
            migrations: BTreeMap::new(),
            variable_snapshot: Scope::new(),
            history: VecDeque::new(),
        }
    }
}

impl MigrationState {
    pub fn push_history(&mut self, record: MigrationExecutionState) {
        self.history.push_front(record);
        while self.history.len() > HISTORY_CAP {
            self.history.pop_back();
        }
    }
}

pub struct MigrationStateStore {
    path: PathBuf,
}

impl MigrationStateStore {
    /// Store at the conventional location under the project root.
    pub fn for_project(project_root: &Path) -> Self {
        Self {
            path: project_root.join(".analysis").join("migration-state.json"),
        }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Load, falling back to the backup on corruption. A missing file
    /// yields a fresh default state; a schema mismatch is an error.
    pub fn load(&self) -> Result<MigrationState> {
        if !self.path.exists() {
            return Ok(MigrationState::default());
        }
        match self.parse_file(&self.path) {
            Ok(state) => Ok(state),
            Err(primary_err) => {
                let backup = self.backup_path();
                if backup.exists() {
                    let state = self.parse_file(&backup).map_err(|backup_err| {
                        MigrateError::State(format!(
                            "state file corrupt ({}) and backup unreadable ({}); \
                             remove {} to start over",
                            primary_err,
                            backup_err,
                            self.path.display()
                        ))
                    })?;
                    info!(
                        "Recovered migration state from backup {}",
                        backup.display()
                    );
                    Ok(state)
                } else {
                    Err(MigrateError::State(format!(
                        "state file corrupt ({}) and no backup present; remove {} to start over",
                        primary_err,
                        self.path.display()
                    )))
                }
            }
        }
    }

    fn parse_file(&self, path: &Path) -> Result<MigrationState> {
        let text = std::fs::read_to_string(path)?;
        let state: MigrationState =
            serde_json::from_str(&text).map_err(|e| MigrateError::state(e))?;
        if state.schema_version != SCHEMA_VERSION {
            return Err(MigrateError::State(format!(
                "state schema version {} is not supported (expected {})",
                state.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(state)
    }

    /// Write temp + fsync + rename, holding an advisory lock across the
    /// rename; the previous document becomes the rolling backup.
    pub fn save(&self, state: &MigrationState) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| MigrateError::State("state path has no parent".into()))?;
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()?;
        }

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock_file
            .lock_exclusive()
            .map_err(|e| MigrateError::State(format!("cannot lock state file: {}", e)))?;

        let result = (|| -> Result<()> {
            if self.path.exists() {
                std::fs::copy(&self.path, self.backup_path())?;
            }
            std::fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to release state lock: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (MigrationStateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (MigrationStateStore::for_project(dir.path()), dir)
    }

    #[test]
    fn test_missing_file_yields_default() {
        let (store, _dir) = store();
        let state = store.load().unwrap();
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert!(state.migrations.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (store, _dir) = store();
        let mut state = MigrationState::default();
        state.current_plan_key = Some("p@1.0.0".into());
        let mut exec = MigrationExecutionState::new("p@1.0.0");
        exec.status = ExecStatus::Completed;
        state.migrations.insert("p@1.0.0".into(), exec);
        state
            .variable_snapshot
            .insert("k".into(), serde_json::json!("v"));

        store.save(&state).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.current_plan_key.as_deref(), Some("p@1.0.0"));
        assert_eq!(
            loaded.migrations["p@1.0.0"].status,
            ExecStatus::Completed
        );
        assert_eq!(loaded.variable_snapshot["k"], serde_json::json!("v"));
    }

    #[test]
    fn test_corrupt_file_restored_from_backup() {
        let (store, _dir) = store();
        let mut state = MigrationState::default();
        state.current_plan_key = Some("good".into());
        store.save(&state).unwrap();
        // Second save: the first document becomes the backup.
        state.current_plan_key = Some("good-2".into());
        store.save(&state).unwrap();

        std::fs::write(store.path(), "{ not json").unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.current_plan_key.as_deref(), Some("good"));
    }

    #[test]
    fn test_corrupt_file_without_backup_fails_fast() {
        let (store, _dir) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("no backup"));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let (store, _dir) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"schema_version": 99}"#).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("schema version"));
    }

    #[test]
    fn test_history_is_capped_newest_first() {
        let mut state = MigrationState::default();
        for i in 0..(HISTORY_CAP + 5) {
            state.push_history(MigrationExecutionState::new(format!("plan-{}", i)));
        }
        assert_eq!(state.history.len(), HISTORY_CAP);
        assert_eq!(
            state.history.front().unwrap().plan_key,
            format!("plan-{}", HISTORY_CAP + 4)
        );
    }
}
