//! The migration engine: executes a plan phase by phase.
//!
//! Tasks inside a phase run in a deterministic topological order (ties
//! broken lexicographically by task id); blocks inside a task run strictly
//! in declared order on a single logical thread. Listeners observe every
//! transition and may abort the plan; the state document checkpoints after
//! each phase so `--resume` can pick up where a crashed run stopped.

use crate::blocks::{execute_block, BlockEnv};
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::listener::{MigrationListener, TaskResult};
use crate::plan::model::{MigrationPlan, Phase, Task};
use crate::prompt::{ask_step, Answer};
use crate::state::{
    BlockExecutionRecord, ExecStatus, MigrationExecutionState, MigrationState,
    MigrationStateStore, PhaseExecutionRecord, TaskExecutionRecord,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub dry_run: bool,
    /// Step mode: ask the operator before every block.
    pub interactive: bool,
    pub resume: bool,
    /// One-shot replay of a single phase or task, ignoring prior state.
    pub only_phase: Option<String>,
    pub only_task: Option<String>,
    /// CLI-supplied variables, re-applied on top of a restored snapshot.
    pub cli_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanRunSummary {
    pub success: bool,
    pub phases_completed: usize,
    pub tasks_completed: usize,
    pub blocks_executed: usize,
}

pub struct MigrationEngine {
    plan: MigrationPlan,
    context: MigrationContext,
    env: BlockEnv,
    listeners: Vec<Box<dyn MigrationListener>>,
    state_store: MigrationStateStore,
    state: Arc<Mutex<MigrationState>>,
    cancel: Arc<AtomicBool>,
    options: EngineOptions,
    step_all: bool,
}

impl MigrationEngine {
    pub fn new(
        plan: MigrationPlan,
        variables: &BTreeMap<String, String>,
        env: BlockEnv,
        state_store: MigrationStateStore,
        options: EngineOptions,
    ) -> Result<Self> {
        let state = state_store.load()?;

        let context = if options.resume && !state.variable_snapshot.is_empty() {
            let mut ctx = MigrationContext::new();
            ctx.restore(state.variable_snapshot.clone());
            for (key, value) in &options.cli_overrides {
                ctx.set_variable(key, value);
            }
            ctx
        } else {
            MigrationContext::from_string_variables(variables)
        };

        Ok(Self {
            plan,
            context,
            env,
            listeners: Vec::new(),
            state_store,
            state: Arc::new(Mutex::new(state)),
            cancel: Arc::new(AtomicBool::new(false)),
            options,
            step_all: false,
        })
    }

    pub fn add_listener(&mut self, listener: Box<dyn MigrationListener>) {
        self.listeners.push(listener);
    }

    /// Shared state document (for the StateFileListener).
    pub fn state(&self) -> Arc<Mutex<MigrationState>> {
        self.state.clone()
    }

    /// Cooperative cancel flag, checked at block boundaries.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn context(&self) -> &MigrationContext {
        &self.context
    }

    pub async fn execute(&mut self) -> Result<PlanRunSummary> {
        self.plan.validate()?;

        // All task DAGs are sorted up front: a cycle anywhere is a
        // configuration error before any task runs.
        let mut orders: HashMap<String, Vec<String>> = HashMap::new();
        for phase in &self.plan.phases {
            orders.insert(phase.id.clone(), topological_order(&phase.tasks)?);
        }

        let plan_key = self.plan.key();
        self.with_state(|state| {
            state.current_plan_key = Some(plan_key.clone());
            let record = state
                .migrations
                .entry(plan_key.clone())
                .or_insert_with(|| MigrationExecutionState::new(plan_key.clone()));
            // A full fresh run resets the plan record. Resume keeps it, and
            // a one-shot --phase/--task replay leaves other units' records
            // untouched.
            if !self.options.resume
                && self.options.only_phase.is_none()
                && self.options.only_task.is_none()
            {
                *record = MigrationExecutionState::new(plan_key.clone());
            }
            record.status = ExecStatus::Running;
            record.started_at.get_or_insert_with(Utc::now);
        });

        let plan = self.plan.clone();
        for listener in &mut self.listeners {
            listener.on_plan_start(&plan);
        }

        let outcome = self.run_phases(&plan, &orders).await;
        let success = matches!(&outcome, Ok(summary) if summary.success);

        self.with_state(|state| {
            state.variable_snapshot = self.context.snapshot();
            let finished = state.migrations.get_mut(&plan_key).map(|record| {
                record.status = if success {
                    ExecStatus::Completed
                } else {
                    ExecStatus::Failed
                };
                record.completed_at = Some(Utc::now());
                record.clone()
            });
            if let Some(finished) = finished {
                state.push_history(finished);
            }
        });
        self.flush_state();

        for listener in &mut self.listeners {
            listener.on_plan_complete(&plan, success);
        }
        outcome
    }

    async fn run_phases(
        &mut self,
        plan: &MigrationPlan,
        orders: &HashMap<String, Vec<String>>,
    ) -> Result<PlanRunSummary> {
        let mut summary = PlanRunSummary {
            success: true,
            ..Default::default()
        };

        for phase in &plan.phases {
            if let Some(only) = &self.options.only_phase {
                if only != &phase.id {
                    continue;
                }
            }
            if self.options.resume && self.phase_completed_in_state(&phase.id) {
                info!("Phase '{}' SKIPPED (already complete)", phase.id);
                continue;
            }

            if !self.fire_phase_start(phase) {
                return Err(MigrateError::ListenerAbort(format!(
                    "listener rejected start of phase '{}'",
                    phase.id
                )));
            }
            self.mark_phase(&phase.id, ExecStatus::Running);

            let order = orders.get(&phase.id).cloned().unwrap_or_default();
            let mut phase_success = true;
            let mut abort: Option<MigrateError> = None;

            for task_id in &order {
                let Some(task) = phase.tasks.iter().find(|t| &t.id == task_id).cloned() else {
                    continue;
                };
                if let Some(only) = &self.options.only_task {
                    if only != &task.id {
                        continue;
                    }
                }
                if self.options.resume && self.task_completed_in_state(&phase.id, &task.id) {
                    info!("Task '{}' SKIPPED (already complete)", task.id);
                    continue;
                }

                // Prerequisites must have completed in this run (or a prior
                // resumed one); otherwise the task is skipped with a reason.
                let unmet: Vec<String> = task
                    .depends_on
                    .iter()
                    .filter(|dep| !self.task_completed_in_state(&phase.id, dep))
                    .cloned()
                    .collect();
                if !unmet.is_empty() {
                    let reason = format!("prerequisites not completed: {}", unmet.join(", "));
                    warn!("Task '{}' skipped: {}", task.id, reason);
                    let result = TaskResult {
                        task_id: task.id.clone(),
                        status: ExecStatus::Skipped,
                        message: Some(reason),
                        blocks: Vec::new(),
                    };
                    self.record_task(&phase.id, &task.id, &result);
                    if !self.fire_task_complete(&task, &result) {
                        abort = Some(MigrateError::ListenerAbort(format!(
                            "listener aborted after task '{}'",
                            task.id
                        )));
                        break;
                    }
                    continue;
                }

                if self.cancel.load(Ordering::SeqCst) {
                    abort = Some(MigrateError::Cancelled);
                    break;
                }

                for listener in &mut self.listeners {
                    listener.on_task_start(&task);
                }
                self.record_task_running(&phase.id, &task.id);

                match self.run_task(&task).await {
                    Ok(result) => {
                        summary.blocks_executed += result.blocks.len();
                        if result.status == ExecStatus::Completed {
                            summary.tasks_completed += 1;
                        }
                        self.record_task(&phase.id, &task.id, &result);
                        let listeners_ok = self.fire_task_complete(&task, &result);
                        let failed = result.status == ExecStatus::Failed;
                        if !listeners_ok {
                            abort = Some(MigrateError::ListenerAbort(format!(
                                "listener aborted after task '{}'",
                                task.id
                            )));
                            break;
                        }
                        if failed {
                            phase_success = false;
                            break;
                        }
                    }
                    Err(e) => {
                        let result = TaskResult {
                            task_id: task.id.clone(),
                            status: ExecStatus::Failed,
                            message: Some(e.to_string()),
                            blocks: Vec::new(),
                        };
                        self.record_task(&phase.id, &task.id, &result);
                        self.fire_task_complete(&task, &result);
                        phase_success = false;
                        abort = Some(e);
                        break;
                    }
                }
            }

            let phase_ok = phase_success && abort.is_none();
            self.mark_phase(
                &phase.id,
                if phase_ok {
                    ExecStatus::Completed
                } else {
                    ExecStatus::Failed
                },
            );
            self.checkpoint_variables();
            self.flush_state();

            let listeners_ok = self.fire_phase_complete(phase, phase_ok);
            if let Some(e) = abort {
                return Err(e);
            }
            if !listeners_ok {
                return Err(MigrateError::ListenerAbort(format!(
                    "listener aborted after phase '{}'",
                    phase.id
                )));
            }
            if !phase_success {
                summary.success = false;
                return Ok(summary);
            }
            summary.phases_completed += 1;
        }

        Ok(summary)
    }

    async fn run_task(&mut self, task: &Task) -> Result<TaskResult> {
        let mut results = Vec::new();
        let mut status = ExecStatus::Completed;
        let mut message = None;

        for block in &task.blocks {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(MigrateError::Cancelled);
            }

            if self.options.interactive && !self.options.dry_run && !self.step_all {
                let question = format!("Execute block '{}'?", block.name);
                let answer = {
                    let mut prompter = self.env.prompter.lock().unwrap();
                    ask_step(&mut *prompter, &question)
                };
                match answer {
                    Answer::Yes => {}
                    Answer::SkipAll => self.step_all = true,
                    Answer::No => return Err(MigrateError::Cancelled),
                }
            }

            for listener in &mut self.listeners {
                listener.on_block_start(block);
            }
            let result = execute_block(block, &self.context, &self.env).await?;
            for listener in &mut self.listeners {
                listener.on_block_complete(block, &result);
            }

            // Output variables become visible to later blocks immediately.
            self.context.merge(result.outputs.clone());

            let failed = !result.success;
            let failure_message = result.message.clone();
            results.push(result);
            if failed && !block.continue_on_failure {
                status = ExecStatus::Failed;
                message = failure_message;
                break;
            }
        }

        Ok(TaskResult {
            task_id: task.id.clone(),
            status,
            message,
            blocks: results,
        })
    }

    // ─── Listener helpers (no short-circuit: every listener is invoked) ───

    fn fire_phase_start(&mut self, phase: &Phase) -> bool {
        let mut ok = true;
        for listener in &mut self.listeners {
            ok &= listener.on_phase_start(phase);
        }
        ok
    }

    fn fire_phase_complete(&mut self, phase: &Phase, success: bool) -> bool {
        let mut ok = true;
        for listener in &mut self.listeners {
            ok &= listener.on_phase_complete(phase, success);
        }
        ok
    }

    fn fire_task_complete(&mut self, task: &Task, result: &TaskResult) -> bool {
        let mut ok = true;
        for listener in &mut self.listeners {
            ok &= listener.on_task_complete(task, result);
        }
        ok
    }

    // ─── State bookkeeping ────────────────────────────────────────────────

    fn with_state<R>(&self, f: impl FnOnce(&mut MigrationState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn plan_record<'a>(
        state: &'a mut MigrationState,
        plan_key: &str,
    ) -> &'a mut MigrationExecutionState {
        state
            .migrations
            .entry(plan_key.to_string())
            .or_insert_with(|| MigrationExecutionState::new(plan_key.to_string()))
    }

    fn phase_completed_in_state(&self, phase_id: &str) -> bool {
        let plan_key = self.plan.key();
        self.with_state(|state| {
            state
                .migrations
                .get(&plan_key)
                .map(|m| m.phase_completed(phase_id))
                .unwrap_or(false)
        })
    }

    fn task_completed_in_state(&self, phase_id: &str, task_id: &str) -> bool {
        let plan_key = self.plan.key();
        self.with_state(|state| {
            state
                .migrations
                .get(&plan_key)
                .map(|m| m.task_completed(phase_id, task_id))
                .unwrap_or(false)
        })
    }

    fn mark_phase(&self, phase_id: &str, status: ExecStatus) {
        let plan_key = self.plan.key();
        self.with_state(|state| {
            let record = Self::plan_record(state, &plan_key);
            let phase = record
                .phases
                .entry(phase_id.to_string())
                .or_insert_with(|| PhaseExecutionRecord::pending(phase_id));
            phase.status = status;
            match status {
                ExecStatus::Running => {
                    phase.started_at.get_or_insert_with(Utc::now);
                }
                ExecStatus::Completed | ExecStatus::Failed | ExecStatus::Skipped => {
                    phase.completed_at = Some(Utc::now());
                }
                ExecStatus::Pending => {}
            }
        });
    }

    fn record_task_running(&self, phase_id: &str, task_id: &str) {
        let plan_key = self.plan.key();
        self.with_state(|state| {
            let record = Self::plan_record(state, &plan_key);
            let phase = record
                .phases
                .entry(phase_id.to_string())
                .or_insert_with(|| PhaseExecutionRecord::pending(phase_id));
            let task = phase
                .tasks
                .entry(task_id.to_string())
                .or_insert_with(|| TaskExecutionRecord::pending(task_id));
            task.status = ExecStatus::Running;
            task.started_at = Some(Utc::now());
        });
    }

    fn record_task(&self, phase_id: &str, task_id: &str, result: &TaskResult) {
        let plan_key = self.plan.key();
        self.with_state(|state| {
            let record = Self::plan_record(state, &plan_key);
            let phase = record
                .phases
                .entry(phase_id.to_string())
                .or_insert_with(|| PhaseExecutionRecord::pending(phase_id));
            let task = phase
                .tasks
                .entry(task_id.to_string())
                .or_insert_with(|| TaskExecutionRecord::pending(task_id));
            task.status = result.status;
            task.completed_at = Some(Utc::now());
            task.message = result.message.clone();
            task.blocks = result
                .blocks
                .iter()
                .map(|b| BlockExecutionRecord {
                    name: b.name.clone(),
                    block_type: b.block_type.clone(),
                    status: if b.skipped {
                        ExecStatus::Skipped
                    } else if b.success {
                        ExecStatus::Completed
                    } else {
                        ExecStatus::Failed
                    },
                    message: b.message.clone(),
                    duration_ms: b.duration_ms,
                })
                .collect();
        });
    }

    fn checkpoint_variables(&self) {
        let snapshot = self.context.snapshot();
        self.with_state(|state| state.variable_snapshot = snapshot);
    }

    /// Persist the state document. Dry runs never touch the filesystem.
    fn flush_state(&self) {
        if self.options.dry_run {
            return;
        }
        let state = self.state.lock().unwrap();
        if let Err(e) = self.state_store.save(&state) {
            warn!("State checkpoint failed: {}", e);
        }
    }
}

/// Kahn's algorithm with a deterministic lexicographic tie-break, so runs
/// are reproducible for any two tasks without a path between them.
pub fn topological_order(tasks: &[Task]) -> Result<Vec<String>> {
    let ids: BTreeSet<&String> = tasks.iter().map(|t| &t.id).collect();
    let mut in_degree: BTreeMap<&String, usize> = tasks.iter().map(|t| (&t.id, 0)).collect();
    let mut dependents: BTreeMap<&String, Vec<&String>> = BTreeMap::new();

    for task in tasks {
        for dep in &task.depends_on {
            if !ids.contains(dep) {
                return Err(MigrateError::Config(format!(
                    "Task '{}' depends on unknown task '{}'",
                    task.id, dep
                )));
            }
            *in_degree.get_mut(&task.id).unwrap() += 1;
            dependents.entry(dep).or_default().push(&task.id);
        }
    }

    // BTreeSet keeps the ready set sorted: popping the first element gives
    // the lexicographic tie-break.
    let mut ready: BTreeSet<&String> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::with_capacity(tasks.len());

    while let Some(&next) = ready.iter().next() {
        ready.remove(next);
        order.push(next.clone());
        for &dependent in dependents.get(next).map(Vec::as_slice).unwrap_or(&[]) {
            let degree = in_degree.get_mut(dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != tasks.len() {
        let stuck: Vec<&str> = tasks
            .iter()
            .filter(|t| !order.contains(&t.id))
            .map(|t| t.id.as_str())
            .collect();
        return Err(MigrateError::Config(format!(
            "Task dependency cycle involving: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}
