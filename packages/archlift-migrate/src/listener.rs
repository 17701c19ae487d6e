//! Lifecycle listeners.
//!
//! Listeners observe plan/phase/task/block transitions in registration
//! order, inline on the engine task. Phase-start, phase-complete and
//! task-complete hooks return `false` to abort the plan.

use crate::blocks::BlockResult;
use crate::plan::model::{Block, MigrationPlan, Phase, Task};
use crate::state::{ExecStatus, MigrationState, MigrationStateStore};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub status: ExecStatus,
    pub message: Option<String>,
    pub blocks: Vec<BlockResult>,
}

#[allow(unused_variables)]
pub trait MigrationListener: Send {
    fn on_plan_start(&mut self, plan: &MigrationPlan) {}
    fn on_plan_complete(&mut self, plan: &MigrationPlan, success: bool) {}
    fn on_phase_start(&mut self, phase: &Phase) -> bool {
        true
    }
    fn on_phase_complete(&mut self, phase: &Phase, success: bool) -> bool {
        true
    }
    fn on_task_start(&mut self, task: &Task) {}
    fn on_task_complete(&mut self, task: &Task, result: &TaskResult) -> bool {
        true
    }
    fn on_block_start(&mut self, block: &Block) {}
    fn on_block_complete(&mut self, block: &Block, result: &BlockResult) {}
}

/// Persists the shared state document after every significant transition.
pub struct StateFileListener {
    store: MigrationStateStore,
    state: Arc<Mutex<MigrationState>>,
}

impl StateFileListener {
    pub fn new(store: MigrationStateStore, state: Arc<Mutex<MigrationState>>) -> Self {
        Self { store, state }
    }

    fn flush(&self) {
        let state = self.state.lock().unwrap();
        if let Err(e) = self.store.save(&state) {
            error!("State file write failed: {}", e);
        }
    }
}

impl MigrationListener for StateFileListener {
    fn on_plan_start(&mut self, _plan: &MigrationPlan) {
        self.flush();
    }

    fn on_plan_complete(&mut self, _plan: &MigrationPlan, _success: bool) {
        self.flush();
    }

    fn on_phase_complete(&mut self, _phase: &Phase, _success: bool) -> bool {
        self.flush();
        true
    }

    fn on_task_complete(&mut self, _task: &Task, _result: &TaskResult) -> bool {
        self.flush();
        true
    }
}

/// Pretty-prints progress to the console.
pub struct ConsoleProgressListener;

impl MigrationListener for ConsoleProgressListener {
    fn on_plan_start(&mut self, plan: &MigrationPlan) {
        println!("==> Plan '{}' v{} starting", plan.name, plan.version);
    }

    fn on_plan_complete(&mut self, plan: &MigrationPlan, success: bool) {
        if success {
            println!("==> Plan '{}' completed", plan.name);
        } else {
            println!("==> Plan '{}' FAILED", plan.name);
        }
    }

    fn on_phase_start(&mut self, phase: &Phase) -> bool {
        println!("--> Phase '{}' ({})", phase.name, phase.id);
        true
    }

    fn on_phase_complete(&mut self, phase: &Phase, success: bool) -> bool {
        println!(
            "--> Phase '{}' {}",
            phase.id,
            if success { "done" } else { "failed" }
        );
        true
    }

    fn on_task_start(&mut self, task: &Task) {
        println!("    task '{}' ...", task.id);
    }

    fn on_task_complete(&mut self, task: &Task, result: &TaskResult) -> bool {
        println!("    task '{}' {}", task.id, result.status);
        true
    }

    fn on_block_complete(&mut self, block: &Block, result: &BlockResult) {
        let status = if result.skipped {
            "skipped"
        } else if result.success {
            "ok"
        } else {
            "FAILED"
        };
        info!(
            "block '{}' [{}] {} ({}ms)",
            block.name, result.block_type, status, result.duration_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        events: Vec<String>,
        abort_on_task_complete: bool,
    }

    impl MigrationListener for Recording {
        fn on_task_start(&mut self, task: &Task) {
            self.events.push(format!("start:{}", task.id));
        }

        fn on_task_complete(&mut self, task: &Task, _result: &TaskResult) -> bool {
            self.events.push(format!("complete:{}", task.id));
            !self.abort_on_task_complete
        }
    }

    #[test]
    fn test_default_hooks_do_not_abort() {
        let mut listener = Recording::default();
        let task = Task {
            id: "t".into(),
            name: "T".into(),
            task_type: None,
            depends_on: vec![],
            blocks: vec![],
        };
        listener.on_task_start(&task);
        let result = TaskResult {
            task_id: "t".into(),
            status: ExecStatus::Completed,
            message: None,
            blocks: vec![],
        };
        assert!(listener.on_task_complete(&task, &result));
        assert_eq!(listener.events, vec!["start:t", "complete:t"]);
    }
}
