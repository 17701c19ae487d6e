//! Generic convergence-loop runner.
//!
//! Inspectors may produce data other inspectors need, so a phase iterates
//! over all items until a full pass touches nothing (converged) or the pass
//! budget runs out. Hitting the budget is reported, not an error.

use crate::profile::{ExecutionProfile, PassProfile, ProfileRecorder};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct MultiPassConfig {
    pub phase_name: String,
    pub max_passes: usize,
    /// Tag enabled on every touched node, marking which phase last changed it.
    pub phase_tag: Option<String>,
}

impl MultiPassConfig {
    pub fn new(phase_name: impl Into<String>, max_passes: usize) -> Self {
        Self {
            phase_name: phase_name.into(),
            max_passes,
            phase_tag: None,
        }
    }
}

#[derive(Debug)]
pub struct MultiPassOutcome {
    pub passes_executed: usize,
    pub converged: bool,
    pub total_items_processed: usize,
    pub profile: ExecutionProfile,
}

pub struct MultiPassExecutor {
    parallel: bool,
}

impl MultiPassExecutor {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    /// Run passes until convergence. The analyzer is called once per item
    /// per pass and returns the node ids it actually mutated.
    pub fn execute<T, S, A>(
        &self,
        config: &MultiPassConfig,
        item_supplier: S,
        analyzer: A,
    ) -> MultiPassOutcome
    where
        T: Send + Sync,
        S: Fn() -> Vec<T>,
        A: Fn(&T, DateTime<Utc>, &ProfileRecorder, usize) -> HashSet<String> + Sync,
    {
        let phase_start = Instant::now();
        let recorder = ProfileRecorder::new();
        let mut profile = ExecutionProfile::new(config.phase_name.clone());

        let mut passes_executed = 0;
        let mut total_items_processed = 0;
        let mut converged = false;

        while passes_executed < config.max_passes {
            let pass_index = passes_executed;
            let pass_start_wall = Utc::now();
            let pass_start = Instant::now();

            let items = item_supplier();
            let items_processed = items.len();
            total_items_processed += items_processed;

            let touched: HashSet<String> = if self.parallel {
                items
                    .par_iter()
                    .map(|item| analyzer(item, pass_start_wall, &recorder, pass_index))
                    .reduce(HashSet::new, |mut acc, set| {
                        acc.extend(set);
                        acc
                    })
            } else {
                let mut acc = HashSet::new();
                for item in &items {
                    acc.extend(analyzer(item, pass_start_wall, &recorder, pass_index));
                }
                acc
            };

            passes_executed += 1;
            profile.passes.push(PassProfile {
                index: pass_index,
                items_processed,
                items_touched: touched.len(),
                duration_ms: pass_start.elapsed().as_millis() as u64,
            });

            info!(
                "{}: pass {} processed {} items, touched {}",
                config.phase_name,
                pass_index + 1,
                items_processed,
                touched.len()
            );

            if touched.is_empty() {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "{}: did not converge within {} passes",
                config.phase_name, config.max_passes
            );
        }

        profile.inspector_stats = recorder.into_stats();
        profile.total_duration_ms = phase_start.elapsed().as_millis() as u64;

        MultiPassOutcome {
            passes_executed,
            converged,
            total_items_processed,
            profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_converges_when_nothing_touched() {
        let executor = MultiPassExecutor::new(false);
        let config = MultiPassConfig::new("empty", 5);
        let outcome = executor.execute(
            &config,
            || vec!["a", "b"],
            |_item, _start, _rec, _pass| HashSet::new(),
        );
        assert!(outcome.converged);
        assert_eq!(outcome.passes_executed, 1);
        assert_eq!(outcome.total_items_processed, 2);
    }

    #[test]
    fn test_monotone_mutations_terminate() {
        // Each pass touches one fewer item; convergence after the work dries up.
        let remaining = Mutex::new(vec!["a", "b", "c"]);
        let executor = MultiPassExecutor::new(false);
        let config = MultiPassConfig::new("draining", 10);

        let outcome = executor.execute(
            &config,
            || vec!["a", "b", "c"],
            |item, _start, _rec, _pass| {
                let mut left = remaining.lock();
                if let Some(pos) = left.iter().position(|x| x == item) {
                    if pos == 0 {
                        left.remove(0);
                        let mut touched = HashSet::new();
                        touched.insert(item.to_string());
                        return touched;
                    }
                }
                HashSet::new()
            },
        );

        assert!(outcome.converged);
        // Three draining passes plus the empty confirming pass.
        assert_eq!(outcome.passes_executed, 4);
    }

    #[test]
    fn test_max_passes_reported_not_fatal() {
        let executor = MultiPassExecutor::new(false);
        let config = MultiPassConfig::new("livelock", 3);
        let outcome = executor.execute(
            &config,
            || vec!["a"],
            |item, _start, _rec, _pass| {
                let mut touched = HashSet::new();
                touched.insert(item.to_string());
                touched
            },
        );
        assert!(!outcome.converged);
        assert_eq!(outcome.passes_executed, 3);
        assert_eq!(outcome.profile.passes.len(), 3);
    }

    #[test]
    fn test_parallel_union_of_touched() {
        let executor = MultiPassExecutor::new(true);
        let config = MultiPassConfig::new("parallel", 2);
        let first_pass_done = Mutex::new(false);
        let outcome = executor.execute(
            &config,
            || (0..32).collect::<Vec<i32>>(),
            |item, _start, _rec, pass| {
                let mut touched = HashSet::new();
                if pass == 0 {
                    touched.insert(format!("n{}", item));
                }
                *first_pass_done.lock() = true;
                touched
            },
        );
        assert_eq!(outcome.profile.passes[0].items_touched, 32);
        assert!(outcome.converged);
    }
}
