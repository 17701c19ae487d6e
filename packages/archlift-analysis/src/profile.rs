//! Per-phase execution statistics.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectorStats {
    pub invocations: u64,
    pub mutations: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassProfile {
    pub index: usize,
    pub items_processed: usize,
    pub items_touched: usize,
    pub duration_ms: u64,
}

/// Timing and inspector statistics for one analysis phase.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionProfile {
    pub phase_name: String,
    pub passes: Vec<PassProfile>,
    pub inspector_stats: BTreeMap<String, InspectorStats>,
    pub total_duration_ms: u64,
}

impl ExecutionProfile {
    pub fn new(phase_name: impl Into<String>) -> Self {
        Self {
            phase_name: phase_name.into(),
            passes: Vec::new(),
            inspector_stats: BTreeMap::new(),
            total_duration_ms: 0,
        }
    }
}

/// Thread-safe recorder handed to analyzer callbacks during a pass.
#[derive(Default)]
pub struct ProfileRecorder {
    stats: DashMap<String, InspectorStats>,
}

impl ProfileRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_invocation(&self, inspector_id: &str) {
        self.stats
            .entry(inspector_id.to_string())
            .or_default()
            .invocations += 1;
    }

    pub fn record_mutation(&self, inspector_id: &str) {
        self.stats
            .entry(inspector_id.to_string())
            .or_default()
            .mutations += 1;
    }

    pub fn record_error(&self, inspector_id: &str) {
        self.stats
            .entry(inspector_id.to_string())
            .or_default()
            .errors += 1;
    }

    pub fn into_stats(self) -> BTreeMap<String, InspectorStats> {
        self.stats
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_accumulates() {
        let recorder = ProfileRecorder::new();
        recorder.record_invocation("a");
        recorder.record_invocation("a");
        recorder.record_mutation("a");
        recorder.record_error("b");

        let stats = recorder.into_stats();
        assert_eq!(stats["a"].invocations, 2);
        assert_eq!(stats["a"].mutations, 1);
        assert_eq!(stats["b"].errors, 1);
    }
}
