//! Execution metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Timing collected over one execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    /// Wall-clock duration of the whole `execute` call
    pub total_duration_ms: f64,

    /// Wall-clock duration per node. A node reached by several paths keeps
    /// the duration of its latest run.
    pub node_durations_ms: BTreeMap<String, f64>,

    /// Data fetcher response time per data_source node
    pub data_source_response_ms: BTreeMap<String, f64>,

    /// Every node execution, failed ones included
    pub nodes_executed: usize,
    pub nodes_failed: usize,
}

impl ExecutionMetrics {
    pub(crate) fn record_node(&mut self, node_id: &str, elapsed: Duration, failed: bool) {
        self.node_durations_ms.insert(node_id.to_string(), millis(elapsed));
        self.nodes_executed += 1;
        if failed {
            self.nodes_failed += 1;
        }
    }

    pub(crate) fn record_data_source(&mut self, node_id: &str, elapsed: Duration) {
        self.data_source_response_ms.insert(node_id.to_string(), millis(elapsed));
    }
}

pub(crate) fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
