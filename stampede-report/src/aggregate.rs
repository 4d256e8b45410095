use serde::Serialize;
use stampede_core::{ExecuteResult, ModeSettings, Scenario, WorkerId};
use std::collections::HashMap;
use std::time::Duration;

use crate::percentile::{percentile, CUT_POINTS};

/// One row of the percentile table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileRow {
    pub percentile: u32,
    /// Elapsed time in milliseconds
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

/// Aggregated view of one run, in the shape of an `ab` report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbReport {
    pub scenario_name: String,
    pub scaling_type: String,
    pub request_count: u64,
    pub worker_count: u32,
    pub workload_per_worker: u32,
    pub execute_per_workload: u64,
    pub concurrency: u64,
    /// Results actually reported; below `request_count` after a stop
    pub total_requests: u64,
    pub complete_requests: u64,
    pub failed_requests: u64,
    /// Seconds
    pub time_taken: f64,
    pub requests_per_second: f64,
    /// Milliseconds
    pub time_per_request: f64,
    /// Milliseconds, multiplied by the concurrency level
    pub time_per_request_concurrent: f64,
    pub percentiles: Vec<PercentileRow>,
}

/// Aggregate the results of a run; `None` when nothing was recorded.
pub fn aggregate(
    results: &[ExecuteResult],
    scenario: &Scenario,
    scaling_type: &str,
) -> Option<AbReport> {
    if results.is_empty() {
        return None;
    }

    let total = results.len() as u64;
    let failed = results.iter().filter(|r| r.has_error).count() as u64;

    // Workers run side by side; the slowest one bounds the run
    let mut per_worker: HashMap<WorkerId, Duration> = HashMap::new();
    for result in results {
        *per_worker.entry(result.worker_id).or_default() += result.elapsed;
    }
    let time_taken = per_worker
        .values()
        .max()
        .map(Duration::as_secs_f64)
        .unwrap_or_default();

    let concurrency = scenario.concurrency();
    let time_per_request = time_taken * 1000.0 / total as f64;
    let requests_per_second = if time_taken > 0.0 {
        total as f64 / time_taken
    } else {
        0.0
    };

    let execute_per_workload = match scenario.settings() {
        ModeSettings::Batch => 1,
        ModeSettings::Request {
            execute_per_workload,
            ..
        } => u64::from(*execute_per_workload),
        // Open-ended; report the observed average per workload
        ModeSettings::Rampup { .. } => total / concurrency.max(1),
    };

    let mut elapsed: Vec<f64> = results.iter().map(ExecuteResult::elapsed_ms).collect();
    elapsed.sort_by(f64::total_cmp);

    let percentiles = CUT_POINTS
        .iter()
        .filter_map(|&cut| {
            percentile(&elapsed, f64::from(cut) / 100.0).map(|value| PercentileRow {
                percentile: cut,
                value,
                note: (cut == 100).then_some("longest request"),
            })
        })
        .collect();

    Some(AbReport {
        scenario_name: scenario.workload_name().to_string(),
        scaling_type: scaling_type.to_string(),
        request_count: scenario.expected_requests().unwrap_or(total),
        worker_count: scenario.worker_count(),
        workload_per_worker: scenario.workloads_per_worker(),
        execute_per_workload,
        concurrency,
        total_requests: total,
        complete_requests: total - failed,
        failed_requests: failed,
        time_taken,
        requests_per_second,
        time_per_request,
        time_per_request_concurrent: time_per_request * concurrency as f64,
        percentiles,
    })
}
