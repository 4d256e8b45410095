//! Fixed-layout text rendering of [`AbReport`]
//!
//! Field order and the "(longest request)" annotation are relied on by
//! consumers that parse the output.

use std::fmt;

use crate::aggregate::AbReport;

const LABEL_WIDTH: usize = 24;

fn field(f: &mut fmt::Formatter<'_>, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "{:<width$}{}", format!("{}:", label), value, width = LABEL_WIDTH)
}

impl fmt::Display for AbReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        field(f, "Scenario Name", &self.scenario_name)?;
        field(f, "Scaling Type", &self.scaling_type)?;
        field(f, "Request count", self.request_count)?;
        field(f, "WorkerCount", self.worker_count)?;
        field(f, "WorkloadPerWorker", self.workload_per_worker)?;
        field(f, "ExecutePerWorkload", self.execute_per_workload)?;
        field(f, "Concurrency level", self.concurrency)?;
        field(f, "Total requests", self.total_requests)?;
        field(f, "Complete requests", self.complete_requests)?;
        field(f, "Failed requests", self.failed_requests)?;
        writeln!(f)?;

        field(f, "Time taken for tests", format_args!("{:.3} seconds", self.time_taken))?;
        field(
            f,
            "Requests per second",
            format_args!("{:.2} [#/sec] (mean)", self.requests_per_second),
        )?;
        field(
            f,
            "Time per request",
            format_args!("{:.3} [ms] (mean)", self.time_per_request),
        )?;
        field(
            f,
            "Time per request",
            format_args!(
                "{:.3} [ms] (mean, across all concurrent requests)",
                self.time_per_request_concurrent
            ),
        )?;
        writeln!(f)?;

        writeln!(f, "Percentage of the requests served within a certain time (ms)")?;
        for row in &self.percentiles {
            write!(f, " {:>3}%   {:>8.2}", row.percentile, row.value)?;
            match row.note {
                Some(note) => writeln!(f, " ({})", note)?,
                None => writeln!(f)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PercentileRow;

    fn report() -> AbReport {
        AbReport {
            scenario_name: "sample".to_string(),
            scaling_type: "process".to_string(),
            request_count: 4,
            worker_count: 2,
            workload_per_worker: 2,
            execute_per_workload: 1,
            concurrency: 4,
            total_requests: 4,
            complete_requests: 3,
            failed_requests: 1,
            time_taken: 0.8,
            requests_per_second: 5.0,
            time_per_request: 200.0,
            time_per_request_concurrent: 800.0,
            percentiles: vec![
                PercentileRow {
                    percentile: 50,
                    value: 100.0,
                    note: None,
                },
                PercentileRow {
                    percentile: 100,
                    value: 500.0,
                    note: Some("longest request"),
                },
            ],
        }
    }

    #[test]
    fn test_layout_order() {
        let text = report().to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Scenario Name:          sample");
        assert_eq!(lines[1], "Scaling Type:           process");
        assert!(lines[2].starts_with("Request count:"));
        assert!(lines[3].starts_with("WorkerCount:"));
        assert!(lines[4].starts_with("WorkloadPerWorker:"));
        assert!(lines[5].starts_with("ExecutePerWorkload:"));
        assert!(lines[6].starts_with("Concurrency level:"));
        assert_eq!(lines[7], "Total requests:         4");
        assert!(lines[8].starts_with("Complete requests:"));
        assert_eq!(lines[9], "Failed requests:        1");
        assert_eq!(lines[10], "");
        assert_eq!(lines[11], "Time taken for tests:   0.800 seconds");
        assert_eq!(lines[12], "Requests per second:    5.00 [#/sec] (mean)");
        assert_eq!(lines[13], "Time per request:       200.000 [ms] (mean)");
        assert_eq!(
            lines[14],
            "Time per request:       800.000 [ms] (mean, across all concurrent requests)"
        );
        assert_eq!(lines[15], "");
        assert_eq!(
            lines[16],
            "Percentage of the requests served within a certain time (ms)"
        );
        assert_eq!(lines[17], "  50%     100.00");
        assert_eq!(lines[18], " 100%     500.00 (longest request)");
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["failed_requests"], 1);
        assert_eq!(json["total_requests"], 4);
        assert_eq!(json["percentiles"][1]["note"], "longest request");
        assert!(json["percentiles"][0].get("note").is_none());
    }
}
