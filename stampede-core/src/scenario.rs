//! Scenario definitions, validation and argument-vector parsing
//!
//! A scenario is the declarative description of a run. It can be built
//! through the typed constructors, deserialized from configuration, or
//! parsed from the argument vector accepted by the master:
//!
//! ```text
//! request -workloadName sample -workerCount 2 -workloadPerWorker 4 -executePerWorkload 10
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScenarioError;

/// Execution mode of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioMode {
    Batch,
    Request,
    Rampup,
}

impl ScenarioMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioMode::Batch => "batch",
            ScenarioMode::Request => "request",
            ScenarioMode::Rampup => "rampup",
        }
    }
}

impl fmt::Display for ScenarioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScenarioMode {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batch" => Ok(ScenarioMode::Batch),
            "request" => Ok(ScenarioMode::Request),
            "rampup" => Ok(ScenarioMode::Rampup),
            _ => Err(ScenarioError::UnknownMode(s.to_string())),
        }
    }
}

/// Mode-specific scenario fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModeSettings {
    Batch,
    Request {
        workload_per_worker: u32,
        execute_per_workload: u32,
    },
    Rampup {
        max_workload_per_worker: u32,
        workload_spawn_count: u32,
        workload_spawn_second: u32,
    },
}

impl ModeSettings {
    pub fn mode(&self) -> ScenarioMode {
        match self {
            ModeSettings::Batch => ScenarioMode::Batch,
            ModeSettings::Request { .. } => ScenarioMode::Request,
            ModeSettings::Rampup { .. } => ScenarioMode::Rampup,
        }
    }
}

/// Declarative description of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    workload_name: String,
    worker_count: u32,
    #[serde(flatten)]
    settings: ModeSettings,
}

impl Scenario {
    /// Build and validate a scenario
    pub fn new(
        workload_name: impl Into<String>,
        worker_count: u32,
        settings: ModeSettings,
    ) -> Result<Self, ScenarioError> {
        let scenario = Self {
            workload_name: workload_name.into(),
            worker_count,
            settings,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn batch(workload_name: impl Into<String>, worker_count: u32) -> Result<Self, ScenarioError> {
        Self::new(workload_name, worker_count, ModeSettings::Batch)
    }

    pub fn request(
        workload_name: impl Into<String>,
        worker_count: u32,
        workload_per_worker: u32,
        execute_per_workload: u32,
    ) -> Result<Self, ScenarioError> {
        Self::new(
            workload_name,
            worker_count,
            ModeSettings::Request {
                workload_per_worker,
                execute_per_workload,
            },
        )
    }

    pub fn rampup(
        workload_name: impl Into<String>,
        worker_count: u32,
        max_workload_per_worker: u32,
        workload_spawn_count: u32,
        workload_spawn_second: u32,
    ) -> Result<Self, ScenarioError> {
        Self::new(
            workload_name,
            worker_count,
            ModeSettings::Rampup {
                max_workload_per_worker,
                workload_spawn_count,
                workload_spawn_second,
            },
        )
    }

    /// Check the required-field rules for the scenario's mode.
    ///
    /// Deserialized scenarios bypass the constructors, so anything accepting
    /// a scenario from outside calls this before launching workers.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.workload_name.trim().is_empty() {
            return Err(ScenarioError::EmptyWorkloadName);
        }
        positive(self.worker_count, "workerCount")?;

        match self.settings {
            ModeSettings::Batch => {}
            ModeSettings::Request {
                workload_per_worker,
                execute_per_workload,
            } => {
                positive(workload_per_worker, "workloadPerWorker")?;
                positive(execute_per_workload, "executePerWorkload")?;
            }
            ModeSettings::Rampup {
                max_workload_per_worker,
                workload_spawn_count,
                workload_spawn_second,
            } => {
                positive(max_workload_per_worker, "maxWorkloadPerWorker")?;
                positive(workload_spawn_count, "workloadSpawnCount")?;
                positive(workload_spawn_second, "workloadSpawnSecond")?;
            }
        }

        Ok(())
    }

    pub fn mode(&self) -> ScenarioMode {
        self.settings.mode()
    }

    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    pub fn settings(&self) -> &ModeSettings {
        &self.settings
    }

    /// Number of workload units each worker runs at peak
    pub fn workloads_per_worker(&self) -> u32 {
        match self.settings {
            ModeSettings::Batch => 1,
            ModeSettings::Request {
                workload_per_worker, ..
            } => workload_per_worker,
            ModeSettings::Rampup {
                max_workload_per_worker,
                ..
            } => max_workload_per_worker,
        }
    }

    /// Concurrency level across the whole fleet
    pub fn concurrency(&self) -> u64 {
        u64::from(self.worker_count) * u64::from(self.workloads_per_worker())
    }

    /// Total executions the scenario declares, when the mode fixes it up front
    pub fn expected_requests(&self) -> Option<u64> {
        match self.settings {
            ModeSettings::Batch => Some(u64::from(self.worker_count)),
            ModeSettings::Request {
                workload_per_worker,
                execute_per_workload,
            } => Some(
                u64::from(self.worker_count)
                    * u64::from(workload_per_worker)
                    * u64::from(execute_per_workload),
            ),
            ModeSettings::Rampup { .. } => None,
        }
    }

    /// Render the scenario as the master's argument vector
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            self.mode().to_string(),
            "-workloadName".to_string(),
            self.workload_name.clone(),
            "-workerCount".to_string(),
            self.worker_count.to_string(),
        ];

        match self.settings {
            ModeSettings::Batch => {}
            ModeSettings::Request {
                workload_per_worker,
                execute_per_workload,
            } => {
                args.push("-workloadPerWorker".to_string());
                args.push(workload_per_worker.to_string());
                args.push("-executePerWorkload".to_string());
                args.push(execute_per_workload.to_string());
            }
            ModeSettings::Rampup {
                max_workload_per_worker,
                workload_spawn_count,
                workload_spawn_second,
            } => {
                args.push("-maxWorkloadPerWorker".to_string());
                args.push(max_workload_per_worker.to_string());
                args.push("-workloadSpawnCount".to_string());
                args.push(workload_spawn_count.to_string());
                args.push("-workloadSpawnSecond".to_string());
                args.push(workload_spawn_second.to_string());
            }
        }

        args
    }

    /// Parse `mode -workloadName <name> -workerCount <n> ...`
    ///
    /// Flag names are case-insensitive and may use one or two leading dashes.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ScenarioError> {
        let mut iter = args.iter().map(|s| s.as_ref());
        let mode: ScenarioMode = iter.next().ok_or(ScenarioError::MissingMode)?.parse()?;

        let mut parsed = ParsedArgs::default();
        while let Some(flag) = iter.next() {
            let name = flag.trim_start_matches('-');
            if name.len() == flag.len() {
                return Err(ScenarioError::UnknownArgument(flag.to_string()));
            }
            let value = iter
                .next()
                .ok_or_else(|| ScenarioError::MissingValue(flag.to_string()))?;

            let field = ScenarioFlag::lookup(name)
                .ok_or_else(|| ScenarioError::UnknownArgument(flag.to_string()))?;
            if !field.applies_to(mode) {
                return Err(ScenarioError::NotApplicable {
                    flag: flag.to_string(),
                    mode: mode.to_string(),
                });
            }
            parsed.set(field, value)?;
        }

        let workload_name = parsed
            .workload_name
            .ok_or(ScenarioError::MissingArgument("workloadName"))?;
        let worker_count = parsed
            .worker_count
            .ok_or(ScenarioError::MissingArgument("workerCount"))?;

        let settings = match mode {
            ScenarioMode::Batch => ModeSettings::Batch,
            ScenarioMode::Request => ModeSettings::Request {
                workload_per_worker: parsed
                    .workload_per_worker
                    .ok_or(ScenarioError::MissingArgument("workloadPerWorker"))?,
                execute_per_workload: parsed
                    .execute_per_workload
                    .ok_or(ScenarioError::MissingArgument("executePerWorkload"))?,
            },
            ScenarioMode::Rampup => ModeSettings::Rampup {
                max_workload_per_worker: parsed
                    .max_workload_per_worker
                    .ok_or(ScenarioError::MissingArgument("maxWorkloadPerWorker"))?,
                workload_spawn_count: parsed
                    .workload_spawn_count
                    .ok_or(ScenarioError::MissingArgument("workloadSpawnCount"))?,
                workload_spawn_second: parsed
                    .workload_spawn_second
                    .ok_or(ScenarioError::MissingArgument("workloadSpawnSecond"))?,
            },
        };

        Scenario::new(workload_name, worker_count, settings)
    }
}

fn positive(value: u32, field: &'static str) -> Result<(), ScenarioError> {
    if value == 0 {
        return Err(ScenarioError::NotPositive(field));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScenarioFlag {
    WorkloadName,
    WorkerCount,
    WorkloadPerWorker,
    ExecutePerWorkload,
    MaxWorkloadPerWorker,
    WorkloadSpawnCount,
    WorkloadSpawnSecond,
}

impl ScenarioFlag {
    fn lookup(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "workloadname" => Some(Self::WorkloadName),
            "workercount" => Some(Self::WorkerCount),
            "workloadperworker" => Some(Self::WorkloadPerWorker),
            "executeperworkload" => Some(Self::ExecutePerWorkload),
            "maxworkloadperworker" => Some(Self::MaxWorkloadPerWorker),
            "workloadspawncount" => Some(Self::WorkloadSpawnCount),
            "workloadspawnsecond" => Some(Self::WorkloadSpawnSecond),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::WorkloadName => "workloadName",
            Self::WorkerCount => "workerCount",
            Self::WorkloadPerWorker => "workloadPerWorker",
            Self::ExecutePerWorkload => "executePerWorkload",
            Self::MaxWorkloadPerWorker => "maxWorkloadPerWorker",
            Self::WorkloadSpawnCount => "workloadSpawnCount",
            Self::WorkloadSpawnSecond => "workloadSpawnSecond",
        }
    }

    fn applies_to(&self, mode: ScenarioMode) -> bool {
        match self {
            Self::WorkloadName | Self::WorkerCount => true,
            Self::WorkloadPerWorker | Self::ExecutePerWorkload => mode == ScenarioMode::Request,
            Self::MaxWorkloadPerWorker | Self::WorkloadSpawnCount | Self::WorkloadSpawnSecond => {
                mode == ScenarioMode::Rampup
            }
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    workload_name: Option<String>,
    worker_count: Option<u32>,
    workload_per_worker: Option<u32>,
    execute_per_workload: Option<u32>,
    max_workload_per_worker: Option<u32>,
    workload_spawn_count: Option<u32>,
    workload_spawn_second: Option<u32>,
}

impl ParsedArgs {
    fn set(&mut self, flag: ScenarioFlag, value: &str) -> Result<(), ScenarioError> {
        if flag == ScenarioFlag::WorkloadName {
            self.workload_name = Some(value.to_string());
            return Ok(());
        }

        let number: u32 = value.parse().map_err(|_| ScenarioError::InvalidValue {
            name: flag.name(),
            value: value.to_string(),
        })?;

        let slot = match flag {
            ScenarioFlag::WorkloadName => return Ok(()),
            ScenarioFlag::WorkerCount => &mut self.worker_count,
            ScenarioFlag::WorkloadPerWorker => &mut self.workload_per_worker,
            ScenarioFlag::ExecutePerWorkload => &mut self.execute_per_workload,
            ScenarioFlag::MaxWorkloadPerWorker => &mut self.max_workload_per_worker,
            ScenarioFlag::WorkloadSpawnCount => &mut self.workload_spawn_count,
            ScenarioFlag::WorkloadSpawnSecond => &mut self.workload_spawn_second,
        };
        *slot = Some(number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_requires_only_worker_count() {
        let scenario = Scenario::batch("sample", 3).unwrap();
        assert_eq!(scenario.mode(), ScenarioMode::Batch);
        assert_eq!(scenario.concurrency(), 3);
        assert_eq!(scenario.expected_requests(), Some(3));

        assert_eq!(
            Scenario::batch("sample", 0),
            Err(ScenarioError::NotPositive("workerCount"))
        );
    }

    #[test]
    fn test_request_rejects_zero_workload_per_worker() {
        let err = Scenario::request("sample", 2, 0, 10).unwrap_err();
        assert_eq!(err, ScenarioError::NotPositive("workloadPerWorker"));

        let err = Scenario::request("sample", 2, 4, 0).unwrap_err();
        assert_eq!(err, ScenarioError::NotPositive("executePerWorkload"));
    }

    #[test]
    fn test_rampup_validation() {
        assert!(Scenario::rampup("sample", 1, 10, 2, 1).is_ok());
        assert_eq!(
            Scenario::rampup("sample", 1, 10, 2, 0).unwrap_err(),
            ScenarioError::NotPositive("workloadSpawnSecond")
        );
    }

    #[test]
    fn test_empty_workload_name() {
        assert_eq!(
            Scenario::batch("  ", 1).unwrap_err(),
            ScenarioError::EmptyWorkloadName
        );
    }

    #[test]
    fn test_parse_request_args() {
        let scenario = Scenario::from_args(&[
            "request",
            "-workloadName",
            "sample",
            "-workerCount",
            "2",
            "-WORKLOADPERWORKER",
            "4",
            "--executePerWorkload",
            "10",
        ])
        .unwrap();

        assert_eq!(scenario.workload_name(), "sample");
        assert_eq!(scenario.worker_count(), 2);
        assert_eq!(scenario.concurrency(), 8);
        assert_eq!(scenario.expected_requests(), Some(80));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            Scenario::from_args::<&str>(&[]).unwrap_err(),
            ScenarioError::MissingMode
        );
        assert_eq!(
            Scenario::from_args(&["soak", "-workerCount", "1"]).unwrap_err(),
            ScenarioError::UnknownMode("soak".to_string())
        );
        assert_eq!(
            Scenario::from_args(&["batch", "-workloadName", "x"]).unwrap_err(),
            ScenarioError::MissingArgument("workerCount")
        );
        assert_eq!(
            Scenario::from_args(&["batch", "-workloadName", "x", "-workerCount"]).unwrap_err(),
            ScenarioError::MissingValue("-workerCount".to_string())
        );
        assert!(matches!(
            Scenario::from_args(&["batch", "-workloadName", "x", "-workerCount", "two"]),
            Err(ScenarioError::InvalidValue { name: "workerCount", .. })
        ));
        assert!(matches!(
            Scenario::from_args(&["batch", "-workloadName", "x", "-workloadPerWorker", "2"]),
            Err(ScenarioError::NotApplicable { .. })
        ));
        assert!(matches!(
            Scenario::from_args(&["batch", "-color", "red"]),
            Err(ScenarioError::UnknownArgument(_))
        ));
    }

    #[test]
    fn test_request_with_zero_rejected_from_args() {
        let err = Scenario::from_args(&[
            "request",
            "-workloadName",
            "sample",
            "-workerCount",
            "1",
            "-workloadPerWorker",
            "0",
            "-executePerWorkload",
            "1",
        ])
        .unwrap_err();
        assert_eq!(err, ScenarioError::NotPositive("workloadPerWorker"));
    }

    #[test]
    fn test_args_round_trip_through_parser() {
        let scenario = Scenario::rampup("ramp", 2, 12, 3, 5).unwrap();
        let args = scenario.to_args();
        assert_eq!(args[0], "rampup");
        assert_eq!(Scenario::from_args(&args).unwrap(), scenario);
    }

    #[test]
    fn test_deserialized_scenario_is_validated_explicitly() {
        let yaml = r#"
workload_name: sample
worker_count: 2
mode: request
workload_per_worker: 0
execute_per_workload: 5
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.mode(), ScenarioMode::Request);
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::NotPositive("workloadPerWorker"))
        );
    }
}
