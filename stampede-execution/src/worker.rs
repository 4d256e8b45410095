//! Worker runtime: connects to the master, runs the scenario it is given and
//! streams results back
//!
//! Scheduling per mode:
//! - batch: one unit, one execution
//! - request: `workload_per_worker` concurrent units, `execute_per_workload` executions each
//! - rampup: a wave of `workload_spawn_count` units every `workload_spawn_second`
//!   seconds up to `max_workload_per_worker`; units repeat until one interval
//!   after the last wave

use stampede_core::{ExecuteId, ExecuteResult, ModeSettings, Scenario, WorkerId};
use stampede_ipc::WorkerMessage;
use stampede_logging::ForwardedLog;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::MasterConnection;
use crate::error::ExecutionResult;
use crate::workload::{Workload, WorkloadContext, WorkloadFactory, WorkloadRegistry};

/// One worker instance, in its own process or as a task inside the master
pub struct WorkerRuntime {
    worker_id: WorkerId,
    registry: Arc<WorkloadRegistry>,
}

impl WorkerRuntime {
    pub fn new(worker_id: WorkerId, registry: Arc<WorkloadRegistry>) -> Self {
        Self {
            worker_id,
            registry,
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Serve one run, then wait for the master to release the worker.
    ///
    /// `logs` receives this process's captured log events; they are relayed
    /// to the master ahead of the `finished` report.
    pub async fn run(
        self,
        master_address: &str,
        logs: Option<mpsc::UnboundedReceiver<ForwardedLog>>,
    ) -> ExecutionResult<()> {
        let worker_id = self.worker_id;
        let (connection, mut control) = MasterConnection::connect(master_address, worker_id).await?;
        let forwarder = logs.map(|logs| connection.forward_logs(logs));
        info!(%worker_id, master = master_address, "Worker connected to master");

        let (execute_id, scenario) = loop {
            match control.recv().await {
                Some(WorkerMessage::Start {
                    execute_id,
                    scenario,
                }) => break (execute_id, scenario),
                Some(WorkerMessage::Shutdown) | None => {
                    info!(%worker_id, "Worker released before start");
                    return Ok(());
                }
                Some(other) => debug!(%worker_id, message = ?other, "Ignoring message before start"),
            }
        };

        let cancel = CancellationToken::new();
        let released = CancellationToken::new();
        let watcher = tokio::spawn(watch_control(
            control,
            execute_id,
            cancel.clone(),
            released.clone(),
        ));

        let factory = match self.registry.factory(scenario.workload_name()) {
            Ok(factory) => factory,
            Err(e) => {
                error!(%worker_id, %execute_id, error = %e, "Cannot run scenario");
                if let Some(forwarder) = &forwarder {
                    forwarder.flush().await;
                }
                let _ = connection.report_error(Some(execute_id), e.to_string());
                watcher.abort();
                return Err(e);
            }
        };

        info!(
            %worker_id,
            %execute_id,
            mode = %scenario.mode(),
            workload = scenario.workload_name(),
            "Starting scenario"
        );

        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<ExecuteResult>();
        let reporter = {
            let connection = connection.clone();
            tokio::spawn(async move {
                while let Some(result) = results_rx.recv().await {
                    if connection.report_result(execute_id, result).is_err() {
                        break;
                    }
                }
            })
        };

        let ctx = WorkloadContext::new(execute_id, worker_id, connection.collections(), cancel.clone());
        let executions = run_scenario(&scenario, factory, ctx, cancel, results_tx).await;
        let _ = reporter.await;

        if let Some(forwarder) = &forwarder {
            forwarder.flush().await;
        }
        connection.report_finished(execute_id, executions)?;
        info!(%worker_id, %execute_id, executions, "Scenario finished");

        released.cancelled().await;
        let _ = watcher.await;
        debug!(%worker_id, "Worker released");
        Ok(())
    }
}

/// Reacts to `cancel` and `shutdown` while the scenario runs
async fn watch_control(
    mut control: mpsc::UnboundedReceiver<WorkerMessage>,
    execute_id: ExecuteId,
    cancel: CancellationToken,
    released: CancellationToken,
) {
    while let Some(message) = control.recv().await {
        match message {
            WorkerMessage::Cancel { execute_id: id } if id == execute_id => {
                info!(%execute_id, "Cancellation requested by master");
                cancel.cancel();
            }
            WorkerMessage::Shutdown => break,
            other => debug!(message = ?other, "Ignoring control message"),
        }
    }

    // Shutdown or a lost master both end the run
    cancel.cancel();
    released.cancel();
}

/// Run every workload unit the scenario asks of one worker and return the
/// number of executions performed
pub async fn run_scenario(
    scenario: &Scenario,
    factory: WorkloadFactory,
    ctx: WorkloadContext,
    cancel: CancellationToken,
    results: mpsc::UnboundedSender<ExecuteResult>,
) -> u64 {
    let mut units = JoinSet::new();

    match scenario.settings() {
        ModeSettings::Batch => {
            units.spawn(run_unit(factory(), ctx.for_new_unit(), Some(1), cancel, results.clone()));
        }
        ModeSettings::Request {
            workload_per_worker,
            execute_per_workload,
        } => {
            for _ in 0..*workload_per_worker {
                units.spawn(run_unit(
                    factory(),
                    ctx.for_new_unit(),
                    Some(*execute_per_workload),
                    cancel.clone(),
                    results.clone(),
                ));
            }
        }
        ModeSettings::Rampup {
            max_workload_per_worker,
            workload_spawn_count,
            workload_spawn_second,
        } => {
            let ramp_done = cancel.child_token();
            let interval = Duration::from_secs(u64::from(*workload_spawn_second));
            let mut spawned = 0u32;

            while spawned < *max_workload_per_worker && !cancel.is_cancelled() {
                let wave = (*workload_spawn_count).min(max_workload_per_worker - spawned);
                for _ in 0..wave {
                    units.spawn(run_unit(
                        factory(),
                        ctx.for_new_unit(),
                        None,
                        ramp_done.clone(),
                        results.clone(),
                    ));
                }
                spawned += wave;
                debug!(worker_id = %ctx.worker_id, spawned, "Spawned workload wave");

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            ramp_done.cancel();
        }
    }

    drop(results);
    let mut executions = 0u64;
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(count) => executions += u64::from(count),
            Err(e) => error!(worker_id = %ctx.worker_id, error = %e, "Workload unit panicked"),
        }
    }
    executions
}

/// Setup, then execute until `limit` executions are done or `stop` fires,
/// then teardown
async fn run_unit(
    mut workload: Box<dyn Workload>,
    ctx: WorkloadContext,
    limit: Option<u32>,
    stop: CancellationToken,
    results: mpsc::UnboundedSender<ExecuteResult>,
) -> u32 {
    if let Err(e) = workload.setup(&ctx).await {
        error!(
            worker_id = %ctx.worker_id,
            workload_id = %ctx.workload_id,
            error = %format!("{:#}", e),
            "Workload setup failed"
        );
        return 0;
    }

    let mut executed = 0u32;
    while limit.map_or(true, |limit| executed < limit) && !stop.is_cancelled() {
        let started = Instant::now();
        let outcome = workload.execute(&ctx).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(()) => ExecuteResult::success(ctx.worker_id, ctx.workload_id, executed, elapsed),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(
                    worker_id = %ctx.worker_id,
                    workload_id = %ctx.workload_id,
                    execution_no = executed,
                    error = %message,
                    "Execution failed"
                );
                ExecuteResult::failure(ctx.worker_id, ctx.workload_id, executed, elapsed, message)
            }
        };
        let _ = results.send(result);
        executed += 1;

        // Suspension point between executions
        tokio::task::yield_now().await;
    }

    if let Err(e) = workload.teardown(&ctx).await {
        error!(
            worker_id = %ctx.worker_id,
            workload_id = %ctx.workload_id,
            error = %format!("{:#}", e),
            "Workload teardown failed"
        );
    }
    executed
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use stampede_collections::CollectionService;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Calls {
        setups: u32,
        executes: u32,
        teardowns: u32,
    }

    struct Recording {
        calls: Arc<Mutex<Calls>>,
        fail_setup: bool,
        fail_every_other: bool,
        pause: Option<Duration>,
    }

    #[async_trait]
    impl Workload for Recording {
        async fn setup(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
            self.calls.lock().setups += 1;
            if self.fail_setup {
                anyhow::bail!("setup refused");
            }
            Ok(())
        }

        async fn execute(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
            let n = {
                let mut calls = self.calls.lock();
                calls.executes += 1;
                calls.executes
            };
            if let Some(pause) = self.pause {
                tokio::time::sleep(pause).await;
            }
            if self.fail_every_other && n % 2 == 0 {
                anyhow::bail!("execution {} failed", n);
            }
            Ok(())
        }

        async fn teardown(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
            self.calls.lock().teardowns += 1;
            Ok(())
        }
    }

    fn factory(
        calls: &Arc<Mutex<Calls>>,
        fail_setup: bool,
        fail_every_other: bool,
        pause: Option<Duration>,
    ) -> WorkloadFactory {
        let calls = Arc::clone(calls);
        Arc::new(move || {
            Box::new(Recording {
                calls: Arc::clone(&calls),
                fail_setup,
                fail_every_other,
                pause,
            }) as Box<dyn Workload>
        })
    }

    fn context(cancel: &CancellationToken) -> WorkloadContext {
        WorkloadContext::new(
            ExecuteId::new(),
            WorkerId::new(),
            Arc::new(CollectionService::new()),
            cancel.clone(),
        )
    }

    async fn run(
        scenario: &Scenario,
        factory: WorkloadFactory,
        cancel: CancellationToken,
    ) -> (u64, Vec<ExecuteResult>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executions = run_scenario(scenario, factory, context(&cancel), cancel, tx).await;
        let mut results = Vec::new();
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }
        (executions, results)
    }

    #[tokio::test]
    async fn test_batch_runs_one_execution() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let scenario = Scenario::batch("recording", 3).unwrap();

        let (executions, results) =
            run(&scenario, factory(&calls, false, false, None), CancellationToken::new()).await;

        assert_eq!(executions, 1);
        assert_eq!(results.len(), 1);
        assert!(!results[0].has_error);
        assert_eq!(results[0].execution_no, 0);

        let calls = calls.lock();
        assert_eq!((calls.setups, calls.executes, calls.teardowns), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_request_runs_units_concurrently_and_keeps_going_after_failures() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let scenario = Scenario::request("recording", 1, 3, 4).unwrap();

        let (executions, results) =
            run(&scenario, factory(&calls, false, true, None), CancellationToken::new()).await;

        assert_eq!(executions, 12);
        assert_eq!(results.len(), 12);
        assert_eq!(results.iter().filter(|r| r.has_error).count(), 6);

        let units: HashSet<_> = results.iter().map(|r| r.workload_id).collect();
        assert_eq!(units.len(), 3);

        let calls = calls.lock();
        assert_eq!(calls.setups, 3);
        assert_eq!(calls.teardowns, 3);
    }

    #[tokio::test]
    async fn test_setup_failure_skips_execute_and_teardown() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let scenario = Scenario::request("recording", 1, 2, 5).unwrap();

        let (executions, results) =
            run(&scenario, factory(&calls, true, false, None), CancellationToken::new()).await;

        assert_eq!(executions, 0);
        assert!(results.is_empty());

        let calls = calls.lock();
        assert_eq!((calls.setups, calls.executes, calls.teardowns), (2, 0, 0));
    }

    #[tokio::test]
    async fn test_cancelled_run_still_tears_down() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let scenario = Scenario::request("recording", 1, 2, 1_000_000).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let (executions, _) = run(
            &scenario,
            factory(&calls, false, false, Some(Duration::from_millis(1))),
            cancel,
        )
        .await;

        assert!(executions < 2_000_000);
        let calls = calls.lock();
        assert_eq!(calls.setups, 2);
        assert_eq!(calls.teardowns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rampup_spawns_waves_until_max() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let scenario = Scenario::rampup("recording", 1, 5, 2, 1).unwrap();
        let started = tokio::time::Instant::now();

        let (executions, results) = run(
            &scenario,
            factory(&calls, false, false, Some(Duration::from_millis(100))),
            CancellationToken::new(),
        )
        .await;

        // Waves at 0s, 1s and 2s (2 + 2 + 1 units); the ramp ends at 3s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));

        let units: HashSet<_> = results.iter().map(|r| r.workload_id).collect();
        assert_eq!(units.len(), 5);
        assert_eq!(executions, results.len() as u64);

        let calls = calls.lock();
        assert_eq!(calls.setups, 5);
        assert_eq!(calls.teardowns, 5);
    }
}
