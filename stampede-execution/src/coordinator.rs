//! Execution coordinator: runs one scenario at a time across the workers a
//! scaling provider brings up
//!
//! Status moves `NOT_READY -> RUNNING -> STOP | ERROR`. A run ends in ERROR
//! when the fail signal fired or at least one error-level event was captured
//! while it ran; an external [`ExecutionCoordinator::stop`] moves it to STOP
//! immediately. A new run is accepted only after the previous one has
//! fully torn down.

use parking_lot::Mutex;
use stampede_collections::{CollectionService, CollectionTransport};
use stampede_config::{
    ExecutionConfig, MasterConfig, StampedeConfig, WorkerDisconnectedBehaviour,
};
use stampede_core::{
    ExecuteId, ExecuteResult, ExecuteStatus, ExecutionContext, LogLevel, Scenario, WorkerId,
};
use stampede_ipc::WorkerMessage;
use stampede_logging::{FailureMessage, LogCapture};
use stampede_report::{aggregate, AbReport};
use stampede_server::{MasterEvent, MasterHost, WorkerHub};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{ExecutionError, ExecutionResult};
use crate::fail_signal::FailSignal;
use crate::profiler::{LoggingProfiler, ProfileEntry, Profiler};
use crate::provider::{ScalingProvider, WorkerLaunch};
use crate::workload::{MasterContext, MasterHook, WorkloadRegistry};

/// Notified on every status change
pub trait StatusObserver: Send + Sync {
    fn status_changed(&self, execute_id: ExecuteId, status: ExecuteStatus);
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub execute_id: ExecuteId,
    pub status: ExecuteStatus,
    pub elapsed: Duration,
    pub results: Vec<ExecuteResult>,
    /// `None` when no result was reported
    pub report: Option<AbReport>,
    /// Error-level events captured during the run
    pub failures: Vec<FailureMessage>,
    /// The provider-fatal error, when the fail signal fired
    pub fail_error: Option<ExecutionError>,
}

#[derive(Default)]
struct RunState {
    context: Option<ExecutionContext>,
    cancel: Option<CancellationToken>,
    stop_requested: bool,
    /// Set from launch until teardown completes, also after a forced stop
    active: bool,
}

/// Releases the in-flight flag when a run ends or its future is dropped
struct ActiveRun<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.active = false;
        state.cancel = None;
    }
}

pub struct ExecutionCoordinator {
    master: MasterConfig,
    execution: ExecutionConfig,
    worker_log_level: LogLevel,
    provider: tokio::sync::Mutex<Box<dyn ScalingProvider>>,
    scaling_name: &'static str,
    collections: Arc<CollectionService>,
    capture: LogCapture,
    profiler: Arc<dyn Profiler>,
    profiles: TaskTracker,
    observer: Option<Arc<dyn StatusObserver>>,
    registry: Option<Arc<WorkloadRegistry>>,
    master_hooks: Option<Arc<WorkloadRegistry>>,
    state: Mutex<RunState>,
}

impl ExecutionCoordinator {
    /// `capture` must be the capture installed in the master's subscriber
    pub fn new(config: &StampedeConfig, provider: Box<dyn ScalingProvider>, capture: LogCapture) -> Self {
        Self {
            master: config.master.clone(),
            execution: config.execution.clone(),
            worker_log_level: config.logging.worker_level(),
            scaling_name: provider.name(),
            provider: tokio::sync::Mutex::new(provider),
            collections: Arc::new(CollectionService::new()),
            capture,
            profiler: Arc::new(LoggingProfiler),
            profiles: TaskTracker::new(),
            observer: None,
            registry: None,
            master_hooks: None,
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Reject unknown workload names before any worker is launched; the
    /// registry's master hooks are used as well
    pub fn with_registry(mut self, registry: Arc<WorkloadRegistry>) -> Self {
        self.master_hooks = Some(Arc::clone(&registry));
        self.registry = Some(registry);
        self
    }

    /// Run the master hooks of `registry` without validating names against it
    pub fn with_master_hooks(mut self, registry: Arc<WorkloadRegistry>) -> Self {
        self.master_hooks = Some(registry);
        self
    }

    pub fn with_collections(mut self, collections: Arc<CollectionService>) -> Self {
        self.collections = collections;
        self
    }

    pub fn status(&self) -> ExecuteStatus {
        self.state
            .lock()
            .context
            .as_ref()
            .map(ExecutionContext::status)
            .unwrap_or_default()
    }

    pub fn execute_id(&self) -> Option<ExecuteId> {
        self.state.lock().context.as_ref().map(ExecutionContext::execute_id)
    }

    pub fn collections(&self) -> Arc<CollectionService> {
        Arc::clone(&self.collections)
    }

    pub fn capture(&self) -> &LogCapture {
        &self.capture
    }

    /// `true` from launch until the run has fully torn down
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Force the running run to STOP; `false` when nothing is running
    pub fn stop(&self) -> bool {
        let execute_id = {
            let mut state = self.state.lock();
            let Some(context) = state.context.as_mut() else {
                return false;
            };
            if context.transition(ExecuteStatus::Stop).is_err() {
                return false;
            }
            let execute_id = context.execute_id();
            state.stop_requested = true;
            if let Some(cancel) = &state.cancel {
                cancel.cancel();
            }
            execute_id
        };

        info!(%execute_id, "Stop requested");
        self.notify(execute_id, ExecuteStatus::Stop);
        true
    }

    /// Run one scenario to completion.
    ///
    /// Validation failures are returned before anything is launched. Every
    /// other failure is folded into the outcome's status.
    pub async fn execute(&self, scenario: Scenario) -> ExecutionResult<ExecutionOutcome> {
        scenario.validate()?;
        if let Some(registry) = &self.registry {
            if !registry.contains(scenario.workload_name()) {
                return Err(ExecutionError::UnknownWorkload(
                    scenario.workload_name().to_string(),
                ));
            }
        }

        let mut context = ExecutionContext::new(scenario);
        let execute_id = context.execute_id();
        let cancel = CancellationToken::new();
        {
            let mut state = self.state.lock();
            if state.active {
                return Err(ExecutionError::InvalidState(
                    "a run is already in progress".to_string(),
                ));
            }
            self.capture.logs().clear();
            self.capture.failures().clear();
            context.transition(ExecuteStatus::Running)?;
            state.context = Some(context.clone());
            state.cancel = Some(cancel.clone());
            state.stop_requested = false;
            state.active = true;
        }
        let _active = ActiveRun { state: &self.state };
        self.notify(execute_id, ExecuteStatus::Running);

        let scenario = context.scenario();
        info!(
            %execute_id,
            mode = %scenario.mode(),
            workload = scenario.workload_name(),
            workers = scenario.worker_count(),
            scaling = self.scaling_name,
            "Run started"
        );

        let stopwatch = std::time::Instant::now();
        let fail = FailSignal::new();
        let results = self.drive(&context, &fail, &cancel).await;
        let elapsed = stopwatch.elapsed();

        let failures = self.capture.failures().get_all();
        let (status, forced) = {
            let mut state = self.state.lock();
            let forced = state.stop_requested;
            let status = if forced {
                ExecuteStatus::Stop
            } else if fail.is_set() || !failures.is_empty() {
                ExecuteStatus::Error
            } else {
                ExecuteStatus::Stop
            };
            if let Some(context) = state
                .context
                .as_mut()
                .filter(|context| context.execute_id() == execute_id)
            {
                if context.status() == ExecuteStatus::Running {
                    context.transition(status)?;
                }
            }
            (status, forced)
        };
        if !forced {
            self.notify(execute_id, status);
        }

        info!(
            %execute_id,
            %status,
            elapsed_ms = elapsed.as_millis() as u64,
            results = results.len(),
            failures = failures.len(),
            "Run finished"
        );

        self.record_profile(ProfileEntry {
            execute_id,
            workload_name: scenario.workload_name().to_string(),
            args: scenario.to_args(),
            elapsed,
            status,
            recorded_at: chrono::Utc::now(),
        });

        Ok(ExecutionOutcome {
            execute_id,
            status,
            elapsed,
            report: aggregate(&results, scenario, self.scaling_name),
            results,
            failures,
            fail_error: fail.error(),
        })
    }

    /// Host, launch, set up, collect and tear down; returns the collected results
    async fn drive(
        &self,
        context: &ExecutionContext,
        fail: &FailSignal,
        cancel: &CancellationToken,
    ) -> Vec<ExecuteResult> {
        let execute_id = context.execute_id();
        let scenario = context.scenario();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let host = match MasterHost::bind(
            &self.master.bind_address(),
            Arc::clone(&self.collections),
            events_tx,
        )
        .await
        {
            Ok(host) => host,
            Err(e) => {
                error!(%execute_id, error = %e, "Failed to start master host");
                fail.set_error(e.into());
                return Vec::new();
            }
        };

        let master_address = self.advertised_address(host.local_addr());
        let hub = host.hub();
        let host_shutdown = CancellationToken::new();
        let host_task = tokio::spawn(host.serve(host_shutdown.clone()));

        let hook = self
            .master_hooks
            .as_ref()
            .and_then(|registry| registry.master_hook(scenario.workload_name()));
        let collections: Arc<dyn CollectionTransport> = self.collections.clone();
        let mut set_up = false;

        let mut provider = self.provider.lock().await;
        let launch = WorkerLaunch {
            scenario: scenario.clone(),
            worker_count: scenario.worker_count(),
            master_address,
            log_level: self.worker_log_level,
        };

        let mut results = Vec::new();
        match provider
            .start_workers(launch, fail.clone(), cancel.child_token())
            .await
        {
            Ok(()) => {
                let mut run = RunLoop {
                    execute_id,
                    worker_count: scenario.worker_count() as usize,
                    hub: Arc::clone(&hub),
                    events: events_rx,
                    fail: fail.clone(),
                    cancel: cancel.clone(),
                    disconnected_behaviour: self.master.worker_disconnected_behaviour,
                    started: false,
                    connected: HashSet::new(),
                    finished: HashSet::new(),
                    gone: HashSet::new(),
                    results: Vec::new(),
                };
                let connected = run.wait_for_workers(self.master.connect_timeout).await;
                if connected {
                    let ctx = MasterContext::new(
                        execute_id,
                        Arc::clone(&collections),
                        cancel.child_token(),
                    );
                    set_up = match &hook {
                        Some(hook) => self.master_setup(hook.as_ref(), &ctx, fail).await,
                        None => true,
                    };
                }
                if set_up {
                    run.start_and_collect(scenario, &self.execution).await;
                } else {
                    run.wind_down(self.execution.teardown_grace).await;
                }
                results = run.results;
            }
            Err(e) => {
                error!(%execute_id, error = %e, "Failed to start workers");
                fail.set_error(e);
            }
        }

        hub.broadcast(&WorkerMessage::Shutdown);
        if let (true, Some(hook)) = (set_up, &hook) {
            // Teardown runs even after a cancel, so it gets a token of its own
            let ctx = MasterContext::new(execute_id, collections, CancellationToken::new());
            self.master_teardown(hook.as_ref(), &ctx).await;
        }
        if let Err(e) = provider.shutdown().await {
            warn!(%execute_id, error = %e, "Provider shutdown failed");
        }
        drop(provider);

        host_shutdown.cancel();
        if let Err(e) = host_task.await {
            warn!(%execute_id, error = %e, "Master host task failed");
        }
        results
    }

    /// `true` when the workers may be started
    async fn master_setup(&self, hook: &dyn MasterHook, ctx: &MasterContext, fail: &FailSignal) -> bool {
        let execute_id = ctx.execute_id;
        debug!(%execute_id, "Running master setup");
        let outcome = tokio::select! {
            biased;
            _ = fail.wait() => return false,
            _ = ctx.cancelled() => {
                info!(%execute_id, "Run cancelled during master setup");
                return false;
            }
            outcome = tokio::time::timeout(self.execution.timeout, hook.setup(ctx)) => outcome,
        };

        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(%execute_id, error = %e, "Master setup failed");
                fail.set_error(ExecutionError::MasterHook(e.to_string()));
                false
            }
            Err(_) => {
                let message = format!(
                    "master setup did not finish within {}s",
                    self.execution.timeout.as_secs()
                );
                error!(%execute_id, "{}", message);
                fail.set_error(ExecutionError::Timeout(message));
                false
            }
        }
    }

    async fn master_teardown(&self, hook: &dyn MasterHook, ctx: &MasterContext) {
        let execute_id = ctx.execute_id;
        debug!(%execute_id, "Running master teardown");
        match tokio::time::timeout(self.execution.timeout, hook.teardown(ctx)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(%execute_id, error = %e, "Master teardown failed"),
            Err(_) => error!(
                %execute_id,
                timeout_secs = self.execution.timeout.as_secs(),
                "Master teardown timed out"
            ),
        }
    }

    fn advertised_address(&self, local: SocketAddr) -> String {
        if let Some(host) = &self.master.advertise_host {
            return format!("{}:{}", host, local.port());
        }
        let ip = match local.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, local.port()).to_string()
    }

    fn notify(&self, execute_id: ExecuteId, status: ExecuteStatus) {
        if let Some(observer) = &self.observer {
            observer.status_changed(execute_id, status);
        }
    }

    /// Wait until every profile handed to the profiler has been recorded
    pub async fn wait_for_profiles(&self) {
        self.profiles.close();
        self.profiles.wait().await;
        self.profiles.reopen();
    }

    fn record_profile(&self, entry: ProfileEntry) {
        let profiler = Arc::clone(&self.profiler);
        self.profiles.spawn(async move {
            let execute_id = entry.execute_id;
            if let Err(e) = profiler.record(entry).await {
                warn!(%execute_id, error = %e, "Failed to record run profile");
            }
        });
    }
}

enum Step {
    Event(Option<MasterEvent>),
    Failed,
    Cancelled,
    Deadline,
}

/// Event loop of one run
struct RunLoop {
    execute_id: ExecuteId,
    worker_count: usize,
    hub: Arc<WorkerHub>,
    events: mpsc::UnboundedReceiver<MasterEvent>,
    fail: FailSignal,
    cancel: CancellationToken,
    disconnected_behaviour: WorkerDisconnectedBehaviour,
    started: bool,
    connected: HashSet<WorkerId>,
    finished: HashSet<WorkerId>,
    gone: HashSet<WorkerId>,
    results: Vec<ExecuteResult>,
}

impl RunLoop {
    async fn start_and_collect(&mut self, scenario: &Scenario, execution: &ExecutionConfig) {
        self.started = true;
        let delivered = self.hub.broadcast(&WorkerMessage::Start {
            execute_id: self.execute_id,
            scenario: scenario.clone(),
        });
        info!(execute_id = %self.execute_id, workers = delivered, "Scenario started on workers");

        let deadline = Instant::now() + execution.timeout;
        while !self.all_done() {
            match self.next_step(deadline).await {
                Step::Event(Some(event)) => self.handle(event),
                Step::Event(None) => break,
                Step::Failed => {
                    warn!(execute_id = %self.execute_id, "Run aborted by a fatal provider error");
                    self.wind_down(execution.teardown_grace).await;
                    return;
                }
                Step::Cancelled => {
                    info!(execute_id = %self.execute_id, "Run cancelled");
                    self.wind_down(execution.teardown_grace).await;
                    return;
                }
                Step::Deadline => {
                    error!(
                        execute_id = %self.execute_id,
                        timeout_secs = execution.timeout.as_secs(),
                        finished = self.finished.len(),
                        expected = self.worker_count,
                        "Run timed out"
                    );
                    self.wind_down(execution.teardown_grace).await;
                    return;
                }
            }
        }
    }

    /// `true` once every expected worker has connected
    async fn wait_for_workers(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.connected.len() < self.worker_count {
            match self.next_step(deadline).await {
                Step::Event(Some(event)) => self.handle(event),
                Step::Event(None) | Step::Failed | Step::Cancelled => return false,
                Step::Deadline => {
                    let message = format!(
                        "only {} of {} workers connected within {}s",
                        self.connected.len(),
                        self.worker_count,
                        timeout.as_secs()
                    );
                    error!(execute_id = %self.execute_id, "{}", message);
                    self.fail.set_error(ExecutionError::Timeout(message));
                    return false;
                }
            }
        }
        debug!(execute_id = %self.execute_id, workers = self.worker_count, "All workers connected");
        true
    }

    async fn next_step(&mut self, deadline: Instant) -> Step {
        tokio::select! {
            biased;
            _ = self.fail.wait() => Step::Failed,
            _ = self.cancel.cancelled() => Step::Cancelled,
            event = self.events.recv() => Step::Event(event),
            _ = tokio::time::sleep_until(deadline) => Step::Deadline,
        }
    }

    /// Ask workers to stop and keep collecting for the grace period
    async fn wind_down(&mut self, grace: Duration) {
        if self.started {
            self.hub.broadcast(&WorkerMessage::Cancel {
                execute_id: self.execute_id,
            });
        }

        let deadline = Instant::now() + grace;
        while self.started && !self.all_done() {
            let event = tokio::select! {
                event = self.events.recv() => event,
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(execute_id = %self.execute_id, "Teardown grace elapsed");
                    break;
                }
            };
            match event {
                Some(event) => self.handle(event),
                None => break,
            }
        }
    }

    fn all_done(&self) -> bool {
        self.finished.len() + self.gone.len() >= self.worker_count
    }

    fn handle(&mut self, event: MasterEvent) {
        match event {
            MasterEvent::WorkerConnected { worker_id, pid } => {
                self.connected.insert(worker_id);
                debug!(
                    %worker_id,
                    pid,
                    connected = self.connected.len(),
                    expected = self.worker_count,
                    "Worker joined run"
                );
            }
            MasterEvent::WorkerDisconnected { worker_id, finished } => {
                if finished || self.finished.contains(&worker_id) {
                    return;
                }
                if !self.started {
                    self.connected.remove(&worker_id);
                    error!(%worker_id, "Worker disconnected before the run started");
                    return;
                }
                if self.gone.insert(worker_id) {
                    error!(%worker_id, "Worker disconnected before finishing");
                    if self.disconnected_behaviour == WorkerDisconnectedBehaviour::Stop {
                        self.cancel.cancel();
                    }
                }
            }
            MasterEvent::ResultReported { execute_id, result } => {
                if execute_id == self.execute_id {
                    self.results.push(result);
                } else {
                    debug!(%execute_id, "Dropping result of another run");
                }
            }
            MasterEvent::WorkerFinished {
                execute_id,
                worker_id,
                executions,
            } => {
                if execute_id == self.execute_id {
                    self.finished.insert(worker_id);
                    debug!(
                        %worker_id,
                        executions,
                        finished = self.finished.len(),
                        expected = self.worker_count,
                        "Worker finished"
                    );
                }
            }
            MasterEvent::SubsystemError { subsystem, message } => {
                error!(subsystem = %subsystem, "{}", message);
            }
        }
    }
}
