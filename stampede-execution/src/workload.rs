//! Workload contract, per-unit context and the name registry

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stampede_collections::{
    CollectionTransport, DistributedDictionary, DistributedList, DistributedQueue, DistributedSet,
    DistributedStack,
};
use stampede_core::{ExecuteId, WorkerId, WorkloadId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{ExecutionError, ExecutionResult};

/// A unit of load. One instance is created per workload unit; `setup` runs
/// once, `execute` once per execution and `teardown` once after the last
/// execution, even when executions failed.
#[async_trait]
pub trait Workload: Send {
    async fn setup(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn execute(&mut self, ctx: &WorkloadContext) -> anyhow::Result<()>;

    async fn teardown(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Master-side work for a workload. `setup` runs once all workers are
/// connected and before they are told to start; `teardown` runs after
/// results are collected. Both are bounded by the execution timeout.
#[async_trait]
pub trait MasterHook: Send + Sync {
    async fn setup(&self, _ctx: &MasterContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn teardown(&self, _ctx: &MasterContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What a master hook can see of the run
#[derive(Clone)]
pub struct MasterContext {
    pub execute_id: ExecuteId,
    collections: Arc<dyn CollectionTransport>,
    cancel: CancellationToken,
}

impl MasterContext {
    pub fn new(
        execute_id: ExecuteId,
        collections: Arc<dyn CollectionTransport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execute_id,
            collections,
            cancel,
        }
    }

    pub fn collections(&self) -> Arc<dyn CollectionTransport> {
        Arc::clone(&self.collections)
    }

    pub fn queue<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedQueue<T> {
        DistributedQueue::new(key, self.collections())
    }

    pub fn list<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedList<T> {
        DistributedList::new(key, self.collections())
    }

    pub fn set<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedSet<T> {
        DistributedSet::new(key, self.collections())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

impl fmt::Debug for MasterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterContext")
            .field("execute_id", &self.execute_id)
            .finish()
    }
}

/// What a workload unit can see of the run it belongs to
#[derive(Clone)]
pub struct WorkloadContext {
    pub execute_id: ExecuteId,
    pub worker_id: WorkerId,
    pub workload_id: WorkloadId,
    collections: Arc<dyn CollectionTransport>,
    cancel: CancellationToken,
}

impl WorkloadContext {
    pub fn new(
        execute_id: ExecuteId,
        worker_id: WorkerId,
        collections: Arc<dyn CollectionTransport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execute_id,
            worker_id,
            workload_id: WorkloadId::new(),
            collections,
            cancel,
        }
    }

    /// A fresh context for another unit of the same worker
    pub fn for_new_unit(&self) -> Self {
        Self {
            workload_id: WorkloadId::new(),
            ..self.clone()
        }
    }

    pub fn queue<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedQueue<T> {
        DistributedQueue::new(key, Arc::clone(&self.collections))
    }

    pub fn stack<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedStack<T> {
        DistributedStack::new(key, Arc::clone(&self.collections))
    }

    pub fn dictionary<K, V>(&self, key: &str) -> DistributedDictionary<K, V>
    where
        K: Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned,
    {
        DistributedDictionary::new(key, Arc::clone(&self.collections))
    }

    pub fn list<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedList<T> {
        DistributedList::new(key, Arc::clone(&self.collections))
    }

    pub fn set<T: Serialize + DeserializeOwned>(&self, key: &str) -> DistributedSet<T> {
        DistributedSet::new(key, Arc::clone(&self.collections))
    }

    /// Long-running executions may poll this and return early
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

impl fmt::Debug for WorkloadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadContext")
            .field("execute_id", &self.execute_id)
            .field("worker_id", &self.worker_id)
            .field("workload_id", &self.workload_id)
            .finish()
    }
}

pub type WorkloadFactory = Arc<dyn Fn() -> Box<dyn Workload> + Send + Sync>;

struct Registration {
    name: String,
    factory: WorkloadFactory,
}

/// Workloads known to this binary, looked up case-insensitively
#[derive(Default)]
pub struct WorkloadRegistry {
    workloads: HashMap<String, Registration>,
    master_hooks: HashMap<String, Arc<dyn MasterHook>>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> ExecutionResult<()>
    where
        F: Fn() -> Box<dyn Workload> + Send + Sync + 'static,
    {
        let lookup = name.to_lowercase();
        if lookup.is_empty() {
            return Err(ExecutionError::UnknownWorkload(name.to_string()));
        }
        if self.workloads.contains_key(&lookup) {
            return Err(ExecutionError::DuplicateWorkload(name.to_string()));
        }

        self.workloads.insert(
            lookup,
            Registration {
                name: name.to_string(),
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Register a workload type built from its `Default`
    pub fn register_default<W>(&mut self, name: &str) -> ExecutionResult<()>
    where
        W: Workload + Default + 'static,
    {
        self.register(name, || Box::new(W::default()))
    }

    /// Attach master-side setup and teardown to a registered workload
    pub fn register_master_hook(
        &mut self,
        name: &str,
        hook: Arc<dyn MasterHook>,
    ) -> ExecutionResult<()> {
        let lookup = name.to_lowercase();
        if !self.workloads.contains_key(&lookup) {
            return Err(ExecutionError::UnknownWorkload(name.to_string()));
        }
        self.master_hooks.insert(lookup, hook);
        Ok(())
    }

    pub fn master_hook(&self, name: &str) -> Option<Arc<dyn MasterHook>> {
        self.master_hooks.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workloads.contains_key(&name.to_lowercase())
    }

    pub fn factory(&self, name: &str) -> ExecutionResult<WorkloadFactory> {
        self.workloads
            .get(&name.to_lowercase())
            .map(|registration| Arc::clone(&registration.factory))
            .ok_or_else(|| ExecutionError::UnknownWorkload(name.to_string()))
    }

    pub fn create(&self, name: &str) -> ExecutionResult<Box<dyn Workload>> {
        self.factory(name).map(|factory| factory())
    }

    /// Registered names as given at registration, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .workloads
            .values()
            .map(|registration| registration.name.clone())
            .collect();
        names.sort_by_key(|name| name.to_lowercase());
        names
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

impl fmt::Debug for WorkloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadRegistry")
            .field("workloads", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Nothing;

    #[async_trait]
    impl Workload for Nothing {
        async fn execute(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = WorkloadRegistry::new();
        registry.register_default::<Nothing>("SampleWorkload").unwrap();

        assert!(registry.contains("sampleworkload"));
        assert!(registry.contains("SAMPLEWORKLOAD"));
        assert!(registry.create("SampleWorkload").is_ok());
        assert_eq!(registry.names(), vec!["SampleWorkload".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = WorkloadRegistry::new();
        registry.register_default::<Nothing>("noop").unwrap();

        let err = registry.register_default::<Nothing>("NOOP").unwrap_err();
        assert_eq!(err, ExecutionError::DuplicateWorkload("NOOP".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_workload() {
        let registry = WorkloadRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.create("missing"),
            Err(ExecutionError::UnknownWorkload(name)) if name == "missing"
        ));
    }

    struct Quiet;

    #[async_trait]
    impl MasterHook for Quiet {}

    #[test]
    fn test_master_hook_needs_a_registered_workload() {
        let mut registry = WorkloadRegistry::new();
        assert!(matches!(
            registry.register_master_hook("seeded", Arc::new(Quiet)),
            Err(ExecutionError::UnknownWorkload(name)) if name == "seeded"
        ));

        registry.register_default::<Nothing>("Seeded").unwrap();
        registry.register_master_hook("Seeded", Arc::new(Quiet)).unwrap();
        assert!(registry.master_hook("SEEDED").is_some());
        assert!(registry.master_hook("noop").is_none());
    }

    #[test]
    fn test_unit_contexts_get_fresh_ids() {
        let ctx = WorkloadContext::new(
            ExecuteId::new(),
            WorkerId::new(),
            Arc::new(stampede_collections::CollectionService::new()),
            CancellationToken::new(),
        );
        let other = ctx.for_new_unit();

        assert_eq!(ctx.worker_id, other.worker_id);
        assert_eq!(ctx.execute_id, other.execute_id);
        assert_ne!(ctx.workload_id, other.workload_id);
        assert!(!other.is_cancelled());
    }
}
