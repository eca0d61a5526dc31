//! Engine facade
//!
//! The [`Engine`] owns the catalog, the kernel state and the worker pool.
//! It admits and plans tasks, feeds their executions to the workers and
//! aggregates completion events into task results.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = Engine::builder(Arc::new(catalog))
//!     .with_config(EngineConfig::new().with_workers(2))
//!     .build()?;
//! let task = engine.create_task(TaskRequest::new(
//!     TaskSubject::tool("nmap"),
//!     TargetScope::new("10.0.0.1"),
//!     IntensityRank::Normal,
//! ))?;
//! let record = engine.wait_for(task).await?;
//! ```

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::observer::TaskObserver;
use crate::parser::ParserRegistry;
use crate::runner::{ProcessRunner, ToolRunner};
use crate::types::{ExecutionPayload, Schedule, TaskRequest};
use crate::worker::{spawn_workers, Shared};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use strix_kernel::{
    CompletionEvent, ExecutionRecord, FindingQuery, FindingRecord, FindingStore, Job, Ledger,
    LifecycleError, TaskRecord, WorkQueue,
};
use strix_model::{Catalog, ExecutionId, TaskId, TypeRegistry};
use strix_planner::{Plan, PlanBuilder};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// Fans finished tasks out to waiters and observers
struct Notifier {
    shared: Arc<Shared>,
    observers: Vec<Arc<dyn TaskObserver>>,
    finalized: Notify,
}

impl Notifier {
    fn finished(&self, task: TaskId) {
        self.finalized.notify_waiters();
        if self.observers.is_empty() {
            return;
        }
        let Some(record) = self.shared.ledger.task(task) else {
            return;
        };
        let findings = Arc::new(self.shared.store.query(&FindingQuery {
            executions: Some(record.executions.clone()),
            include_inactive: true,
            ..FindingQuery::default()
        }));
        let record = Arc::new(record);
        for observer in &self.observers {
            let observer = Arc::clone(observer);
            let record = Arc::clone(&record);
            let findings = Arc::clone(&findings);
            tokio::spawn(async move {
                if let Err(e) = observer.on_task_finished(&record, &findings).await {
                    tracing::warn!(observer = observer.name(), task = %record.id, error = %e, "observer failed");
                }
            });
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Inner {
    catalog: Arc<Catalog>,
    shared: Arc<Shared>,
    notifier: Arc<Notifier>,
    definitions: DashMap<TaskId, TaskRequest>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    aggregator: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<Notify>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Task engine handle; clones share the same engine
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    catalog: Arc<Catalog>,
    registry: Option<Arc<TypeRegistry>>,
    config: EngineConfig,
    runner: Option<Arc<dyn ToolRunner>>,
    parsers: ParserRegistry,
    observers: Vec<Arc<dyn TaskObserver>>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Use a custom input type registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Engine settings
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Tool runner; defaults to [`ProcessRunner`]
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Output parsers; defaults to [`ParserRegistry::with_defaults`]
    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Add a task observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TaskObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Start the workers and the aggregator. Must be called inside a
    /// Tokio runtime.
    pub fn build(self) -> Result<Engine, EngineError> {
        if self.config.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".into()));
        }
        let (events, receiver) = mpsc::unbounded_channel();
        let workers = self.config.workers;
        let shared = Arc::new(Shared {
            registry: self.registry.unwrap_or_else(|| Arc::new(TypeRegistry::standard())),
            config: self.config,
            ledger: Ledger::new(),
            queue: WorkQueue::new(),
            store: FindingStore::new(),
            runner: self.runner.unwrap_or_else(|| Arc::new(ProcessRunner::new())),
            parsers: self.parsers,
            events,
        });
        let notifier = Arc::new(Notifier {
            shared: Arc::clone(&shared),
            observers: self.observers,
            finalized: Notify::new(),
        });
        let stop = Arc::new(Notify::new());

        let aggregator = tokio::spawn(aggregate(
            receiver,
            Arc::clone(&notifier),
            Arc::clone(&stop),
        ));
        let handles = spawn_workers(&shared, workers);
        tracing::info!(workers, "engine started");

        Ok(Engine {
            inner: Arc::new(Inner {
                catalog: self.catalog,
                shared,
                notifier,
                definitions: DashMap::new(),
                workers: Mutex::new(handles),
                aggregator: Mutex::new(Some(aggregator)),
                stop,
                background: Mutex::new(Vec::new()),
            }),
        })
    }
}

/// Consume completion events and finalize drained tasks
async fn aggregate(
    mut events: mpsc::UnboundedReceiver<CompletionEvent>,
    notifier: Arc<Notifier>,
    stop: Arc<Notify>,
) {
    let handle = |event: CompletionEvent| match notifier.shared.ledger.finalize_if_drained(event.task) {
        Ok(Some(_)) => notifier.finished(event.task),
        Ok(None) => {}
        Err(e) => tracing::warn!(task = %event.task, error = %e, "completion event for unknown task"),
    };

    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => handle(event),
                None => break,
            },
            () = stop.notified() => {
                while let Ok(event) = events.try_recv() {
                    handle(event);
                }
                break;
            }
        }
    }
    tracing::debug!("aggregator stopped");
}

impl Engine {
    /// Start building an engine over a catalog
    #[must_use]
    pub fn builder(catalog: Arc<Catalog>) -> EngineBuilder {
        EngineBuilder {
            catalog,
            registry: None,
            config: EngineConfig::default(),
            runner: None,
            parsers: ParserRegistry::with_defaults(),
            observers: Vec::new(),
        }
    }

    /// Catalog the engine plans against
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    /// Engine settings
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.shared.config
    }

    fn planner(&self) -> PlanBuilder<'_> {
        PlanBuilder::new(&self.inner.catalog, &self.inner.shared.registry)
    }

    /// Plan a request without running it
    pub fn plan(&self, request: &TaskRequest) -> Result<Plan, EngineError> {
        Ok(self
            .planner()
            .build(&request.subject, &request.scope, request.intensity)?)
    }

    /// Admit a task and queue its executions, now or at its scheduled time
    pub fn create_task(&self, request: TaskRequest) -> Result<TaskId, EngineError> {
        self.planner().admit(&request.subject, request.intensity)?;

        let id = TaskId::new();
        let record = TaskRecord::new(id, request.subject.to_string(), request.scope.target.address.clone());
        self.inner.shared.ledger.insert_task(record);
        self.inner.definitions.insert(id, request.clone());
        tracing::info!(task = %id, subject = %request.subject, target = %request.scope.target.address, intensity = ?request.intensity, "task admitted");

        match request.schedule.wait().filter(|d| !d.is_zero()) {
            Some(delay) => {
                let weak = Arc::downgrade(&self.inner);
                let request = request.clone();
                tracing::info!(task = %id, delay_secs = delay.as_secs(), "task scheduled");
                self.spawn_background(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(engine) = Engine::upgrade(&weak) {
                        engine.start_scheduled(id, &request);
                    }
                });
            }
            None => self.submit(id, &request)?,
        }

        if let Some(interval) = request.schedule.repeat_every.filter(|d| !d.is_zero()) {
            let weak = Arc::downgrade(&self.inner);
            let first = request.schedule.wait().unwrap_or_default();
            self.spawn_background(async move {
                tokio::time::sleep(first + interval).await;
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let Some(engine) = Engine::upgrade(&weak) else {
                        break;
                    };
                    if engine.task(id).map_or(true, |t| t.cancel_requested) {
                        tracing::debug!(task = %id, "repetition stopped");
                        break;
                    }
                    if let Err(e) = engine.repeat_task(id) {
                        tracing::warn!(task = %id, error = %e, "repetition failed");
                    }
                }
            });
        }
        Ok(id)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Engine> {
        weak.upgrade().map(|inner| Engine { inner })
    }

    fn spawn_background<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut background = self.inner.background.lock();
        background.retain(|h| !h.is_finished());
        background.push(tokio::spawn(future));
    }

    fn start_scheduled(&self, id: TaskId, request: &TaskRequest) {
        if self.task(id).is_some_and(|t| t.end.is_some()) {
            tracing::debug!(task = %id, "scheduled task cancelled before start");
            return;
        }
        if let Err(e) = self.submit(id, request) {
            tracing::error!(task = %id, error = %e, "scheduled task failed to start");
            if matches!(self.inner.shared.ledger.fail_task(id), Ok(true)) {
                self.inner.notifier.finished(id);
            }
        }
    }

    /// Plan a task and hand its executions to the workers
    fn submit(&self, id: TaskId, request: &TaskRequest) -> Result<(), EngineError> {
        let plan = self.plan(request)?;
        let shared = &self.inner.shared;
        for dropped in &plan.dropped {
            tracing::info!(task = %id, configuration = %dropped.configuration, "step dropped, no admissible intensity");
        }

        if plan.executions.is_empty() {
            tracing::info!(task = %id, "nothing to execute");
            if shared.ledger.finalize_if_drained(id)?.is_some() {
                self.inner.notifier.finished(id);
            }
            return Ok(());
        }

        for execution in &plan.executions {
            shared.ledger.insert_execution(ExecutionRecord::new(
                execution.id,
                id,
                execution.step,
                execution.configuration.key(),
                execution.group,
            ))?;
        }
        let planned = plan.executions.len();
        let jobs = plan
            .executions
            .into_iter()
            .map(|execution| Job {
                id: execution.id,
                task: id,
                dependencies: execution.dependencies,
                payload: ExecutionPayload {
                    tool: execution.tool,
                    configuration: execution.configuration,
                    intensity: execution.intensity,
                    bundle: execution.bundle,
                    scope: Arc::clone(&request.scope),
                },
            })
            .collect();
        if let Err(e) = shared.queue.push_all(jobs) {
            if shared.ledger.cancel_task(id)?.finalized {
                self.inner.notifier.finished(id);
            }
            return Err(e.into());
        }
        tracing::info!(task = %id, executions = planned, "task queued");
        Ok(())
    }

    /// Cancel a task: queued jobs are dropped, non-terminal executions are
    /// cancelled and the task finalizes as cancelled. Returns the cancelled
    /// executions.
    pub fn cancel_task(&self, id: TaskId) -> Result<Vec<ExecutionId>, EngineError> {
        let shared = &self.inner.shared;
        let cancellation = shared.ledger.cancel_task(id).map_err(|e| match e {
            LifecycleError::UnknownTask(task) => EngineError::UnknownTask(task),
            other => other.into(),
        })?;
        let dequeued = shared.queue.cancel_task(id);
        tracing::debug!(task = %id, dequeued = dequeued.len(), "queued jobs dropped");
        if cancellation.finalized {
            self.inner.notifier.finished(id);
        }
        Ok(cancellation.executions)
    }

    /// Run a task's definition again as a new, unscheduled task
    pub fn repeat_task(&self, id: TaskId) -> Result<TaskId, EngineError> {
        let mut request = self
            .inner
            .definitions
            .get(&id)
            .map(|r| r.clone())
            .ok_or(EngineError::UnknownTask(id))?;
        request.schedule = Schedule::default();
        let repeated = self.create_task(request)?;
        tracing::info!(task = %id, repetition = %repeated, "task repeated");
        Ok(repeated)
    }

    /// Snapshot of a task
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<TaskRecord> {
        self.inner.shared.ledger.task(id)
    }

    /// Every task, oldest first
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.inner.shared.ledger.tasks()
    }

    /// Executions of a task in creation order
    pub fn executions(&self, task: TaskId) -> Result<Vec<ExecutionRecord>, EngineError> {
        self.inner
            .shared
            .ledger
            .executions_of(task)
            .map_err(|_| EngineError::UnknownTask(task))
    }

    /// Findings matching a query
    #[must_use]
    pub fn findings(&self, query: &FindingQuery) -> Vec<FindingRecord> {
        self.inner.shared.store.query(query)
    }

    /// Findings observed by the executions of one task
    pub fn task_findings(&self, task: TaskId) -> Result<Vec<FindingRecord>, EngineError> {
        let record = self.task(task).ok_or(EngineError::UnknownTask(task))?;
        Ok(self.findings(&FindingQuery {
            executions: Some(record.executions),
            ..FindingQuery::default()
        }))
    }

    /// Shared finding store, for collaborators that retire findings
    #[must_use]
    pub fn store(&self) -> &FindingStore {
        &self.inner.shared.store
    }

    /// Wait until a task is finalized
    pub async fn wait_for(&self, task: TaskId) -> Result<TaskRecord, EngineError> {
        loop {
            let notified = self.inner.notifier.finalized.notified();
            let record = self.task(task).ok_or(EngineError::UnknownTask(task))?;
            if record.end.is_some() {
                return Ok(record);
            }
            notified.await;
        }
    }

    /// Stop accepting work, let running jobs finish and stop every
    /// background task
    pub async fn shutdown(&self) {
        self.inner.shared.queue.close();
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for handle in futures::future::join_all(workers).await {
            if let Err(e) = handle {
                tracing::error!(error = %e, "worker panicked");
            }
        }

        self.inner.stop.notify_one();
        let aggregator = self.inner.aggregator.lock().take();
        if let Some(aggregator) = aggregator {
            if let Err(e) = aggregator.await {
                tracing::error!(error = %e, "aggregator panicked");
            }
        }

        for handle in self.inner.background.lock().drain(..) {
            handle.abort();
        }
        tracing::info!("engine stopped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.queue.close();
        self.stop.notify_one();
        for handle in self.background.get_mut().drain(..) {
            handle.abort();
        }
    }
}
