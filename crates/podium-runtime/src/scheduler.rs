//! TaskScheduler - task lifecycle, dependency forest, cascade cancellation.
//!
//! The scheduler exclusively owns task lifecycle: executors report outcomes
//! through its transition methods and never mutate task state directly.
//! Dispatch is always deferred to a fresh scheduling turn, so a creation
//! call never observes its own execution side effects. Cancellation is a
//! flag checked at scheduling decision points, never a forced abort of
//! in-flight work.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;

use podium_bus::EventHub;
use podium_core::{
    ChainInfo, ExecContext, ExecOutcome, ExecutorRegistry, ExecutorSelector, Task, TaskId,
    TaskLogEntry, TaskStatus,
};

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Retention options
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Maximum retained task records; the oldest are evicted past this
    pub max_tasks: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self { max_tasks: 500 }
    }
}

/// Request to create one task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub executor_id: Option<String>,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub depends_on_task_id: Option<TaskId>,
    #[serde(skip)]
    pub chain: Option<ChainInfo>,
}

/// One element of a chain request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTaskSpec {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub executor_id: Option<String>,
    #[serde(default)]
    pub args: Value,
}

/// Result of a chain creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainView {
    pub chain_id: String,
    pub task_ids: Vec<TaskId>,
}

struct SchedState {
    tasks: HashMap<TaskId, Task>,
    /// Insertion order, drives retention eviction
    order: VecDeque<TaskId>,
    /// task -> the one task it depends on; cleared when the edge resolves
    depends_on: HashMap<TaskId, TaskId>,
    /// dependency task -> tasks waiting on it; mirror of `depends_on`
    dependents: HashMap<TaskId, Vec<TaskId>>,
    /// Cancellation flags consumed at the next scheduling decision point
    cancel_requested: HashSet<TaskId>,
}

struct SchedulerInner {
    state: RwLock<SchedState>,
    hub: Arc<EventHub>,
    executors: Arc<ExecutorRegistry>,
    selector: Arc<dyn ExecutorSelector>,
    options: SchedulerOptions,
}

/// TaskScheduler - a cloneable handle onto the shared scheduling state
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
}

impl TaskScheduler {
    /// Create a scheduler with default retention
    pub fn new(
        hub: Arc<EventHub>,
        executors: Arc<ExecutorRegistry>,
        selector: Arc<dyn ExecutorSelector>,
    ) -> Self {
        Self::with_options(hub, executors, selector, SchedulerOptions::default())
    }

    /// Create a scheduler with explicit retention options
    pub fn with_options(
        hub: Arc<EventHub>,
        executors: Arc<ExecutorRegistry>,
        selector: Arc<dyn ExecutorSelector>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: RwLock::new(SchedState {
                    tasks: HashMap::new(),
                    order: VecDeque::new(),
                    depends_on: HashMap::new(),
                    dependents: HashMap::new(),
                    cancel_requested: HashSet::new(),
                }),
                hub,
                executors,
                selector,
                options,
            }),
        }
    }

    /// Create a task, applying the dependency rules, and schedule its
    /// dispatch on the next turn when it is eligible.
    pub async fn create_task(&self, req: CreateTaskRequest) -> Task {
        let mut task = Task::new(req.prompt);
        task.executor_id = req.executor_id;
        task.args = req.args;
        task.chain = req.chain;
        task.push_log("status", "task created");

        let mut dispatchable = true;
        {
            let mut state = self.inner.state.write().await;
            if let Some(dep_id) = req.depends_on_task_id {
                task.depends_on_task_id = Some(dep_id.clone());
                match state.tasks.get(&dep_id) {
                    None => {
                        task.transition(TaskStatus::Failed);
                        task.error = Some(format!(
                            "dependency_not_found: task '{}' does not exist",
                            dep_id
                        ));
                        task.push_log("status", "failed: dependency not found");
                        dispatchable = false;
                    }
                    Some(dep) if dep.status.is_terminal() && !dep.status.is_success() => {
                        let origin_status = dep.status;
                        task.transition(TaskStatus::Cancelled);
                        task.error = Some(format!(
                            "dependency_cascade_cancelled: task '{}' ended {}",
                            dep_id,
                            origin_status.as_str()
                        ));
                        task.push_log("status", "cancelled: dependency already unsuccessful");
                        dispatchable = false;
                    }
                    Some(dep) if dep.status.is_terminal() => {
                        // Dependency already completed; independently eligible.
                    }
                    Some(_) => {
                        state.depends_on.insert(task.id.clone(), dep_id.clone());
                        state
                            .dependents
                            .entry(dep_id)
                            .or_default()
                            .push(task.id.clone());
                        task.push_log("status", "waiting on dependency");
                        dispatchable = false;
                    }
                }
            }

            state.order.push_back(task.id.clone());
            state.tasks.insert(task.id.clone(), task.clone());
            evict_over_cap(&mut state, self.inner.options.max_tasks);
        }

        self.inner
            .hub
            .emit("task_created", created_payload(&task))
            .await;
        if task.status.is_terminal() {
            self.inner
                .hub
                .emit(status_event_type(task.status), transition_payload(&task))
                .await;
        } else if dispatchable {
            self.dispatch_later(task.id.clone());
        }
        task
    }

    /// Create a linear chain: task k depends on task k-1, all sharing one
    /// chain identifier. Only the first task is dispatch-eligible up front.
    pub async fn create_chain(
        &self,
        specs: Vec<ChainTaskSpec>,
    ) -> Result<ChainView, SchedulerError> {
        if specs.is_empty() {
            return Err(SchedulerError::InvalidArgument(
                "chain requires at least one task".to_string(),
            ));
        }
        let chain_id = uuid::Uuid::new_v4().to_string();
        let length = specs.len();
        let mut task_ids = Vec::with_capacity(length);
        let mut previous: Option<TaskId> = None;
        for (index, spec) in specs.into_iter().enumerate() {
            let task = self
                .create_task(CreateTaskRequest {
                    prompt: spec.prompt,
                    executor_id: spec.executor_id,
                    args: spec.args,
                    depends_on_task_id: previous.clone(),
                    chain: Some(ChainInfo {
                        chain_id: chain_id.clone(),
                        index,
                        length,
                    }),
                })
                .await;
            previous = Some(task.id.clone());
            task_ids.push(task.id);
        }
        Ok(ChainView { chain_id, task_ids })
    }

    /// Get one task
    pub async fn get_task(&self, task_id: &str) -> Result<Task, SchedulerError> {
        self.inner
            .state
            .read()
            .await
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))
    }

    /// List retained tasks in creation order
    pub async fn list_tasks(&self) -> Vec<Task> {
        let state = self.inner.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .cloned()
            .collect()
    }

    /// Return the most recent log entries for a task, optionally filtered
    /// by entry kind
    pub async fn task_logs(
        &self,
        task_id: &str,
        limit: usize,
        kind: Option<&str>,
    ) -> Result<Vec<TaskLogEntry>, SchedulerError> {
        let state = self.inner.state.read().await;
        let task = state
            .tasks
            .get(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
        let matching: Vec<&TaskLogEntry> = task
            .log
            .iter()
            .filter(|entry| kind.is_none_or(|k| entry.kind == k))
            .collect();
        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].iter().map(|e| (*e).clone()).collect())
    }

    /// Request cancellation.
    ///
    /// Idempotent. Queued tasks are flagged and short-circuit to
    /// `cancelled` at their next dispatch; running tasks are flagged and
    /// steered to `cancelled` when their in-flight executor call returns
    /// (cooperative, never preemptive); tasks parked on an approval are
    /// cancelled immediately.
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, SchedulerError> {
        let waiting = {
            let mut state = self.inner.state.write().await;
            let task = state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
            match task.status {
                TaskStatus::Queued | TaskStatus::Running => {
                    task.push_log("status", "cancellation requested");
                    let id = task.id.clone();
                    state.cancel_requested.insert(id);
                    false
                }
                TaskStatus::WaitingApproval => true,
                // Terminal tasks: nothing to do.
                _ => false,
            }
        };
        if waiting {
            self.finish(
                task_id,
                TaskStatus::Cancelled,
                Some("cancelled while waiting for approval".to_string()),
                None,
            )
            .await;
        }
        self.get_task(task_id).await
    }

    /// Create a fresh task carrying the same prompt, executor and arguments
    /// as an existing one. The original is not mutated.
    pub async fn retry_task(&self, task_id: &str) -> Result<Task, SchedulerError> {
        let (prompt, executor_id, args) = {
            let state = self.inner.state.read().await;
            let task = state
                .tasks
                .get(task_id)
                .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
            (task.prompt.clone(), task.executor_id.clone(), task.args.clone())
        };
        Ok(self
            .create_task(CreateTaskRequest {
                prompt,
                executor_id,
                args,
                depends_on_task_id: None,
                chain: None,
            })
            .await)
    }

    /// Schedule a dispatch on the next scheduling turn, never inline in the
    /// caller's stack
    pub fn dispatch_later(&self, task_id: TaskId) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.dispatch(&task_id).await;
        });
    }

    /// Dispatch a queued task.
    ///
    /// Re-validates under the lock: the task may have been evicted,
    /// cancelled or released since this turn was scheduled. A no-op when an
    /// unresolved dependency edge remains.
    pub async fn dispatch(&self, task_id: &str) {
        enum Decision {
            Cancelled,
            Run {
                prompt: String,
                executor_id: Option<String>,
                args: Value,
            },
        }

        let decision = {
            let mut state = self.inner.state.write().await;
            if state.depends_on.contains_key(task_id) {
                return;
            }
            match state.tasks.get(task_id) {
                Some(task) if task.status == TaskStatus::Queued => {}
                _ => return,
            }
            let cancel = state.cancel_requested.remove(task_id);
            let Some(task) = state.tasks.get_mut(task_id) else {
                return;
            };
            if cancel {
                task.transition(TaskStatus::Cancelled);
                task.error = Some("cancelled before dispatch".to_string());
                task.push_log("status", "cancelled before dispatch");
                Decision::Cancelled
            } else {
                task.transition(TaskStatus::Running);
                task.push_log("status", "dispatched");
                Decision::Run {
                    prompt: task.prompt.clone(),
                    executor_id: task.executor_id.clone(),
                    args: task.args.clone(),
                }
            }
        };

        match decision {
            Decision::Cancelled => {
                self.announce_transition(task_id).await;
                self.cascade(task_id.to_string(), TaskStatus::Cancelled).await;
            }
            Decision::Run {
                prompt,
                executor_id,
                args,
            } => {
                self.announce_transition(task_id).await;
                self.execute(task_id, &prompt, executor_id, args).await;
            }
        }
    }

    /// Resolve the task to a concrete executor and run it
    async fn execute(
        &self,
        task_id: &str,
        prompt: &str,
        executor_id: Option<String>,
        args: Value,
    ) {
        let (executor, args) = match executor_id {
            Some(id) => match self.inner.executors.get(&id) {
                Some(executor) => (executor, args),
                None => {
                    self.finish(
                        task_id,
                        TaskStatus::Failed,
                        Some(format!("invalid_command: executor '{}' is not registered", id)),
                        None,
                    )
                    .await;
                    return;
                }
            },
            None => match self.inner.selector.select(prompt) {
                Some(selection) => match self.inner.executors.get(&selection.executor_id) {
                    Some(executor) => (executor, merge_args(selection.args, args)),
                    None => {
                        self.finish(
                            task_id,
                            TaskStatus::Failed,
                            Some(format!(
                                "invalid_command: inferred executor '{}' is not registered",
                                selection.executor_id
                            )),
                            None,
                        )
                        .await;
                        return;
                    }
                },
                None => {
                    self.finish(
                        task_id,
                        TaskStatus::Failed,
                        Some("invalid_command: no executor could be inferred".to_string()),
                        None,
                    )
                    .await;
                    return;
                }
            },
        };

        tracing::info!(task_id = %task_id, executor_id = executor.id(), "task execution started");
        let ctx = ExecContext::for_task(task_id);
        let outcome = executor.execute(&args, &ctx).await;
        // Arbitrary other operations may have run while the executor call
        // was in flight; apply_outcome re-validates before mutating.
        self.apply_outcome(task_id, outcome).await;
    }

    /// Map an executor outcome onto the task.
    ///
    /// This is the single entry point for outcome reporting, used both
    /// directly after execution and when a resolved approval re-invokes the
    /// gated action.
    pub async fn apply_outcome(&self, task_id: &str, outcome: ExecOutcome) {
        let cancelled = {
            let mut state = self.inner.state.write().await;
            let active =
                matches!(state.tasks.get(task_id), Some(task) if !task.status.is_terminal());
            if !active {
                // Evicted or already terminal while the executor ran.
                return;
            }
            state.cancel_requested.remove(task_id)
        };
        if cancelled {
            self.finish(
                task_id,
                TaskStatus::Cancelled,
                Some("cancelled during execution".to_string()),
                None,
            )
            .await;
            return;
        }

        match outcome {
            ExecOutcome::Success { payload } => {
                self.finish(task_id, TaskStatus::Completed, None, Some(payload))
                    .await;
            }
            ExecOutcome::ApprovalRequired {
                approval_id,
                message,
            } => {
                let parked = {
                    let mut state = self.inner.state.write().await;
                    match state.tasks.get_mut(task_id) {
                        Some(task) if !task.status.is_terminal() => {
                            task.approval_id = Some(approval_id.clone());
                            task.transition(TaskStatus::WaitingApproval);
                            task.push_log("gate", message);
                            true
                        }
                        _ => false,
                    }
                };
                if parked {
                    self.announce_transition(task_id).await;
                }
            }
            ExecOutcome::Failed { code, message } => {
                self.finish(
                    task_id,
                    TaskStatus::Failed,
                    Some(format!("{}: {}", code, message)),
                    None,
                )
                .await;
            }
        }
    }

    /// Transition a task to a terminal status, announce it, and release its
    /// dependents.
    pub async fn finish(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
        payload: Option<Value>,
    ) {
        let changed = {
            let mut state = self.inner.state.write().await;
            let Some(task) = state.tasks.get_mut(task_id) else {
                return;
            };
            if !task.transition(status) {
                return;
            }
            task.error = error;
            if let Some(payload) = &payload {
                task.push_log("executor", payload.to_string());
            }
            let message = match &task.error {
                Some(error) => format!("{}: {}", status.as_str(), error),
                None => status.as_str().to_string(),
            };
            task.push_log("status", message);
            state.cancel_requested.remove(task_id);
            true
        };
        if changed {
            self.announce_transition(task_id).await;
            self.cascade(task_id.to_string(), status).await;
        }
    }

    /// Release dependents after a terminal transition: a completed origin
    /// frees them for dispatch, anything else cancels them, recursively.
    async fn cascade(&self, origin_id: TaskId, origin_status: TaskStatus) {
        let (cancelled, released) = {
            let mut state = self.inner.state.write().await;
            let mut cancelled = Vec::new();
            let mut released = Vec::new();
            let mut queue: VecDeque<(TaskId, TaskStatus)> = VecDeque::new();
            queue.push_back((origin_id, origin_status));
            while let Some((origin, status)) = queue.pop_front() {
                let Some(children) = state.dependents.remove(&origin) else {
                    continue;
                };
                for child_id in children {
                    state.depends_on.remove(&child_id);
                    if status.is_success() {
                        if let Some(child) = state.tasks.get(&child_id) {
                            if child.status == TaskStatus::Queued {
                                released.push(child_id);
                            }
                        }
                    } else {
                        if let Some(child) = state.tasks.get_mut(&child_id) {
                            if child.transition(TaskStatus::Cancelled) {
                                child.error = Some(format!(
                                    "dependency_cascade_cancelled: task '{}' ended {}",
                                    origin,
                                    status.as_str()
                                ));
                                child.push_log("status", "cancelled by dependency cascade");
                                cancelled.push(child_id.clone());
                            }
                        }
                        state.cancel_requested.remove(&child_id);
                        queue.push_back((child_id, TaskStatus::Cancelled));
                    }
                }
            }
            (cancelled, released)
        };
        for task_id in cancelled {
            self.announce_transition(&task_id).await;
        }
        for task_id in released {
            self.dispatch_later(task_id);
        }
    }

    async fn announce_transition(&self, task_id: &str) {
        let task = {
            let state = self.inner.state.read().await;
            state.tasks.get(task_id).cloned()
        };
        if let Some(task) = task {
            tracing::info!(task_id = %task.id, status = task.status.as_str(), "task transition");
            self.inner
                .hub
                .emit(status_event_type(task.status), transition_payload(&task))
                .await;
        }
    }
}

/// Evict the oldest task records past the cap, purging their edges in both
/// directions together
fn evict_over_cap(state: &mut SchedState, max_tasks: usize) {
    while state.order.len() > max_tasks {
        let Some(evicted) = state.order.pop_front() else {
            break;
        };
        state.tasks.remove(&evicted);
        state.cancel_requested.remove(&evicted);
        if let Some(dep) = state.depends_on.remove(&evicted) {
            if let Some(children) = state.dependents.get_mut(&dep) {
                children.retain(|id| *id != evicted);
                if children.is_empty() {
                    state.dependents.remove(&dep);
                }
            }
        }
        if let Some(children) = state.dependents.remove(&evicted) {
            for child in children {
                state.depends_on.remove(&child);
            }
        }
    }
}

/// Overlay explicit task arguments onto inferred selection arguments
fn merge_args(inferred: Value, explicit: Value) -> Value {
    match (inferred, explicit) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (inferred, Value::Null) => inferred,
        (_, explicit) => explicit,
    }
}

fn status_event_type(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Queued => "task_queued",
        TaskStatus::Running => "task_started",
        TaskStatus::WaitingApproval => "task_waiting_approval",
        TaskStatus::Completed => "task_completed",
        TaskStatus::Failed => "task_failed",
        TaskStatus::Cancelled => "task_cancelled",
    }
}

fn created_payload(task: &Task) -> Value {
    let mut payload = json!({
        "taskId": task.id,
        "status": task.status.as_str(),
        "prompt": task.prompt,
    });
    if let Some(chain) = &task.chain {
        payload["chainId"] = json!(chain.chain_id);
        payload["chainIndex"] = json!(chain.index);
    }
    payload
}

fn transition_payload(task: &Task) -> Value {
    let mut payload = json!({
        "taskId": task.id,
        "status": task.status.as_str(),
    });
    if let Some(error) = &task.error {
        payload["error"] = json!(error);
    }
    if let Some(approval_id) = &task.approval_id {
        payload["approvalId"] = json!(approval_id);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use podium_core::{ExecFailure, Executor};
    use tokio::sync::Mutex;

    struct ScriptedExecutor {
        id: String,
        outcome: ExecOutcome,
        delay_ms: u64,
        calls: Arc<AtomicUsize>,
        call_order: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedExecutor {
        fn new(id: &str, outcome: ExecOutcome) -> Self {
            Self {
                id: id.to_string(),
                outcome,
                delay_ms: 0,
                calls: Arc::new(AtomicUsize::new(0)),
                call_order: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_delay(mut self, delay_ms: u64) -> Self {
            self.delay_ms = delay_ms;
            self
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        fn id(&self) -> &str {
            &self.id
        }

        fn description(&self) -> &str {
            "scripted test executor"
        }

        async fn execute(&self, args: &Value, _ctx: &ExecContext) -> ExecOutcome {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(label) = args.get("label").and_then(|v| v.as_str()) {
                self.call_order.lock().await.push(label.to_string());
            }
            self.outcome.clone()
        }
    }

    struct NoSelector;

    impl ExecutorSelector for NoSelector {
        fn select(&self, _prompt: &str) -> Option<podium_core::Selection> {
            None
        }
    }

    fn scheduler_with(executors: Vec<Arc<dyn Executor>>) -> (TaskScheduler, Arc<EventHub>) {
        let hub = Arc::new(EventHub::new());
        let mut registry = ExecutorRegistry::new();
        for executor in executors {
            registry.register(executor);
        }
        let scheduler = TaskScheduler::new(hub.clone(), Arc::new(registry), Arc::new(NoSelector));
        (scheduler, hub)
    }

    fn ok_executor(id: &str) -> Arc<ScriptedExecutor> {
        Arc::new(ScriptedExecutor::new(
            id,
            ExecOutcome::success(json!({"ok": true})),
        ))
    }

    fn request(prompt: &str, executor_id: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            prompt: prompt.to_string(),
            executor_id: Some(executor_id.to_string()),
            args: Value::Null,
            depends_on_task_id: None,
            chain: None,
        }
    }

    async fn wait_for_status(scheduler: &TaskScheduler, task_id: &str, status: TaskStatus) -> Task {
        for _ in 0..400 {
            if let Ok(task) = scheduler.get_task(task_id).await {
                if task.status == status {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("task '{}' did not reach {:?}", task_id, status);
    }

    #[tokio::test]
    async fn test_task_completes_via_explicit_executor() {
        let executor = ok_executor("ok");
        let (scheduler, _) = scheduler_with(vec![executor.clone()]);

        let task = scheduler.create_task(request("do it", "ok")).await;
        assert_eq!(task.status, TaskStatus::Queued);

        let done = wait_for_status(&scheduler, &task.id, TaskStatus::Completed).await;
        assert!(done.error.is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert!(done.log.iter().any(|e| e.kind == "executor"));
    }

    #[tokio::test]
    async fn test_unknown_executor_fails_task() {
        let (scheduler, _) = scheduler_with(vec![]);
        let task = scheduler.create_task(request("do it", "missing")).await;
        let failed = wait_for_status(&scheduler, &task.id, TaskStatus::Failed).await;
        assert!(failed.error.unwrap().contains("invalid_command"));
    }

    #[tokio::test]
    async fn test_missing_dependency_fails_immediately() {
        let (scheduler, _) = scheduler_with(vec![ok_executor("ok")]);
        let task = scheduler
            .create_task(CreateTaskRequest {
                depends_on_task_id: Some("ghost".to_string()),
                ..request("do it", "ok")
            })
            .await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("dependency_not_found"));
    }

    #[tokio::test]
    async fn test_dependency_on_completed_task_is_immediately_eligible() {
        let (scheduler, _) = scheduler_with(vec![ok_executor("ok")]);
        let first = scheduler.create_task(request("first", "ok")).await;
        wait_for_status(&scheduler, &first.id, TaskStatus::Completed).await;

        let second = scheduler
            .create_task(CreateTaskRequest {
                depends_on_task_id: Some(first.id.clone()),
                ..request("second", "ok")
            })
            .await;
        assert_eq!(second.status, TaskStatus::Queued);
        wait_for_status(&scheduler, &second.id, TaskStatus::Completed).await;
    }

    #[tokio::test]
    async fn test_dependency_on_failed_task_is_created_cancelled() {
        let failing = Arc::new(ScriptedExecutor::new(
            "bad",
            ExecOutcome::failed(ExecFailure::ExecutionFailed, "boom"),
        ));
        let (scheduler, _) = scheduler_with(vec![failing]);
        let first = scheduler.create_task(request("first", "bad")).await;
        wait_for_status(&scheduler, &first.id, TaskStatus::Failed).await;

        let second = scheduler
            .create_task(CreateTaskRequest {
                depends_on_task_id: Some(first.id.clone()),
                ..request("second", "bad")
            })
            .await;
        assert_eq!(second.status, TaskStatus::Cancelled);
        let error = second.error.unwrap();
        assert!(error.contains(&first.id));
        assert!(error.contains("failed"));
    }

    #[tokio::test]
    async fn test_failure_cascades_to_transitive_dependents() {
        let failing = Arc::new(
            ScriptedExecutor::new(
                "bad",
                ExecOutcome::failed(ExecFailure::ExecutionFailed, "boom"),
            )
            .with_delay(20),
        );
        let ok = ok_executor("ok");
        let (scheduler, _) = scheduler_with(vec![failing, ok.clone()]);

        let a = scheduler.create_task(request("a", "bad")).await;
        let b = scheduler
            .create_task(CreateTaskRequest {
                depends_on_task_id: Some(a.id.clone()),
                ..request("b", "ok")
            })
            .await;
        let c = scheduler
            .create_task(CreateTaskRequest {
                depends_on_task_id: Some(b.id.clone()),
                ..request("c", "ok")
            })
            .await;

        wait_for_status(&scheduler, &a.id, TaskStatus::Failed).await;
        let b = wait_for_status(&scheduler, &b.id, TaskStatus::Cancelled).await;
        let c = wait_for_status(&scheduler, &c.id, TaskStatus::Cancelled).await;

        let b_error = b.error.unwrap();
        assert!(b_error.contains("dependency_cascade_cancelled"));
        assert!(b_error.contains(&a.id));
        assert!(b_error.contains("failed"));
        let c_error = c.error.unwrap();
        assert!(c_error.contains(&b.id));
        // Neither dependent ever reached an executor.
        assert_eq!(ok.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_runs_strictly_in_order() {
        let executor = ok_executor("ok");
        let (scheduler, _) = scheduler_with(vec![executor.clone()]);

        let chain = scheduler
            .create_chain(
                (0..3)
                    .map(|n| ChainTaskSpec {
                        prompt: format!("step {}", n),
                        executor_id: Some("ok".to_string()),
                        args: json!({"label": format!("step-{}", n)}),
                    })
                    .collect(),
            )
            .await
            .expect("chain");
        assert_eq!(chain.task_ids.len(), 3);

        for task_id in &chain.task_ids {
            let task = wait_for_status(&scheduler, task_id, TaskStatus::Completed).await;
            let info = task.chain.expect("chain info");
            assert_eq!(info.chain_id, chain.chain_id);
            assert_eq!(info.length, 3);
        }
        let order = executor.call_order.lock().await.clone();
        assert_eq!(order, vec!["step-0", "step-1", "step-2"]);
    }

    #[tokio::test]
    async fn test_empty_chain_is_rejected() {
        let (scheduler, _) = scheduler_with(vec![]);
        assert!(matches!(
            scheduler.create_chain(Vec::new()).await,
            Err(SchedulerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_flagged_queued_task_never_runs() {
        let slow = Arc::new(
            ScriptedExecutor::new("slow", ExecOutcome::success(json!({"ok": true})))
                .with_delay(30),
        );
        let ok = ok_executor("ok");
        let (scheduler, _) = scheduler_with(vec![slow, ok.clone()]);

        let first = scheduler.create_task(request("first", "slow")).await;
        let second = scheduler
            .create_task(CreateTaskRequest {
                depends_on_task_id: Some(first.id.clone()),
                ..request("second", "ok")
            })
            .await;
        // Flag the dependent while it is still parked behind its dependency.
        scheduler.cancel_task(&second.id).await.expect("cancel");

        wait_for_status(&scheduler, &first.id, TaskStatus::Completed).await;
        let second = wait_for_status(&scheduler, &second.id, TaskStatus::Cancelled).await;
        assert_eq!(second.error.unwrap(), "cancelled before dispatch");
        assert_eq!(ok.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_running_task_is_cooperative() {
        let slow = Arc::new(
            ScriptedExecutor::new("slow", ExecOutcome::success(json!({"ok": true})))
                .with_delay(50),
        );
        let (scheduler, _) = scheduler_with(vec![slow.clone()]);

        let task = scheduler.create_task(request("long job", "slow")).await;
        wait_for_status(&scheduler, &task.id, TaskStatus::Running).await;
        scheduler.cancel_task(&task.id).await.expect("cancel");

        // The in-flight call is not aborted; the flag steers the terminal
        // status once the executor returns.
        let done = wait_for_status(&scheduler, &task.id, TaskStatus::Cancelled).await;
        assert_eq!(done.error.unwrap(), "cancelled during execution");
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (scheduler, _) = scheduler_with(vec![ok_executor("ok")]);
        let task = scheduler.create_task(request("job", "ok")).await;
        wait_for_status(&scheduler, &task.id, TaskStatus::Completed).await;

        let after_first = scheduler.cancel_task(&task.id).await.expect("cancel");
        let after_second = scheduler.cancel_task(&task.id).await.expect("cancel again");
        assert_eq!(after_first.status, TaskStatus::Completed);
        assert_eq!(after_second.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_retry_creates_a_fresh_task() {
        let failing = Arc::new(ScriptedExecutor::new(
            "bad",
            ExecOutcome::failed(ExecFailure::ExecutionFailed, "boom"),
        ));
        let (scheduler, _) = scheduler_with(vec![failing]);
        let original = scheduler
            .create_task(CreateTaskRequest {
                args: json!({"n": 1}),
                ..request("flaky", "bad")
            })
            .await;
        wait_for_status(&scheduler, &original.id, TaskStatus::Failed).await;

        let retried = scheduler.retry_task(&original.id).await.expect("retry");
        assert_ne!(retried.id, original.id);
        assert_eq!(retried.prompt, "flaky");
        assert_eq!(retried.args, json!({"n": 1}));
        // The original is untouched.
        let original = scheduler.get_task(&original.id).await.unwrap();
        assert_eq!(original.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_approval_outcome_parks_task_until_resolution() {
        let gated = Arc::new(ScriptedExecutor::new(
            "gated",
            ExecOutcome::ApprovalRequired {
                approval_id: "appr-1".to_string(),
                message: "needs sign-off".to_string(),
            },
        ));
        let (scheduler, _) = scheduler_with(vec![gated]);

        let task = scheduler.create_task(request("dangerous", "gated")).await;
        let parked = wait_for_status(&scheduler, &task.id, TaskStatus::WaitingApproval).await;
        assert_eq!(parked.approval_id.as_deref(), Some("appr-1"));

        scheduler
            .apply_outcome(&task.id, ExecOutcome::success(json!({"done": true})))
            .await;
        wait_for_status(&scheduler, &task.id, TaskStatus::Completed).await;
    }

    #[tokio::test]
    async fn test_retention_evicts_oldest_with_edges() {
        let hub = Arc::new(EventHub::new());
        let mut registry = ExecutorRegistry::new();
        registry.register(ok_executor("ok"));
        let scheduler = TaskScheduler::with_options(
            hub,
            Arc::new(registry),
            Arc::new(NoSelector),
            SchedulerOptions { max_tasks: 2 },
        );

        let first = scheduler.create_task(request("one", "ok")).await;
        scheduler.create_task(request("two", "ok")).await;
        scheduler.create_task(request("three", "ok")).await;

        assert!(matches!(
            scheduler.get_task(&first.id).await,
            Err(SchedulerError::TaskNotFound(_))
        ));
        assert_eq!(scheduler.list_tasks().await.len(), 2);
    }

    #[tokio::test]
    async fn test_transitions_are_announced_on_the_bus() {
        let executor = ok_executor("ok");
        let (scheduler, hub) = scheduler_with(vec![executor]);
        let task = scheduler.create_task(request("observed", "ok")).await;
        wait_for_status(&scheduler, &task.id, TaskStatus::Completed).await;

        let filter = podium_bus::EventFilter {
            task_id: Some(task.id.clone()),
            ..Default::default()
        };
        let events = hub.snapshot(&filter, 10).await;
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["task_created", "task_started", "task_completed"]);
    }

    #[tokio::test]
    async fn test_logs_filter_by_kind_and_limit() {
        let executor = ok_executor("ok");
        let (scheduler, _) = scheduler_with(vec![executor]);
        let task = scheduler.create_task(request("logged", "ok")).await;
        wait_for_status(&scheduler, &task.id, TaskStatus::Completed).await;

        let all = scheduler.task_logs(&task.id, 100, None).await.unwrap();
        assert!(all.len() >= 3);
        let status_only = scheduler
            .task_logs(&task.id, 100, Some("status"))
            .await
            .unwrap();
        assert!(status_only.iter().all(|e| e.kind == "status"));
        let last_one = scheduler.task_logs(&task.id, 1, None).await.unwrap();
        assert_eq!(last_one.len(), 1);
    }
}
