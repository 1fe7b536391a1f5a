//! The graph registry and submission front-end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flowline_dsl::{compile, CompileError, Dsl};
use flowline_engine::execute_task;
use flowline_graph::unique_variant;
use flowline_job::RegisteredWorkflow;
use flowline_task::{Envelope, Task, TaskData};

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::results::{Counts, ErrorRecord, Results};

/// The registry and submission front-end of the executor.
///
/// A manager owns its compiled graphs, accepts task submissions against
/// them, runs every task as its own concurrent execution, and buffers
/// results and errors until [`pop_results`](Self::pop_results) drains them.
/// Cloning a manager yields another handle to the same registry and
/// counters.
#[derive(Clone)]
pub struct FlowManager {
  inner: Arc<Shared>,
}

struct Shared {
  config: ManagerConfig,
  registry: RwLock<Registry>,
  buffer: Mutex<Results>,
  counts: Mutex<Counts>,
  done: Notify,
  limiter: Option<Arc<Semaphore>>,
  global: RwLock<Arc<TaskData>>,
  /// Parent token of every in-flight execution; replaced by `cancel_all`.
  inflight_cancel: Mutex<CancellationToken>,
}

#[derive(Default)]
struct Registry {
  /// Registered graphs keyed by their handle (the head's FQN).
  graphs: HashMap<String, Arc<RegisteredWorkflow>>,
  /// Composition identity -> FQN, for idempotent re-registration. Keeps the
  /// composition alive so its identity cannot be recycled.
  compositions: HashMap<usize, (Dsl, String)>,
}

impl FlowManager {
  pub fn new() -> Self {
    Self::with_config(ManagerConfig::default())
  }

  pub fn with_config(config: ManagerConfig) -> Self {
    let limiter = config
      .max_concurrent_tasks
      .map(|limit| Arc::new(Semaphore::new(limit)));
    Self {
      inner: Arc::new(Shared {
        config,
        registry: RwLock::new(Registry::default()),
        buffer: Mutex::new(Results::default()),
        counts: Mutex::new(Counts::default()),
        done: Notify::new(),
        limiter,
        global: RwLock::new(Arc::new(TaskData::new())),
        inflight_cancel: Mutex::new(CancellationToken::new()),
      }),
    }
  }

  /// Set the shared context exposed to jobs as `j_ctx.global`.
  ///
  /// Executions snapshot the context at submission time.
  pub fn set_global(&self, global: TaskData) {
    *self.inner.global.write().unwrap() = Arc::new(global);
  }

  /// Compile a composition and register it under `graph_name` / `variant`.
  ///
  /// Returns the graph handle: the head job's fully qualified name. The
  /// variant is suffixed (`_1`, `_2`, ...) when the graph/variant pair
  /// collides with an existing registration. Re-registering the exact same
  /// composition value returns the previously assigned handle.
  pub fn add_graph(
    &self,
    dsl: &Dsl,
    graph_name: &str,
    variant: &str,
  ) -> Result<String, ManagerError> {
    if graph_name.is_empty() {
      return Err(ManagerError::EmptyGraphName);
    }

    let mut registry = self.inner.registry.write().unwrap();
    if let Some((_, fqn)) = registry.compositions.get(&dsl.identity()) {
      return Ok(fqn.clone());
    }

    let workflow = compile(dsl).map_err(|err| match err {
      CompileError::Invalid(graph_err) => ManagerError::Validation(graph_err),
      other => ManagerError::Compile(other),
    })?;

    let existing: Vec<String> = registry.graphs.keys().cloned().collect();
    let variant = unique_variant(&existing, graph_name, variant);

    let registered = RegisteredWorkflow::register(workflow, graph_name, &variant)
      .map_err(ManagerError::Validation)?;
    let fqn = registered.fqn().to_string();

    info!(fqn = %fqn, jobs = registered.workflow().nodes.len(), "graph registered");
    registry.graphs.insert(fqn.clone(), Arc::new(registered));
    registry
      .compositions
      .insert(dsl.identity(), (dsl.clone(), fqn.clone()));
    Ok(fqn)
  }

  /// Submit a task when exactly one graph is registered.
  pub async fn submit(&self, task: Task) -> Result<String, ManagerError> {
    let registered = {
      let registry = self.inner.registry.read().unwrap();
      match registry.graphs.len() {
        0 => return Err(ManagerError::NoGraphs),
        1 => registry.graphs.values().next().unwrap().clone(),
        _ => return Err(ManagerError::AmbiguousGraph),
      }
    };
    self.spawn_execution(registered, task).await
  }

  /// Submit a task against a registered graph handle.
  ///
  /// Returns the task id. With `max_concurrent_tasks` saturated this waits
  /// (cooperatively) for a slot before accepting the task.
  pub async fn submit_to(&self, fqn: &str, task: Task) -> Result<String, ManagerError> {
    let registered = self
      .inner
      .registry
      .read()
      .unwrap()
      .graphs
      .get(fqn)
      .cloned()
      .ok_or_else(|| ManagerError::UnknownGraph {
        fqn: fqn.to_string(),
      })?;
    self.spawn_execution(registered, task).await
  }

  /// Submit a batch of tasks against a registered graph handle.
  pub async fn submit_all(&self, fqn: &str, tasks: Vec<Task>) -> Result<Vec<String>, ManagerError> {
    let mut task_ids = Vec::with_capacity(tasks.len());
    for task in tasks {
      task_ids.push(self.submit_to(fqn, task).await?);
    }
    Ok(task_ids)
  }

  async fn spawn_execution(
    &self,
    registered: Arc<RegisteredWorkflow>,
    task: Task,
  ) -> Result<String, ManagerError> {
    // Backpressure: hold a slot for the task's whole lifetime.
    let permit = match &self.inner.limiter {
      Some(limiter) => Some(
        limiter
          .clone()
          .acquire_owned()
          .await
          .expect("semaphore closed"),
      ),
      None => None,
    };

    let task_id = task.id().to_string();
    let fqn = registered.fqn().to_string();
    let cancel = self.inner.inflight_cancel.lock().unwrap().child_token();
    let global = self.inner.global.read().unwrap().clone();
    let default_timeout = self.inner.config.input_timeout();

    self.inner.counts.lock().unwrap().submitted += 1;
    info!(task_id = %task_id, fqn = %fqn, "task submitted");

    let shared = self.inner.clone();
    let id_for_record = task_id.clone();
    tokio::spawn(async move {
      let _permit = permit;
      match execute_task(registered, task, global, default_timeout, &cancel).await {
        Ok(envelope) => {
          {
            shared.counts.lock().unwrap().completed += 1;
            shared
              .buffer
              .lock()
              .unwrap()
              .completed
              .entry(fqn)
              .or_default()
              .push(envelope.clone());
          }
          shared.done.notify_waiters();
          // Invoked after the books are settled; panics here are the
          // callback's own problem and cannot corrupt accounting.
          if let Some(on_complete) = &shared.config.on_complete {
            on_complete(&envelope);
          }
        }
        Err(err) => {
          let record = ErrorRecord::from_engine(&err, &id_for_record);
          {
            shared.counts.lock().unwrap().errors += 1;
            shared.buffer.lock().unwrap().errors.push(record);
          }
          shared.done.notify_waiters();
        }
      }
    });

    Ok(task_id)
  }

  /// Wait until every submitted task has resolved, up to `timeout`.
  ///
  /// Observes counters only: returns `true` iff `submitted == completed +
  /// errors` at observation time. Does not cancel in-flight tasks.
  pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
      // Register interest before observing the counters, so a completion
      // landing in between still wakes this waiter.
      let notified = self.inner.done.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      if self.all_resolved() {
        return true;
      }
      if tokio::time::timeout_at(deadline, notified).await.is_err() {
        return self.all_resolved();
      }
    }
  }

  fn all_resolved(&self) -> bool {
    let counts = self.get_counts();
    counts.submitted == counts.completed + counts.errors
  }

  /// Atomically drain the result buffer.
  pub fn pop_results(&self) -> Results {
    std::mem::take(&mut *self.inner.buffer.lock().unwrap())
  }

  /// Monotonic lifecycle counters since this manager was created.
  pub fn get_counts(&self) -> Counts {
    *self.inner.counts.lock().unwrap()
  }

  /// Best-effort cancellation of every in-flight execution.
  ///
  /// Cancelled tasks resolve as `CANCELLED` errors; their `on_complete`
  /// callback is not invoked. Later submissions are unaffected.
  pub fn cancel_all(&self) {
    let mut guard = self.inner.inflight_cancel.lock().unwrap();
    guard.cancel();
    *guard = CancellationToken::new();
    warn!("cancelled all in-flight tasks");
  }

  /// One-shot convenience: register, submit, wait and collapse the result.
  ///
  /// Fails if the wait times out, any error was recorded, or no envelope was
  /// produced for the graph.
  pub async fn execute(
    &self,
    task: Task,
    dsl: &Dsl,
    graph_name: &str,
    timeout: Duration,
  ) -> Result<Envelope, ManagerError> {
    let fqn = self.add_graph(dsl, graph_name, "")?;
    self.submit_to(&fqn, task).await?;

    if !self.wait_for_completion(timeout).await {
      return Err(ManagerError::Timeout { timeout });
    }

    let Results {
      mut completed,
      errors,
    } = self.pop_results();
    if !errors.is_empty() {
      return Err(ManagerError::TaskErrors { errors });
    }
    completed
      .remove(&fqn)
      .and_then(|mut envelopes| {
        if envelopes.is_empty() {
          None
        } else {
          Some(envelopes.remove(0))
        }
      })
      .ok_or(ManagerError::MissingResult { fqn })
  }

  /// Construct a manager and execute one task through one composition.
  pub async fn run_once(
    dsl: &Dsl,
    task: Task,
    graph_name: &str,
  ) -> Result<Envelope, ManagerError> {
    FlowManager::new()
      .execute(task, dsl, graph_name, Duration::from_secs(10))
      .await
  }
}

impl Default for FlowManager {
  fn default() -> Self {
    Self::new()
  }
}
