//! Per-task graph execution.
//!
//! One execution owns all of its state: an input channel per job, the saved
//! results map and an execution-scoped cancellation token. Units communicate
//! only through the channels; a job's output is observable at a successor
//! before the successor's user code runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use flowline_job::{JobContext, JobError, JobNode, RegisteredWorkflow};
use flowline_task::{Envelope, Task, TaskData};

use crate::error::EngineError;

/// Default input-wait deadline for jobs without an explicit timeout.
pub const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(3000);

/// An input posted to a job's gate: the producer's short name and its output.
type InputMessage = (String, TaskData);

/// Execute one task through a registered workflow.
///
/// Spawns one unit per job of the graph. Head units consume the task
/// directly; every other unit gates on its direct predecessors with the
/// job's input timeout. The tail unit assembles the result envelope. The
/// first failing unit cancels the remaining units of this execution and its
/// error becomes the task's error.
#[instrument(
  name = "task_execute",
  skip_all,
  fields(graph = %registered.fqn(), task_id = %task.id())
)]
pub async fn execute_task(
  registered: Arc<RegisteredWorkflow>,
  task: Task,
  global: Arc<TaskData>,
  default_timeout: Duration,
  cancel: &CancellationToken,
) -> Result<Envelope, EngineError> {
  info!(jobs = registered.workflow().nodes.len(), "task started");

  let graph = registered.workflow().graph();
  let task = Arc::new(task);
  let saved: Arc<Mutex<HashMap<String, Value>>> = Arc::new(Mutex::new(HashMap::new()));
  let exec_cancel = cancel.child_token();

  let mut senders: HashMap<String, mpsc::UnboundedSender<InputMessage>> = HashMap::new();
  let mut receivers: HashMap<String, mpsc::UnboundedReceiver<InputMessage>> = HashMap::new();
  for short_name in registered.workflow().nodes.keys() {
    let (tx, rx) = mpsc::unbounded_channel();
    senders.insert(short_name.clone(), tx);
    receivers.insert(short_name.clone(), rx);
  }

  let mut units = JoinSet::new();
  for (short_name, node) in &registered.workflow().nodes {
    let successors = graph
      .downstream(short_name)
      .iter()
      .map(|succ| senders[succ].clone())
      .collect();

    let unit = JobUnit {
      node: node.clone(),
      fq_name: registered.fq_name(short_name).to_string(),
      expected: graph.upstream(short_name).to_vec(),
      receiver: receivers.remove(short_name).unwrap(),
      successors,
      is_tail: short_name == registered.tail(),
      timeout: node.timeout.unwrap_or(default_timeout),
      task: task.clone(),
      saved: saved.clone(),
      global: global.clone(),
      cancel: exec_cancel.clone(),
    };
    units.spawn(unit.run());
  }
  // Units own the senders they need; close the rest so gates can observe
  // dead producers.
  drop(senders);

  let mut envelope = None;
  let mut first_error: Option<EngineError> = None;
  while let Some(joined) = units.join_next().await {
    match joined {
      Ok(Ok(Some(env))) => envelope = Some(env),
      Ok(Ok(None)) => {}
      Ok(Err(err)) => {
        record_error(&mut first_error, err);
        exec_cancel.cancel();
      }
      Err(join_err) => {
        record_error(
          &mut first_error,
          EngineError::Internal {
            message: format!("job unit panicked: {join_err}"),
          },
        );
        exec_cancel.cancel();
      }
    }
  }

  match first_error {
    Some(err) => {
      error!(error = %err, "task failed");
      Err(err)
    }
    None => match envelope {
      Some(env) => {
        info!("task completed");
        Ok(env)
      }
      None => Err(EngineError::Internal {
        message: "execution finished without a tail output".to_string(),
      }),
    },
  }
}

/// Keep the root cause: the first error wins, except that a cascade
/// `Cancelled` yields to any later concrete error.
fn record_error(slot: &mut Option<EngineError>, err: EngineError) {
  match slot {
    None => *slot = Some(err),
    Some(EngineError::Cancelled) if !matches!(err, EngineError::Cancelled) => *slot = Some(err),
    Some(_) => {}
  }
}

/// One job's walk within a single task execution.
struct JobUnit {
  node: JobNode,
  fq_name: String,
  expected: Vec<String>,
  receiver: mpsc::UnboundedReceiver<InputMessage>,
  successors: Vec<mpsc::UnboundedSender<InputMessage>>,
  is_tail: bool,
  timeout: Duration,
  task: Arc<Task>,
  saved: Arc<Mutex<HashMap<String, Value>>>,
  global: Arc<TaskData>,
  cancel: CancellationToken,
}

impl JobUnit {
  async fn run(mut self) -> Result<Option<Envelope>, EngineError> {
    if self.cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }

    let inputs = self.wait_for_inputs().await?;

    let ctx = JobContext::new(
      self.node.short_name.clone(),
      self.task.clone(),
      inputs,
      self.global.clone(),
    );
    let result = tokio::select! {
      result = self.node.behaviour.run(&ctx) => result,
      _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
    };
    let value = result.map_err(|err| match err {
      JobError::ParamBind { message } => EngineError::ParamBind {
        job_fqn: self.fq_name.clone(),
        message,
      },
      JobError::Failed { message } => EngineError::Run {
        job_fqn: self.fq_name.clone(),
        message,
      },
    })?;

    // Saved results capture the run value before any wrapping.
    if self.node.save_result {
      self
        .saved
        .lock()
        .unwrap()
        .insert(self.node.short_name.clone(), value.clone());
    }

    let output = match value {
      Value::Object(map) => map,
      other if self.is_tail => {
        let mut wrapped = TaskData::new();
        wrapped.insert("result".to_string(), other);
        wrapped
      }
      _ => {
        return Err(EngineError::NonMappingOutput {
          job_fqn: self.fq_name.clone(),
        })
      }
    };

    for successor in &self.successors {
      // A successor that already failed is gone; its unit reported why.
      let _ = successor.send((self.node.short_name.clone(), output.clone()));
    }

    if self.is_tail {
      let saved_results = self.saved.lock().unwrap().clone();
      return Ok(Some(Envelope {
        output,
        return_job: self.fq_name.clone(),
        task: (*self.task).clone(),
        saved_results,
      }));
    }
    Ok(None)
  }

  /// Gate on the direct predecessors' outputs.
  async fn wait_for_inputs(&mut self) -> Result<HashMap<String, TaskData>, EngineError> {
    let mut inputs = HashMap::new();
    if self.expected.is_empty() {
      // Head job: consumes the task directly.
      return Ok(inputs);
    }

    let deadline = tokio::time::sleep(self.timeout);
    tokio::pin!(deadline);

    while !self.expected.iter().all(|name| inputs.contains_key(name)) {
      tokio::select! {
        _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
        _ = &mut deadline => {
          let mut expected = self.expected.clone();
          expected.sort_unstable();
          let mut received: Vec<String> = inputs.keys().cloned().collect();
          received.sort_unstable();
          warn!(job = %self.fq_name, ?expected, ?received, "timed out waiting for inputs");
          return Err(EngineError::InputTimeout {
            job_fqn: self.fq_name.clone(),
            expected,
            received,
          });
        }
        message = self.receiver.recv() => match message {
          Some((from, output)) => {
            inputs.insert(from, output);
          }
          // Every producer is gone without satisfying the gate; the failing
          // unit reports the root cause.
          None => return Err(EngineError::Cancelled),
        },
      }
    }
    Ok(inputs)
  }
}
