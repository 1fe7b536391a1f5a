use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::task::{Task, TaskData};

/// Envelope key holding the fully qualified name of the producing job.
pub const RETURN_JOB: &str = "RETURN_JOB";

/// Envelope key holding the original task payload.
pub const TASK_PASSTHROUGH_KEY: &str = "task_pass_through";

/// Envelope key holding the saved intermediate results.
pub const SAVED_RESULTS: &str = "SAVED_RESULTS";

/// The per-task result delivered on completion.
///
/// The tail job's output sits at the top level when serialised; the reserved
/// keys carry the producing job's fully qualified name, the original task and
/// the outputs of jobs that opted into result saving.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
  /// Output of the tail job, spread at the top level.
  #[serde(flatten)]
  pub output: TaskData,

  /// Fully qualified name of the job that produced this envelope.
  #[serde(rename = "RETURN_JOB")]
  pub return_job: String,

  /// The original task, unchanged.
  #[serde(rename = "task_pass_through")]
  pub task: Task,

  /// Saved outputs keyed by short job name. Values are the raw run results,
  /// captured before any `{"result": ...}` wrapping.
  #[serde(rename = "SAVED_RESULTS")]
  pub saved_results: HashMap<String, Value>,
}

impl Envelope {
  /// Look up a top-level output entry.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.output.get(key)
  }

  /// The `"result"` entry of the output, when present.
  pub fn result(&self) -> Option<&Value> {
    self.output.get("result")
  }
}
