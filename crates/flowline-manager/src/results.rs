use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use flowline_engine::{EngineError, ErrorKind};
use flowline_graph::parse_graph;
use flowline_task::Envelope;

/// One failed task, as drained from the result buffer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
  /// Taxonomy kind, serialised under the wire names.
  pub kind: ErrorKind,
  /// Fully qualified name of the failing job, when one is known.
  pub job_fqn: Option<String>,
  /// Id of the failing task.
  pub task_id: String,
  /// Human-readable description.
  pub message: String,
  /// The underlying user-code message, when distinct from `message`.
  pub cause: Option<String>,
}

impl ErrorRecord {
  pub(crate) fn from_engine(err: &EngineError, task_id: &str) -> Self {
    let cause = match err {
      EngineError::Run { message, .. } | EngineError::ParamBind { message, .. } => {
        Some(message.clone())
      }
      _ => None,
    };
    Self {
      kind: err.kind(),
      job_fqn: err.job_fqn().map(str::to_string),
      task_id: task_id.to_string(),
      message: err.to_string(),
      cause,
    }
  }
}

/// Monotonic lifecycle counters of a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
  pub submitted: u64,
  pub completed: u64,
  pub errors: u64,
}

/// The drained result buffer: completed envelopes keyed by the FQN they were
/// submitted against, plus the recorded errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Results {
  pub completed: HashMap<String, Vec<Envelope>>,
  pub errors: Vec<ErrorRecord>,
}

impl Results {
  /// Nothing completed and nothing failed.
  pub fn is_empty(&self) -> bool {
    self.completed.is_empty() && self.errors.is_empty()
  }

  /// First envelope recorded for a graph, matched by graph name.
  pub fn first_for(&self, graph_name: &str) -> Option<&Envelope> {
    self
      .completed
      .iter()
      .find(|(fqn, _)| parse_graph(fqn) == graph_name)
      .and_then(|(_, envelopes)| envelopes.first())
  }

  /// The `"result"` value of the first envelope for a graph.
  pub fn result_value(&self, graph_name: &str) -> Option<&Value> {
    self.first_for(graph_name).and_then(|envelope| envelope.result())
  }
}
