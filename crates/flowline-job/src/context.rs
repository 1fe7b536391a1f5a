use std::collections::HashMap;
use std::sync::Arc;

use flowline_task::{Task, TaskData};

/// Per-execution state handed to a job when it runs.
///
/// Each (task, graph) execution owns its own contexts; nothing here is shared
/// across concurrent runs of the same graph.
#[derive(Debug, Clone)]
pub struct JobContext {
  short_name: String,
  task: Arc<Task>,
  inputs: HashMap<String, TaskData>,
  global: Arc<TaskData>,
}

impl JobContext {
  pub fn new(
    short_name: impl Into<String>,
    task: Arc<Task>,
    inputs: HashMap<String, TaskData>,
    global: Arc<TaskData>,
  ) -> Self {
    Self {
      short_name: short_name.into(),
      task,
      inputs,
      global,
    }
  }

  /// Short name of the job this context belongs to.
  pub fn short_name(&self) -> &str {
    &self.short_name
  }

  /// The task being processed.
  pub fn task(&self) -> &Task {
    &self.task
  }

  /// Outputs of the direct predecessors, keyed by their short names.
  ///
  /// Empty for a head job, which consumes the task directly.
  pub fn inputs(&self) -> &HashMap<String, TaskData> {
    &self.inputs
  }

  /// Output of one direct predecessor.
  pub fn input(&self, short_name: &str) -> Option<&TaskData> {
    self.inputs.get(short_name)
  }

  /// The manager-wide shared context.
  pub fn global(&self) -> &TaskData {
    &self.global
  }
}
