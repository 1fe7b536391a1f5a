use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a task or job output: a JSON object.
pub type TaskData = serde_json::Map<String, Value>;

fn fresh_task_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

/// One unit of work flowing through a graph.
///
/// A task is a mapping of string keys to arbitrary JSON values plus a
/// globally unique id. The id is identity, not payload: serialising a task
/// yields only its data, and equality compares ids. The payload survives the
/// entire pipeline unchanged and is returned in the result envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  #[serde(skip_serializing, default = "fresh_task_id")]
  task_id: String,
  #[serde(flatten)]
  data: TaskData,
}

impl Task {
  /// Create a task from a JSON object payload.
  pub fn new(data: TaskData) -> Self {
    Self {
      task_id: fresh_task_id(),
      data,
    }
  }

  /// Create a task from any JSON value.
  ///
  /// Objects become the payload directly; any other value is stored under a
  /// `"task"` key.
  pub fn from_json(value: Value) -> Self {
    match value {
      Value::Object(data) => Self::new(data),
      other => {
        let mut data = TaskData::new();
        data.insert("task".to_string(), other);
        Self::new(data)
      }
    }
  }

  /// The unique task id.
  pub fn id(&self) -> &str {
    &self.task_id
  }

  /// The task payload.
  pub fn data(&self) -> &TaskData {
    &self.data
  }

  /// Look up a payload entry.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.data.get(key)
  }
}

impl From<TaskData> for Task {
  fn from(data: TaskData) -> Self {
    Self::new(data)
  }
}

impl PartialEq for Task {
  fn eq(&self, other: &Self) -> bool {
    self.task_id == other.task_id
  }
}

impl Eq for Task {}
