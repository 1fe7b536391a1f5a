use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::context::JobContext;

/// A job behaviour: the user code the engine invokes once per task.
///
/// Implementations read the task and predecessor outputs from the context
/// and return their output as a JSON value. Mappings flow to successors
/// unchanged; what happens to non-mapping returns depends on the job's
/// position in the graph (the tail wraps them as `{"result": ...}`, anywhere
/// else they are an error).
#[async_trait]
pub trait Job: Send + Sync {
  async fn run(&self, ctx: &JobContext) -> Result<Value, JobError>;
}

/// Errors a job behaviour can produce.
#[derive(Debug, Clone, Error)]
pub enum JobError {
  /// A wrapped callable's declared parameters could not be bound.
  #[error("{message}")]
  ParamBind { message: String },

  /// The job's user code failed.
  #[error("{message}")]
  Failed { message: String },
}

impl JobError {
  /// A parameter-binding failure.
  pub fn param_bind(message: impl Into<String>) -> Self {
    Self::ParamBind {
      message: message.into(),
    }
  }

  /// A user-code failure.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}
