use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a task error, serialised under the wire names
/// (`INPUT_TIMEOUT`, `RUN_ERROR`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
  CompileError,
  ValidationError,
  UnknownGraph,
  InputTimeout,
  RunError,
  NonMappingOutput,
  Cancelled,
  ParamBindError,
}

/// Errors produced while executing one task through a workflow.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
  /// A job's expected inputs did not all arrive before its deadline.
  #[error("timeout waiting for inputs in '{job_fqn}': expected [{}], received [{}]", expected.join(", "), received.join(", "))]
  InputTimeout {
    job_fqn: String,
    expected: Vec<String>,
    received: Vec<String>,
  },

  /// The job's user code failed.
  #[error("job '{job_fqn}' failed: {message}")]
  Run { job_fqn: String, message: String },

  /// A non-tail job returned a non-mapping output.
  #[error("job '{job_fqn}' returned a non-mapping output")]
  NonMappingOutput { job_fqn: String },

  /// A wrapped callable's parameters could not be bound.
  #[error("parameter binding failed for '{job_fqn}': {message}")]
  ParamBind { job_fqn: String, message: String },

  /// The task was cancelled.
  #[error("execution cancelled")]
  Cancelled,

  /// The execution machinery itself failed (e.g. a panicking job unit).
  #[error("internal execution failure: {message}")]
  Internal { message: String },
}

impl EngineError {
  /// The taxonomy kind of this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InputTimeout { .. } => ErrorKind::InputTimeout,
      Self::Run { .. } | Self::Internal { .. } => ErrorKind::RunError,
      Self::NonMappingOutput { .. } => ErrorKind::NonMappingOutput,
      Self::ParamBind { .. } => ErrorKind::ParamBindError,
      Self::Cancelled => ErrorKind::Cancelled,
    }
  }

  /// The fully qualified name of the failing job, when one is known.
  pub fn job_fqn(&self) -> Option<&str> {
    match self {
      Self::InputTimeout { job_fqn, .. }
      | Self::Run { job_fqn, .. }
      | Self::NonMappingOutput { job_fqn }
      | Self::ParamBind { job_fqn, .. } => Some(job_fqn),
      Self::Cancelled | Self::Internal { .. } => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_serialise_under_wire_names() {
    for (kind, name) in [
      (ErrorKind::CompileError, "\"COMPILE_ERROR\""),
      (ErrorKind::ValidationError, "\"VALIDATION_ERROR\""),
      (ErrorKind::UnknownGraph, "\"UNKNOWN_GRAPH\""),
      (ErrorKind::InputTimeout, "\"INPUT_TIMEOUT\""),
      (ErrorKind::RunError, "\"RUN_ERROR\""),
      (ErrorKind::NonMappingOutput, "\"NON_MAPPING_OUTPUT\""),
      (ErrorKind::Cancelled, "\"CANCELLED\""),
      (ErrorKind::ParamBindError, "\"PARAM_BIND_ERROR\""),
    ] {
      assert_eq!(serde_json::to_string(&kind).unwrap(), name);
    }
  }
}
