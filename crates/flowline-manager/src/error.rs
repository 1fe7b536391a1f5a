use std::time::Duration;

use thiserror::Error;

use flowline_dsl::CompileError;
use flowline_engine::ErrorKind;
use flowline_graph::GraphError;

use crate::results::ErrorRecord;

/// Errors raised by manager operations.
///
/// Compilation, validation and unknown-graph failures are raised at the call
/// site and never enter the result buffer; per-task failures are drained via
/// [`pop_results`](crate::FlowManager::pop_results) instead.
#[derive(Debug, Error)]
pub enum ManagerError {
  /// `add_graph` requires a graph name.
  #[error("graph name cannot be empty")]
  EmptyGraphName,

  /// The composition failed to compile.
  #[error("compilation failed: {0}")]
  Compile(CompileError),

  /// The compiled graph failed validation.
  #[error("graph validation failed: {0}")]
  Validation(GraphError),

  /// `submit` against an FQN that is not in the registry.
  #[error("no graph registered under '{fqn}'")]
  UnknownGraph { fqn: String },

  /// `submit` without an FQN requires at least one registered graph.
  #[error("no graphs registered")]
  NoGraphs,

  /// `submit` without an FQN is ambiguous with several registered graphs.
  #[error("multiple graphs registered; submit against an explicit FQN")]
  AmbiguousGraph,

  /// `execute` gave up waiting for the task to resolve.
  #[error("timed out after {timeout:?} waiting for tasks to complete")]
  Timeout { timeout: Duration },

  /// `execute` observed recorded task errors.
  #[error("errors occurred during execution: {}", errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; "))]
  TaskErrors { errors: Vec<ErrorRecord> },

  /// `execute` found no envelope for the graph it submitted against.
  #[error("no result recorded for '{fqn}'")]
  MissingResult { fqn: String },
}

impl ManagerError {
  /// The taxonomy kind for errors that have one.
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      Self::Compile(_) | Self::EmptyGraphName => Some(ErrorKind::CompileError),
      Self::Validation(_) => Some(ErrorKind::ValidationError),
      Self::UnknownGraph { .. } => Some(ErrorKind::UnknownGraph),
      _ => None,
    }
  }
}
