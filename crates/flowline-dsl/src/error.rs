use thiserror::Error;

use flowline_graph::GraphError;

/// Errors reported when lowering a composition to a workflow.
#[derive(Debug, Error)]
pub enum CompileError {
  /// A serial or parallel group has no parts.
  #[error("composition is empty")]
  Empty,

  /// The same job value appears at two places in the composition.
  #[error("job '{name}' appears more than once in the composition")]
  DuplicateLeaf { name: String },

  /// Two distinct jobs share a short name.
  #[error("job name '{name}' is used by more than one job")]
  DuplicateName { name: String },

  /// A job uses a name reserved for synthetic nodes.
  #[error("job name '{name}' is reserved for synthetic nodes")]
  ReservedName { name: String },

  /// The produced precedence graph failed validation.
  #[error(transparent)]
  Invalid(#[from] GraphError),
}
