use thiserror::Error;

/// Errors reported by graph validation.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
  /// The graph contains a cycle; `path` lists the nodes along it.
  #[error("graph contains a cycle: {}", path.join(" -> "))]
  Cycle { path: Vec<String> },

  /// A node lists a successor that is not a node of the graph.
  #[error("node '{from}' references unknown successor '{to}'")]
  UnknownSuccessor { from: String, to: String },

  /// Every node has incoming edges.
  #[error("graph has no head node (every node has incoming edges)")]
  NoHead,

  /// Every node has outgoing edges.
  #[error("graph has no tail node (every node has outgoing edges)")]
  NoTail,

  /// More than one node has no incoming edges where a single head is required.
  #[error("graph has multiple head nodes: {}", heads.join(", "))]
  MultipleHeads { heads: Vec<String> },

  /// More than one node has no outgoing edges where a single tail is required.
  #[error("graph has multiple tail nodes: {}", tails.join(", "))]
  MultipleTails { tails: Vec<String> },
}
