use std::collections::HashMap;

/// Graph structure for traversal and analysis.
///
/// Built from node names and directed edges; short names are the node keys.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node -> list of downstream nodes.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node -> list of upstream nodes.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no incoming edges.
  entry_points: Vec<String>,
  /// Nodes with no outgoing edges.
  exit_points: Vec<String>,
}

impl Graph {
  /// Build a graph from node names and edges.
  pub fn new<'a, I>(nodes: I, edges: &[(String, String)]) -> Self
  where
    I: IntoIterator<Item = &'a str>,
  {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    // Initialize all nodes
    for node in nodes {
      adjacency.entry(node.to_string()).or_default();
      reverse_adjacency.entry(node.to_string()).or_default();
    }

    // Build adjacency lists
    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    let mut entry_points: Vec<String> = adjacency
      .keys()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();
    entry_points.sort();

    let mut exit_points: Vec<String> = adjacency
      .iter()
      .filter(|(_, outgoing)| outgoing.is_empty())
      .map(|(id, _)| id.clone())
      .collect();
    exit_points.sort();

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
      exit_points,
    }
  }

  /// Get entry points (nodes with no incoming edges), sorted by name.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get exit points (nodes with no outgoing edges), sorted by name.
  pub fn exit_points(&self) -> &[String] {
    &self.exit_points
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node: &str) -> &[String] {
    self.adjacency.get(node).map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }
}
