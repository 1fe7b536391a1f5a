//! Precedence-graph validation.
//!
//! The validator is pure: it inspects an adjacency table keyed by short name
//! and never mutates it. Multiple heads or tails are not an error here; the
//! composition compiler normalises those with synthetic nodes before
//! registration.

use std::collections::HashMap;

use crate::error::GraphError;

/// A precedence graph: short name -> successor short names.
pub type Adjacency = HashMap<String, Vec<String>>;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
  White,
  Gray,
  Black,
}

/// Validate a precedence graph.
///
/// Checks, in order: every successor reference resolves to a node of the
/// graph, the graph is acyclic (reporting the offending cycle), and at least
/// one head and one tail exist.
pub fn validate(adjacency: &Adjacency) -> Result<(), GraphError> {
  check_references(adjacency)?;
  check_acyclic(adjacency)?;
  check_head_and_tail(adjacency)
}

fn check_references(adjacency: &Adjacency) -> Result<(), GraphError> {
  for (from, successors) in adjacency {
    for to in successors {
      if !adjacency.contains_key(to) {
        return Err(GraphError::UnknownSuccessor {
          from: from.clone(),
          to: to.clone(),
        });
      }
    }
  }
  Ok(())
}

fn check_acyclic(adjacency: &Adjacency) -> Result<(), GraphError> {
  let mut marks: HashMap<&str, Mark> = adjacency.keys().map(|k| (k.as_str(), Mark::White)).collect();

  // Sorted roots keep the reported cycle deterministic.
  let mut roots: Vec<&str> = adjacency.keys().map(String::as_str).collect();
  roots.sort_unstable();

  for root in roots {
    if marks[root] == Mark::White {
      let mut path = Vec::new();
      visit(root, adjacency, &mut marks, &mut path)?;
    }
  }
  Ok(())
}

fn visit<'a>(
  node: &'a str,
  adjacency: &'a Adjacency,
  marks: &mut HashMap<&'a str, Mark>,
  path: &mut Vec<&'a str>,
) -> Result<(), GraphError> {
  marks.insert(node, Mark::Gray);
  path.push(node);

  for next in &adjacency[node] {
    match marks[next.as_str()] {
      // A gray successor is a back edge: the cycle runs from its first
      // appearance on the current path back to it.
      Mark::Gray => {
        let start = path.iter().position(|n| *n == next.as_str()).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(next.clone());
        return Err(GraphError::Cycle { path: cycle });
      }
      Mark::White => visit(next, adjacency, marks, path)?,
      Mark::Black => {}
    }
  }

  path.pop();
  marks.insert(node, Mark::Black);
  Ok(())
}

fn check_head_and_tail(adjacency: &Adjacency) -> Result<(), GraphError> {
  let has_tail = adjacency.values().any(|successors| successors.is_empty());
  if !has_tail {
    return Err(GraphError::NoTail);
  }

  let has_head = adjacency
    .keys()
    .any(|node| !adjacency.values().any(|successors| successors.contains(node)));
  if !has_head {
    return Err(GraphError::NoHead);
  }

  Ok(())
}
