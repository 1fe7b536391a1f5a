//! Lowering a combinator tree to a workflow.
//!
//! The compiler walks the tree once collecting leaves, once linking edges
//! (serial composition connects every exit of a stage to every entry of the
//! next; parallel composition adds no edges between siblings), validates the
//! resulting precedence graph and finally normalises it to a single head and
//! a single tail, inserting synthetic passthrough nodes where needed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use flowline_graph::{validate, Adjacency};
use flowline_job::{GatherTail, Job, JobNode, PassthroughHead, Workflow, HEAD_NODE, TAIL_NODE};

use crate::dsl::{Dsl, DslNode};
use crate::error::CompileError;

/// Compile a composition into a validated, normalised workflow.
pub fn compile(dsl: &Dsl) -> Result<Workflow, CompileError> {
  let mut nodes = HashMap::new();
  let mut seen = HashSet::new();
  collect_leaves(dsl, &mut seen, &mut nodes)?;

  let mut edges = Vec::new();
  let (entries, exits) = link(dsl, &mut edges)?;

  let mut adjacency: Adjacency = nodes.keys().map(|name| (name.clone(), Vec::new())).collect();
  for (from, to) in &edges {
    if let Some(successors) = adjacency.get_mut(from) {
      successors.push(to.clone());
    }
  }
  validate(&adjacency)?;

  if entries.len() > 1 {
    insert_synthetic(&mut nodes, HEAD_NODE, Arc::new(PassthroughHead))?;
    for entry in &entries {
      edges.push((HEAD_NODE.to_string(), entry.clone()));
    }
  }
  if exits.len() > 1 {
    insert_synthetic(&mut nodes, TAIL_NODE, Arc::new(GatherTail))?;
    for exit in &exits {
      edges.push((exit.clone(), TAIL_NODE.to_string()));
    }
  }

  Ok(Workflow { nodes, edges })
}

fn insert_synthetic(
  nodes: &mut HashMap<String, JobNode>,
  name: &str,
  behaviour: Arc<dyn Job>,
) -> Result<(), CompileError> {
  if nodes.contains_key(name) {
    return Err(CompileError::ReservedName {
      name: name.to_string(),
    });
  }
  nodes.insert(name.to_string(), JobNode::new(name, behaviour));
  Ok(())
}

fn collect_leaves(
  dsl: &Dsl,
  seen: &mut HashSet<usize>,
  nodes: &mut HashMap<String, JobNode>,
) -> Result<(), CompileError> {
  match &*dsl.node {
    DslNode::Leaf(leaf) => {
      if !seen.insert(dsl.identity()) {
        return Err(CompileError::DuplicateLeaf {
          name: leaf.short_name.clone(),
        });
      }
      if nodes.contains_key(&leaf.short_name) {
        return Err(CompileError::DuplicateName {
          name: leaf.short_name.clone(),
        });
      }
      let mut node = JobNode::new(&leaf.short_name, leaf.behaviour.clone());
      node.save_result = leaf.save_result;
      node.timeout = leaf.timeout;
      nodes.insert(leaf.short_name.clone(), node);
      Ok(())
    }
    DslNode::Serial(children) | DslNode::Parallel(children) => {
      if children.is_empty() {
        return Err(CompileError::Empty);
      }
      for child in children {
        collect_leaves(child, seen, nodes)?;
      }
      Ok(())
    }
  }
}

/// Link edges and report the subtree's entries and exits.
///
/// A leaf is its own entry and exit; a serial chain enters through its first
/// child and exits through its last; a parallel group's entries and exits are
/// the unions over its children.
fn link(
  dsl: &Dsl,
  edges: &mut Vec<(String, String)>,
) -> Result<(Vec<String>, Vec<String>), CompileError> {
  match &*dsl.node {
    DslNode::Leaf(leaf) => Ok((
      vec![leaf.short_name.clone()],
      vec![leaf.short_name.clone()],
    )),
    DslNode::Serial(children) => {
      if children.is_empty() {
        return Err(CompileError::Empty);
      }
      let mut entries: Option<Vec<String>> = None;
      let mut prev_exits: Option<Vec<String>> = None;
      for child in children {
        let (child_entries, child_exits) = link(child, edges)?;
        if let Some(exits) = &prev_exits {
          for from in exits {
            for to in &child_entries {
              edges.push((from.clone(), to.clone()));
            }
          }
        }
        entries.get_or_insert(child_entries);
        prev_exits = Some(child_exits);
      }
      // Non-empty chain: both are set after the loop.
      Ok((entries.unwrap(), prev_exits.unwrap()))
    }
    DslNode::Parallel(children) => {
      if children.is_empty() {
        return Err(CompileError::Empty);
      }
      let mut entries = Vec::new();
      let mut exits = Vec::new();
      for child in children {
        let (child_entries, child_exits) = link(child, edges)?;
        entries.extend(child_entries);
        exits.extend(child_exits);
      }
      Ok((entries, exits))
    }
  }
}
