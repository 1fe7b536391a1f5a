//! Compiled graph nodes and workflows.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use flowline_graph::{make_fqn, Graph, GraphError};
use flowline_task::TaskData;

use crate::context::JobContext;
use crate::job::{Job, JobError};

/// Short name of the synthetic head inserted when a composition has several
/// entry nodes.
pub const HEAD_NODE: &str = "__head__";

/// Short name of the synthetic tail inserted when a composition has several
/// exit nodes.
pub const TAIL_NODE: &str = "__tail__";

/// A node of a compiled graph: metadata plus the behaviour that runs.
#[derive(Clone)]
pub struct JobNode {
  /// Unique identifier within the graph.
  pub short_name: String,
  /// Capture this job's output into the task's saved results.
  pub save_result: bool,
  /// Input-wait deadline; the engine default applies when absent.
  pub timeout: Option<Duration>,
  /// The user code (or synthetic behaviour) invoked once per task.
  pub behaviour: Arc<dyn Job>,
}

impl JobNode {
  pub fn new(short_name: impl Into<String>, behaviour: Arc<dyn Job>) -> Self {
    Self {
      short_name: short_name.into(),
      save_result: false,
      timeout: None,
      behaviour,
    }
  }
}

impl fmt::Debug for JobNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JobNode")
      .field("short_name", &self.short_name)
      .field("save_result", &self.save_result)
      .field("timeout", &self.timeout)
      .finish_non_exhaustive()
  }
}

/// A compiled, validated workflow: immutable nodes and edges.
///
/// Produced by the composition compiler; after head/tail normalisation it has
/// exactly one entry and one exit node.
#[derive(Debug, Clone)]
pub struct Workflow {
  /// Nodes keyed by short name.
  pub nodes: HashMap<String, JobNode>,
  /// Directed edges between short names.
  pub edges: Vec<(String, String)>,
}

impl Workflow {
  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(self.nodes.keys().map(String::as_str), &self.edges)
  }

  /// Get a node by short name.
  pub fn get_node(&self, short_name: &str) -> Option<&JobNode> {
    self.nodes.get(short_name)
  }
}

/// A workflow registered under a graph name and variant, with fully
/// qualified names materialised for every node.
///
/// Immutable once constructed; the registry hands out `Arc`s of it.
#[derive(Debug, Clone)]
pub struct RegisteredWorkflow {
  graph_name: String,
  variant: String,
  fqn: String,
  head: String,
  tail: String,
  fq_names: HashMap<String, String>,
  workflow: Workflow,
}

impl RegisteredWorkflow {
  /// Materialise fully qualified names for a compiled workflow.
  ///
  /// The workflow must already be normalised: exactly one entry and exactly
  /// one exit node.
  pub fn register(
    workflow: Workflow,
    graph_name: &str,
    variant: &str,
  ) -> Result<Self, GraphError> {
    let graph = workflow.graph();

    let head = match graph.entry_points() {
      [] => return Err(GraphError::NoHead),
      [head] => head.clone(),
      heads => {
        return Err(GraphError::MultipleHeads {
          heads: heads.to_vec(),
        })
      }
    };
    let tail = match graph.exit_points() {
      [] => return Err(GraphError::NoTail),
      [tail] => tail.clone(),
      tails => {
        return Err(GraphError::MultipleTails {
          tails: tails.to_vec(),
        })
      }
    };

    let fq_names: HashMap<String, String> = workflow
      .nodes
      .keys()
      .map(|short| (short.clone(), make_fqn(graph_name, variant, short)))
      .collect();
    let fqn = fq_names[&head].clone();

    Ok(Self {
      graph_name: graph_name.to_string(),
      variant: variant.to_string(),
      fqn,
      head,
      tail,
      fq_names,
      workflow,
    })
  }

  /// The graph handle: the head node's fully qualified name.
  pub fn fqn(&self) -> &str {
    &self.fqn
  }

  pub fn graph_name(&self) -> &str {
    &self.graph_name
  }

  pub fn variant(&self) -> &str {
    &self.variant
  }

  /// Short name of the unique entry node.
  pub fn head(&self) -> &str {
    &self.head
  }

  /// Short name of the unique exit node.
  pub fn tail(&self) -> &str {
    &self.tail
  }

  pub fn workflow(&self) -> &Workflow {
    &self.workflow
  }

  /// Fully qualified name of a node of this workflow.
  ///
  /// Panics if the short name is not a node of the workflow.
  pub fn fq_name(&self, short_name: &str) -> &str {
    &self.fq_names[short_name]
  }
}

/// Behaviour of the synthetic head: emit the task payload unchanged.
pub struct PassthroughHead;

#[async_trait]
impl Job for PassthroughHead {
  async fn run(&self, ctx: &JobContext) -> Result<Value, JobError> {
    Ok(Value::Object(ctx.task().data().clone()))
  }
}

/// Behaviour of the synthetic tail: gather predecessor outputs into a
/// mapping keyed by short name.
pub struct GatherTail;

#[async_trait]
impl Job for GatherTail {
  async fn run(&self, ctx: &JobContext) -> Result<Value, JobError> {
    let mut gathered = TaskData::new();
    for (short_name, output) in ctx.inputs() {
      gathered.insert(short_name.clone(), Value::Object(output.clone()));
    }
    Ok(Value::Object(gathered))
  }
}
