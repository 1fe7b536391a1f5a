use std::ops::{BitOr, Shr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use flowline_job::{CallArgs, FnJob, Job, JobError};

/// A composition of jobs: a single leaf, a serial chain or a parallel group.
///
/// `Dsl` values are cheap to clone; the tree is shared behind an `Arc` and a
/// composition's identity is that of its root node. Using the same leaf twice
/// within one composition is rejected at compile time.
#[derive(Clone)]
pub struct Dsl {
  pub(crate) node: Arc<DslNode>,
}

pub(crate) enum DslNode {
  Leaf(Leaf),
  Serial(Vec<Dsl>),
  Parallel(Vec<Dsl>),
}

#[derive(Clone)]
pub(crate) struct Leaf {
  pub(crate) short_name: String,
  pub(crate) save_result: bool,
  pub(crate) timeout: Option<Duration>,
  pub(crate) behaviour: Arc<dyn Job>,
}

impl Dsl {
  pub(crate) fn from_node(node: DslNode) -> Self {
    Self {
      node: Arc::new(node),
    }
  }

  /// Identity of this composition (or leaf): pointer identity of the root.
  pub fn identity(&self) -> usize {
    Arc::as_ptr(&self.node) as usize
  }

  /// Opt this job's output into the task's saved results.
  ///
  /// Panics when called on a serial or parallel composition; the flag
  /// belongs to a single job.
  pub fn save_result(self) -> Self {
    match &*self.node {
      DslNode::Leaf(leaf) => Self::from_node(DslNode::Leaf(Leaf {
        save_result: true,
        ..leaf.clone()
      })),
      _ => panic!("save_result applies to a single job, not a composition"),
    }
  }

  /// Set this job's input-wait deadline.
  ///
  /// Panics when called on a serial or parallel composition.
  pub fn timeout(self, timeout: Duration) -> Self {
    match &*self.node {
      DslNode::Leaf(leaf) => Self::from_node(DslNode::Leaf(Leaf {
        timeout: Some(timeout),
        ..leaf.clone()
      })),
      _ => panic!("timeout applies to a single job, not a composition"),
    }
  }
}

impl std::fmt::Debug for Dsl {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &*self.node {
      DslNode::Leaf(leaf) => write!(f, "job({:?})", leaf.short_name),
      DslNode::Serial(children) => {
        f.write_str("sequence(")?;
        for (i, child) in children.iter().enumerate() {
          if i > 0 {
            f.write_str(" >> ")?;
          }
          write!(f, "{child:?}")?;
        }
        f.write_str(")")
      }
      DslNode::Parallel(children) => {
        f.write_str("parallel(")?;
        for (i, child) in children.iter().enumerate() {
          if i > 0 {
            f.write_str(" | ")?;
          }
          write!(f, "{child:?}")?;
        }
        f.write_str(")")
      }
    }
  }
}

/// Name a job behaviour for use in a composition.
pub fn job(name: impl Into<String>, behaviour: impl Job + 'static) -> Dsl {
  Dsl::from_node(DslNode::Leaf(Leaf {
    short_name: name.into(),
    save_result: false,
    timeout: None,
    behaviour: Arc::new(behaviour),
  }))
}

/// Wrap a plain function as a named job.
///
/// `params` declares the parameter names bound at run time; declare
/// [`flowline_job::CONTEXT_PARAM`] to receive the call context.
pub fn func<F>(name: impl Into<String>, params: &[&str], f: F) -> Dsl
where
  F: Fn(CallArgs) -> Result<Value, JobError> + Send + Sync + 'static,
{
  job(name, FnJob::new(params, f))
}

/// Wrap an asynchronous function as a named job.
pub fn func_async<F, Fut>(name: impl Into<String>, params: &[&str], f: F) -> Dsl
where
  F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
  Fut: std::future::Future<Output = Result<Value, JobError>> + Send + 'static,
{
  job(name, FnJob::new_async(params, f))
}

/// Serial composition: pipe each part's output into the next.
pub fn sequence(parts: impl IntoIterator<Item = Dsl>) -> Dsl {
  Dsl::from_node(DslNode::Serial(parts.into_iter().collect()))
}

/// Parallel composition: feed every part the same upstream input.
pub fn parallel(parts: impl IntoIterator<Item = Dsl>) -> Dsl {
  Dsl::from_node(DslNode::Parallel(parts.into_iter().collect()))
}

fn serial_parts(dsl: Dsl) -> Vec<Dsl> {
  if let DslNode::Serial(children) = &*dsl.node {
    return children.clone();
  }
  vec![dsl]
}

fn parallel_parts(dsl: Dsl) -> Vec<Dsl> {
  if let DslNode::Parallel(children) = &*dsl.node {
    return children.clone();
  }
  vec![dsl]
}

/// `a >> b`: serial composition, flattening nested chains.
impl Shr for Dsl {
  type Output = Dsl;

  fn shr(self, rhs: Dsl) -> Dsl {
    let mut parts = serial_parts(self);
    parts.extend(serial_parts(rhs));
    Dsl::from_node(DslNode::Serial(parts))
  }
}

/// `a | b`: parallel composition, flattening nested groups.
impl BitOr for Dsl {
  type Output = Dsl;

  fn bitor(self, rhs: Dsl) -> Dsl {
    let mut parts = parallel_parts(self);
    parts.extend(parallel_parts(rhs));
    Dsl::from_node(DslNode::Parallel(parts))
  }
}
