//! Flowline Job
//!
//! The runtime contract between the execution engine and user-provided jobs.
//!
//! A job is metadata (a [`JobNode`]: short name, save flag, input timeout)
//! plus a behaviour, anything implementing the [`Job`] trait. User code
//! comes in two shapes:
//!
//! - a type implementing [`Job`] directly, reading the task and its
//!   predecessors' outputs from the [`JobContext`], or
//! - a plain function wrapped by [`FnJob`], which declares its parameter
//!   names once at construction and has them bound from the task's routed
//!   parameters and from upstream outputs at run time.
//!
//! A compiled composition is a [`Workflow`] (immutable nodes + edges);
//! registration with a manager materialises fully qualified names into a
//! [`RegisteredWorkflow`].

mod context;
mod job;
mod node;
mod wrapped;

pub use context::JobContext;
pub use job::{Job, JobError};
pub use node::{
  GatherTail, JobNode, PassthroughHead, RegisteredWorkflow, Workflow, HEAD_NODE, TAIL_NODE,
};
pub use wrapped::{CallArgs, CallContext, FnJob, CONTEXT_PARAM};
