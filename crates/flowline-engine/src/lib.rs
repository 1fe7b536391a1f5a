//! Flowline Engine
//!
//! The per-task execution engine. Each submitted task gets its own walk of
//! the registered workflow: one lightweight unit per job, gating on the
//! outputs of its direct predecessors, running the job's behaviour, and
//! copying the output to every successor. Fan-out is the distribution step,
//! fan-in is the gate; the happens-before order between a job and its
//! successors follows the graph edges.
//!
//! Failures are per task: the first failing unit cancels the remaining units
//! of the same execution and becomes the task's error. Concurrent tasks
//! never observe each other.

mod error;
mod executor;

pub use error::{EngineError, ErrorKind};
pub use executor::{execute_task, DEFAULT_INPUT_TIMEOUT};
