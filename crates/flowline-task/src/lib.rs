//! Flowline Task
//!
//! Work item and result types shared across the workspace:
//!
//! - [`Task`]: one unit of work flowing through a graph, a JSON object
//!   payload plus an auto-assigned unique id. The payload passes through the
//!   whole pipeline unchanged.
//! - [`Envelope`]: the per-task result, the tail job's output at the top
//!   level plus the producing job, the original task and any saved
//!   intermediate results.
//! - parameter routing: the dotted (`"job.param"`) and nested
//!   (`{"job": {...}}`) encodings of per-job parameters, normalised into a
//!   single internal form.

mod envelope;
mod params;
mod task;

pub use envelope::{Envelope, RETURN_JOB, SAVED_RESULTS, TASK_PASSTHROUGH_KEY};
pub use params::{route_params, RoutedParams, ARGS_KEY, KWARGS_KEY};
pub use task::{Task, TaskData};
