//! Flowline DSL
//!
//! Declarative composition of jobs into a processing graph.
//!
//! A [`Dsl`] value is a combinator tree: a single job, a serial chain
//! (`a >> b`, every output piped to the next stage) or a parallel group
//! (`a | b`, every branch fed the same upstream input). [`compile`] lowers
//! the tree into a validated [`Workflow`](flowline_job::Workflow), inserting
//! synthetic head/tail nodes when the composition exposes several entries or
//! exits.
//!
//! ```
//! use flowline_dsl::{func, compile};
//! use serde_json::json;
//!
//! let gen = func("gen", &["start"], |call| {
//!   let start: i64 = call.arg("start")?;
//!   Ok(json!({"numbers": [start, start + 1]}))
//! });
//! let sq = func("sq", &["numbers"], |call| {
//!   let numbers: Vec<i64> = call.arg("numbers")?;
//!   Ok(json!({"squared": numbers.iter().map(|n| n * n).collect::<Vec<_>>()}))
//! });
//!
//! let workflow = compile(&(gen >> sq)).unwrap();
//! assert_eq!(workflow.nodes.len(), 2);
//! ```

mod compile;
mod dsl;
mod error;

pub use compile::compile;
pub use dsl::{func, func_async, job, parallel, sequence, Dsl};
pub use error::CompileError;
