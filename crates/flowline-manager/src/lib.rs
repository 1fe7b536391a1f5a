//! Flowline Manager
//!
//! The front-end of the executor: a [`FlowManager`] owns the compiled graph
//! registry, accepts task submissions against registered graphs, tracks
//! lifecycle counters, and buffers structured results and errors until they
//! are drained.
//!
//! ```
//! use flowline_dsl::func;
//! use flowline_manager::FlowManager;
//! use flowline_task::Task;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let square = func("square", &["x"], |call| {
//!   let x: i64 = call.arg("x")?;
//!   Ok(json!(x * x))
//! });
//! let double = func("double", &["input_val"], |call| {
//!   let v: i64 = call.arg("input_val")?;
//!   Ok(json!(v * 2))
//! });
//!
//! let manager = FlowManager::new();
//! let envelope = manager
//!   .execute(
//!     Task::from_json(json!({"square.x": 5})),
//!     &(square >> double),
//!     "pipeline",
//!     std::time::Duration::from_secs(10),
//!   )
//!   .await
//!   .unwrap();
//! assert_eq!(envelope.result(), Some(&json!(50)));
//! # }
//! ```

mod config;
mod error;
mod manager;
mod results;

pub use config::{ManagerConfig, OnComplete};
pub use error::ManagerError;
pub use manager::FlowManager;
pub use results::{Counts, ErrorRecord, Results};

pub use flowline_engine::ErrorKind;
pub use flowline_task::{Envelope, Task};
