//! Flowline Graph
//!
//! This crate provides the graph layer shared by the rest of the workspace:
//!
//! - fully qualified job names (`graph$$variant$$short$$`) and the collision
//!   suffixing used when the same graph/variant pair is registered twice,
//! - the adjacency [`Graph`] built from nodes and edges, used for traversal,
//! - validation of a precedence graph before it is accepted for execution
//!   (cycles, dangling successor references, head/tail existence).

mod error;
mod graph;
mod name;
mod validate;

pub use error::GraphError;
pub use graph::Graph;
pub use name::{
  make_fqn, parse_fqn, parse_graph, parse_short, parse_variant, unique_variant, FqnParts,
  SPLIT_STR, UNSUPPORTED_NAME_FORMAT,
};
pub use validate::{validate, Adjacency};
