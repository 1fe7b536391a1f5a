//! Per-job parameter routing.
//!
//! Task payloads address parameters at jobs in two equivalent encodings:
//!
//! - dotted: `{"square.x": 5}`
//! - nested: `{"square": {"x": 5}}`
//!
//! [`route_params`] normalises both into one internal form, short name ->
//! parameter map. Both encodings of the same parameters route identically;
//! when the same parameter appears in both, the dotted entry wins. Entries
//! addressed at no job (plain keys with non-object values) are left for head
//! jobs to consume from the task itself, and entries addressed at a short
//! name no job carries are simply never looked up.

use serde_json::Value;

use crate::task::TaskData;
use std::collections::HashMap;

/// Reserved inner key: positional arguments, spread in declaration order.
pub const ARGS_KEY: &str = "args";

/// Reserved inner key: keyword arguments, merged after named parameters.
pub const KWARGS_KEY: &str = "kwargs";

/// Routed parameters: short job name -> that job's parameter map.
pub type RoutedParams = HashMap<String, TaskData>;

/// Normalise a task payload into per-job parameter maps.
pub fn route_params(data: &TaskData) -> RoutedParams {
  let mut routed = RoutedParams::new();

  // Nested form first: object values under a plain key.
  for (key, value) in data {
    if key.contains('.') {
      continue;
    }
    if let Value::Object(params) = value {
      let entry = routed.entry(key.clone()).or_default();
      for (param, v) in params {
        entry.insert(param.clone(), v.clone());
      }
    }
  }

  // Dotted form second, so dotted entries win on conflict.
  for (key, value) in data {
    if let Some((job, param)) = key.split_once('.') {
      if job.is_empty() || param.is_empty() {
        continue;
      }
      routed
        .entry(job.to_string())
        .or_default()
        .insert(param.to_string(), value.clone());
    }
  }

  routed
}
