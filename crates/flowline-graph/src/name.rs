//! Fully qualified job names.
//!
//! Every job registered with a manager is addressed by a fully qualified name
//! of the form `graph$$variant$$short$$`. The variant segment may be empty,
//! which yields a double `$$`. The format is parsed literally; downstream
//! callers key intermediate results by the short segment.

use serde::{Deserialize, Serialize};

/// Delimiter between the segments of a fully qualified name.
pub const SPLIT_STR: &str = "$$";

/// Sentinel returned when a name does not parse as a fully qualified name.
///
/// Receiving this sentinel is a programming error on the caller's side, not a
/// value to route on.
pub const UNSUPPORTED_NAME_FORMAT: &str = "UNSUPPORTED_NAME_FORMAT";

/// The segments of a fully qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FqnParts {
  pub graph: String,
  pub variant: String,
  pub short: String,
}

/// Build a fully qualified name from its segments.
pub fn make_fqn(graph: &str, variant: &str, short: &str) -> String {
  format!("{graph}{SPLIT_STR}{variant}{SPLIT_STR}{short}{SPLIT_STR}")
}

/// Parse a fully qualified name into its segments.
///
/// Returns `None` unless the name has exactly three `$$`-terminated segments
/// and a non-empty graph segment.
pub fn parse_fqn(fqn: &str) -> Option<FqnParts> {
  let parts: Vec<&str> = fqn.split(SPLIT_STR).collect();
  if parts.len() != 4 || !parts[3].is_empty() || parts[0].is_empty() {
    return None;
  }
  Some(FqnParts {
    graph: parts[0].to_string(),
    variant: parts[1].to_string(),
    short: parts[2].to_string(),
  })
}

/// Extract the short job name, or the [`UNSUPPORTED_NAME_FORMAT`] sentinel.
pub fn parse_short(fqn: &str) -> String {
  parse_fqn(fqn).map_or_else(|| UNSUPPORTED_NAME_FORMAT.to_string(), |p| p.short)
}

/// Extract the graph name, or the [`UNSUPPORTED_NAME_FORMAT`] sentinel.
pub fn parse_graph(fqn: &str) -> String {
  parse_fqn(fqn).map_or_else(|| UNSUPPORTED_NAME_FORMAT.to_string(), |p| p.graph)
}

/// Extract the variant, or the [`UNSUPPORTED_NAME_FORMAT`] sentinel.
pub fn parse_variant(fqn: &str) -> String {
  parse_fqn(fqn).map_or_else(|| UNSUPPORTED_NAME_FORMAT.to_string(), |p| p.variant)
}

/// Pick a variant that does not collide with any already-registered name.
///
/// If no key in `existing_keys` starts with `graph$$variant$$` the variant is
/// returned unchanged. Otherwise the lowest `_N` suffix (starting at 1) that
/// makes the prefix unique is appended.
pub fn unique_variant(existing_keys: &[String], graph: &str, variant: &str) -> String {
  let taken = |candidate: &str| {
    let prefix = format!("{graph}{SPLIT_STR}{candidate}{SPLIT_STR}");
    existing_keys.iter().any(|key| key.starts_with(&prefix))
  };

  if !taken(variant) {
    return variant.to_string();
  }

  let mut n = 1u32;
  loop {
    let candidate = format!("{variant}_{n}");
    if !taken(&candidate) {
      return candidate;
    }
    n += 1;
  }
}
