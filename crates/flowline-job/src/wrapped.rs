//! Wrapped plain functions.
//!
//! [`FnJob`] turns a plain function into a job behaviour. The function's
//! parameter names are declared once at construction; at run time each name
//! is bound, in precedence order, from:
//!
//! 1. the routed `args` entry (positional, in declaration order),
//! 2. the parameters routed at this job's short name, by name,
//! 3. the routed `kwargs` entry, filling names still unbound,
//! 4. a key with the parameter's name in a direct predecessor's output,
//! 5. with exactly one predecessor and exactly one unbound parameter, the
//!    predecessor's `"result"` value.
//!
//! Declaring the sentinel parameter [`CONTEXT_PARAM`] requests a
//! [`CallContext`] carrying the task, the predecessor outputs and the
//! manager-wide shared context instead of a bound value.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use flowline_task::{route_params, TaskData, ARGS_KEY, KWARGS_KEY};

use crate::context::JobContext;
use crate::job::{Job, JobError};

/// Sentinel parameter name that requests context injection.
pub const CONTEXT_PARAM: &str = "j_ctx";

type BoxedFn = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, Result<Value, JobError>> + Send + Sync>;

/// Context handed to a wrapped function that declared [`CONTEXT_PARAM`].
#[derive(Debug, Clone)]
pub struct CallContext {
  /// The task payload, unchanged.
  pub task: TaskData,
  /// Direct predecessor outputs keyed by short name.
  pub inputs: std::collections::HashMap<String, TaskData>,
  /// The manager-wide shared context.
  pub global: TaskData,
}

/// Bound arguments for one invocation of a wrapped function.
#[derive(Debug, Clone)]
pub struct CallArgs {
  values: TaskData,
  ctx: Option<CallContext>,
}

impl CallArgs {
  /// The bound value for a declared parameter.
  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.get(name)
  }

  /// The bound value for a declared parameter, deserialised.
  pub fn arg<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, JobError> {
    let value = self
      .values
      .get(name)
      .ok_or_else(|| JobError::param_bind(format!("parameter '{name}' is not bound")))?;
    serde_json::from_value(value.clone())
      .map_err(|e| JobError::param_bind(format!("parameter '{name}': {e}")))
  }

  /// The injected context; present iff the function declared the sentinel.
  pub fn ctx(&self) -> Option<&CallContext> {
    self.ctx.as_ref()
  }
}

/// A job behaviour wrapping a plain function.
pub struct FnJob {
  params: Vec<String>,
  ctx_param: String,
  func: BoxedFn,
}

impl FnJob {
  /// Wrap a synchronous function.
  pub fn new<F>(params: &[&str], f: F) -> Self
  where
    F: Fn(CallArgs) -> Result<Value, JobError> + Send + Sync + 'static,
  {
    Self {
      params: params.iter().map(|p| p.to_string()).collect(),
      ctx_param: CONTEXT_PARAM.to_string(),
      func: Arc::new(move |args| futures::future::ready(f(args)).boxed()),
    }
  }

  /// Wrap an asynchronous function.
  pub fn new_async<F, Fut>(params: &[&str], f: F) -> Self
  where
    F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, JobError>> + Send + 'static,
  {
    Self {
      params: params.iter().map(|p| p.to_string()).collect(),
      ctx_param: CONTEXT_PARAM.to_string(),
      func: Arc::new(move |args| f(args).boxed()),
    }
  }

  /// Use a different sentinel name for context injection.
  pub fn with_context_param(mut self, name: impl Into<String>) -> Self {
    self.ctx_param = name.into();
    self
  }

  /// Declared parameter names, the context sentinel excluded.
  fn declared(&self) -> Vec<&str> {
    self
      .params
      .iter()
      .map(String::as_str)
      .filter(|p| *p != self.ctx_param)
      .collect()
  }

  fn wants_ctx(&self) -> bool {
    self.params.iter().any(|p| *p == self.ctx_param)
  }

  fn bind(&self, own: &TaskData, ctx: &JobContext) -> Result<CallArgs, JobError> {
    let declared = self.declared();
    let mut values = TaskData::new();

    // 1. Positional `args` take the declared slots in order.
    match own.get(ARGS_KEY) {
      Some(Value::Array(items)) => {
        for (i, item) in items.iter().enumerate() {
          let Some(name) = declared.get(i) else {
            return Err(JobError::param_bind(format!(
              "'{}' takes {} positional argument(s), got {}",
              ctx.short_name(),
              declared.len(),
              items.len()
            )));
          };
          values.insert(name.to_string(), item.clone());
        }
      }
      Some(other) => {
        return Err(JobError::param_bind(format!(
          "'{ARGS_KEY}' for '{}' must be an array, got {other}",
          ctx.short_name()
        )));
      }
      None => {}
    }

    // 2. Named parameters routed at this job.
    for (key, value) in own {
      if key == ARGS_KEY || key == KWARGS_KEY {
        continue;
      }
      if !declared.contains(&key.as_str()) {
        return Err(JobError::param_bind(format!(
          "unexpected parameter '{key}' for '{}'",
          ctx.short_name()
        )));
      }
      if values.contains_key(key) {
        return Err(JobError::param_bind(format!(
          "multiple values for parameter '{key}' of '{}'",
          ctx.short_name()
        )));
      }
      values.insert(key.clone(), value.clone());
    }

    // 3. `kwargs` merged last: they fill names still unbound.
    match own.get(KWARGS_KEY) {
      Some(Value::Object(kwargs)) => {
        for (key, value) in kwargs {
          if !declared.contains(&key.as_str()) {
            return Err(JobError::param_bind(format!(
              "unexpected keyword argument '{key}' for '{}'",
              ctx.short_name()
            )));
          }
          values.entry(key.clone()).or_insert_with(|| value.clone());
        }
      }
      Some(other) => {
        return Err(JobError::param_bind(format!(
          "'{KWARGS_KEY}' for '{}' must be an object, got {other}",
          ctx.short_name()
        )));
      }
      None => {}
    }

    // 4. Unbound names fall back to predecessor outputs, by key.
    let mut predecessors: Vec<&str> = ctx.inputs().keys().map(String::as_str).collect();
    predecessors.sort_unstable();
    for name in &declared {
      if values.contains_key(*name) {
        continue;
      }
      for pred in &predecessors {
        if let Some(value) = ctx.inputs()[*pred].get(*name) {
          values.insert(name.to_string(), value.clone());
          break;
        }
      }
    }

    // 5. A single predecessor's `"result"` fills a single remaining slot.
    let unbound: Vec<&str> = declared
      .iter()
      .copied()
      .filter(|name| !values.contains_key(*name))
      .collect();
    if unbound.len() == 1 && ctx.inputs().len() == 1 {
      let only = ctx.inputs().values().next().unwrap();
      if let Some(result) = only.get("result") {
        values.insert(unbound[0].to_string(), result.clone());
      }
    }

    let unbound: Vec<&str> = declared
      .iter()
      .copied()
      .filter(|name| !values.contains_key(*name))
      .collect();
    if !unbound.is_empty() {
      return Err(JobError::param_bind(format!(
        "no value for parameter(s) {} of '{}'",
        unbound.join(", "),
        ctx.short_name()
      )));
    }

    let call_ctx = self.wants_ctx().then(|| CallContext {
      task: ctx.task().data().clone(),
      inputs: ctx.inputs().clone(),
      global: ctx.global().clone(),
    });

    Ok(CallArgs {
      values,
      ctx: call_ctx,
    })
  }
}

#[async_trait]
impl Job for FnJob {
  async fn run(&self, ctx: &JobContext) -> Result<Value, JobError> {
    let routed = route_params(ctx.task().data());
    let own = routed.get(ctx.short_name()).cloned().unwrap_or_default();
    let call = self.bind(&own, ctx)?;
    let value = (self.func)(call).await?;

    // A wrapped callable always yields a mapping.
    Ok(match value {
      mapping @ Value::Object(_) => mapping,
      other => {
        let mut wrapped = TaskData::new();
        wrapped.insert("result".to_string(), other);
        Value::Object(wrapped)
      }
    })
  }
}
