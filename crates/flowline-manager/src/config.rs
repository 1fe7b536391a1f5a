use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use flowline_engine::DEFAULT_INPUT_TIMEOUT;
use flowline_task::Envelope;

/// Callback invoked with every completed envelope.
///
/// Runs on the completing task; the manager does not catch panics raised
/// here. Callbacks guard themselves.
pub type OnComplete = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Configuration for a [`FlowManager`](crate::FlowManager).
#[derive(Clone, Default)]
pub struct ManagerConfig {
  /// Bound on in-flight tasks; submission waits for a slot when saturated.
  /// Unbounded when absent.
  pub max_concurrent_tasks: Option<usize>,

  /// Input-wait deadline applied to jobs without their own timeout.
  /// `None` uses the engine default.
  pub default_job_input_timeout: Option<Duration>,

  /// Callback invoked per completed envelope. Not invoked for cancelled
  /// tasks.
  pub on_complete: Option<OnComplete>,
}

impl ManagerConfig {
  pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
    self.max_concurrent_tasks = Some(limit);
    self
  }

  pub fn with_default_job_input_timeout(mut self, timeout: Duration) -> Self {
    self.default_job_input_timeout = Some(timeout);
    self
  }

  pub fn with_on_complete(mut self, callback: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
    self.on_complete = Some(Arc::new(callback));
    self
  }

  /// The effective per-job input timeout.
  pub(crate) fn input_timeout(&self) -> Duration {
    self.default_job_input_timeout.unwrap_or(DEFAULT_INPUT_TIMEOUT)
  }
}

impl fmt::Debug for ManagerConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManagerConfig")
      .field("max_concurrent_tasks", &self.max_concurrent_tasks)
      .field("default_job_input_timeout", &self.default_job_input_timeout)
      .field("on_complete", &self.on_complete.as_ref().map(|_| "..."))
      .finish()
  }
}
