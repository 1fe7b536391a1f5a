//! End-to-end manager scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use flowline_dsl::{func, func_async, Dsl};
use flowline_manager::{ErrorKind, FlowManager, ManagerConfig, ManagerError, Task};
use flowline_task::TaskData;

fn square_then_double() -> Dsl {
  let square = func("square", &["x"], |call| {
    let x: i64 = call.arg("x")?;
    Ok(json!(x * x))
  });
  let double = func("double", &["input_val"], |call| {
    let v: i64 = call.arg("input_val")?;
    Ok(json!(v * 2))
  });
  square >> double
}

/// A >> B where B fails whenever the task carries an `"explode"` key.
fn fragile_pipeline() -> Dsl {
  let a = func("a", &[], |_| Ok(json!({"stage": "a"})));
  let b = func("b", &["j_ctx"], |call| {
    let ctx = call.ctx().unwrap();
    if ctx.task.contains_key("explode") {
      return Err(flowline_job::JobError::failed("asked to explode"));
    }
    Ok(json!({"stage": "b"}))
  });
  a >> b
}

fn slow_pipeline(delay: Duration) -> Dsl {
  func_async("slow", &[], move |_| async move {
    tokio::time::sleep(delay).await;
    Ok(json!({"done": true}))
  })
}

#[tokio::test]
async fn execute_runs_a_linear_pipeline() {
  let manager = FlowManager::new();
  let envelope = manager
    .execute(
      Task::from_json(json!({"square.x": 5})),
      &square_then_double(),
      "pipeline",
      Duration::from_secs(10),
    )
    .await
    .unwrap();

  assert_eq!(envelope.result(), Some(&json!(50)));
  assert_eq!(envelope.return_job, "pipeline$$$$double$$");
  assert_eq!(envelope.task.data(), json!({"square.x": 5}).as_object().unwrap());
  assert!(envelope.saved_results.is_empty());
}

#[tokio::test]
async fn fan_out_fan_in_through_the_manager() {
  let gen = func("gen", &["start", "count"], |call| {
    let start: i64 = call.arg("start")?;
    let count: i64 = call.arg("count")?;
    Ok(json!({"numbers": (start..start + count).collect::<Vec<_>>()}))
  })
  .save_result();
  let sq = func("sq", &["numbers"], |call| {
    let numbers: Vec<i64> = call.arg("numbers")?;
    Ok(json!({"squared": numbers.iter().map(|n| n * n).collect::<Vec<_>>()}))
  });
  let dbl = func("dbl", &["numbers"], |call| {
    let numbers: Vec<i64> = call.arg("numbers")?;
    Ok(json!({"doubled": numbers.iter().map(|n| n * 2).collect::<Vec<_>>()}))
  });
  let agg = func("agg", &["j_ctx"], |call| {
    let ctx = call.ctx().unwrap();
    let mut merged = TaskData::new();
    for output in ctx.inputs.values() {
      for (key, value) in output {
        merged.insert(key.clone(), value.clone());
      }
    }
    Ok(Value::Object(merged))
  });

  let manager = FlowManager::new();
  let envelope = manager
    .execute(
      Task::from_json(json!({"gen.start": 1, "gen.count": 3})),
      &(gen >> (sq | dbl) >> agg),
      "numbers",
      Duration::from_secs(10),
    )
    .await
    .unwrap();

  assert_eq!(envelope.get("squared"), Some(&json!([1, 4, 9])));
  assert_eq!(envelope.get("doubled"), Some(&json!([2, 4, 6])));
  assert_eq!(envelope.saved_results["gen"], json!({"numbers": [1, 2, 3]}));
}

#[tokio::test]
async fn colliding_registrations_get_suffixed_variants() {
  let manager = FlowManager::new();

  let fqn_x = manager
    .add_graph(&square_then_double(), "g", "v")
    .unwrap();
  let fqn_y = manager.add_graph(&fragile_pipeline(), "g", "v").unwrap();

  assert_eq!(fqn_x, "g$$v$$square$$");
  assert_eq!(fqn_y, "g$$v_1$$a$$");

  // Both registrations stay independently submittable.
  manager
    .submit_to(&fqn_x, Task::from_json(json!({"square.x": 2})))
    .await
    .unwrap();
  manager
    .submit_to(&fqn_y, Task::from_json(json!({})))
    .await
    .unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  let results = manager.pop_results();
  assert!(results.errors.is_empty());
  assert_eq!(results.completed[&fqn_x].len(), 1);
  assert_eq!(results.completed[&fqn_y].len(), 1);
}

#[tokio::test]
async fn re_registering_the_same_composition_is_idempotent() {
  let manager = FlowManager::new();
  let dsl = square_then_double();

  let first = manager.add_graph(&dsl, "g", "v").unwrap();
  let second = manager.add_graph(&dsl, "g", "v").unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn input_timeout_is_recorded_for_the_gated_job() {
  let slow = func_async("slow", &[], |_| async {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(json!({}))
  });
  let gated = func("gated", &[], |_| Ok(json!({}))).timeout(Duration::from_millis(50));

  let manager = FlowManager::new();
  let fqn = manager.add_graph(&(slow >> gated), "g", "").unwrap();
  manager
    .submit_to(&fqn, Task::from_json(json!({})))
    .await
    .unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  let results = manager.pop_results();
  assert!(results.completed.is_empty());
  assert_eq!(results.errors.len(), 1);
  assert_eq!(results.errors[0].kind, ErrorKind::InputTimeout);
  assert_eq!(results.errors[0].job_fqn.as_deref(), Some("g$$$$gated$$"));

  let counts = manager.get_counts();
  assert_eq!(counts.submitted, 1);
  assert_eq!(counts.completed, 0);
  assert_eq!(counts.errors, 1);
}

#[tokio::test]
async fn one_failing_task_does_not_disturb_another() {
  let manager = FlowManager::new();
  let fqn = manager.add_graph(&fragile_pipeline(), "frail", "").unwrap();

  let failing = Task::from_json(json!({"explode": true}));
  let failing_id = failing.id().to_string();
  let succeeding = Task::from_json(json!({}));

  manager.submit_to(&fqn, failing).await.unwrap();
  manager.submit_to(&fqn, succeeding).await.unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  let counts = manager.get_counts();
  assert_eq!(counts.submitted, 2);
  assert_eq!(counts.completed, 1);
  assert_eq!(counts.errors, 1);

  let results = manager.pop_results();
  assert_eq!(results.completed[&fqn].len(), 1);
  assert_eq!(results.completed[&fqn][0].get("stage"), Some(&json!("b")));
  assert_eq!(results.errors.len(), 1);
  assert_eq!(results.errors[0].kind, ErrorKind::RunError);
  assert_eq!(results.errors[0].task_id, failing_id);
  assert_eq!(results.errors[0].cause.as_deref(), Some("asked to explode"));
}

#[tokio::test]
async fn pop_results_drains_but_counters_stay() {
  let manager = FlowManager::new();
  let fqn = manager.add_graph(&square_then_double(), "g", "").unwrap();
  manager
    .submit_to(&fqn, Task::from_json(json!({"square.x": 3})))
    .await
    .unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  let first = manager.pop_results();
  assert_eq!(first.completed[&fqn].len(), 1);
  assert_eq!(first.result_value("g"), Some(&json!(18)));

  let second = manager.pop_results();
  assert!(second.is_empty());

  let counts = manager.get_counts();
  assert_eq!(counts.submitted, 1);
  assert_eq!(counts.completed, 1);
}

#[tokio::test]
async fn wait_for_completion_times_out_then_succeeds() {
  let manager = FlowManager::new();
  let fqn = manager
    .add_graph(&slow_pipeline(Duration::from_millis(300)), "slow", "")
    .unwrap();
  manager
    .submit_to(&fqn, Task::from_json(json!({})))
    .await
    .unwrap();

  assert!(!manager.wait_for_completion(Duration::from_millis(20)).await);
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn submitting_against_an_unknown_fqn_fails() {
  let manager = FlowManager::new();
  manager.add_graph(&square_then_double(), "g", "").unwrap();

  let err = manager
    .submit_to("nope$$$$x$$", Task::from_json(json!({})))
    .await
    .unwrap_err();
  assert!(matches!(err, ManagerError::UnknownGraph { fqn } if fqn == "nope$$$$x$$"));
}

#[tokio::test]
async fn submit_without_fqn_requires_exactly_one_graph() {
  let manager = FlowManager::new();

  let err = manager.submit(Task::from_json(json!({}))).await.unwrap_err();
  assert!(matches!(err, ManagerError::NoGraphs));

  let fqn = manager.add_graph(&square_then_double(), "g", "").unwrap();
  manager
    .submit(Task::from_json(json!({"square.x": 4})))
    .await
    .unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);
  assert_eq!(manager.pop_results().completed[&fqn].len(), 1);

  manager.add_graph(&fragile_pipeline(), "other", "").unwrap();
  let err = manager.submit(Task::from_json(json!({}))).await.unwrap_err();
  assert!(matches!(err, ManagerError::AmbiguousGraph));
}

#[tokio::test]
async fn compile_failures_are_raised_not_buffered() {
  let manager = FlowManager::new();
  let leaf = func("a", &[], |_| Ok(json!({})));
  let err = manager
    .add_graph(&flowline_dsl::sequence([leaf.clone(), leaf]), "g", "")
    .unwrap_err();
  assert_eq!(err.kind(), Some(ErrorKind::CompileError));
  assert!(manager.pop_results().is_empty());
}

#[tokio::test]
async fn on_complete_fires_per_envelope_but_not_for_cancellations() {
  let invocations = Arc::new(AtomicUsize::new(0));
  let seen = invocations.clone();
  let manager = FlowManager::with_config(
    ManagerConfig::default().with_on_complete(move |envelope| {
      assert!(envelope.get("done").is_some());
      seen.fetch_add(1, Ordering::SeqCst);
    }),
  );

  let fqn = manager
    .add_graph(&slow_pipeline(Duration::from_millis(200)), "cb", "")
    .unwrap();
  manager
    .submit_to(&fqn, Task::from_json(json!({})))
    .await
    .unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);
  assert_eq!(invocations.load(Ordering::SeqCst), 1);

  // A cancelled task records an error and skips the callback.
  manager
    .submit_to(&fqn, Task::from_json(json!({})))
    .await
    .unwrap();
  manager.cancel_all();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  let results = manager.pop_results();
  assert_eq!(results.errors.len(), 1);
  assert_eq!(results.errors[0].kind, ErrorKind::Cancelled);
  assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submissions_after_cancel_all_still_run() {
  let manager = FlowManager::new();
  let fqn = manager
    .add_graph(&slow_pipeline(Duration::from_millis(10)), "g", "")
    .unwrap();

  manager.cancel_all();
  manager
    .submit_to(&fqn, Task::from_json(json!({})))
    .await
    .unwrap();
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  let results = manager.pop_results();
  assert!(results.errors.is_empty());
  assert_eq!(results.completed[&fqn].len(), 1);
}

#[tokio::test]
async fn max_concurrent_tasks_bounds_in_flight_executions() {
  let current = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let current_in_job = current.clone();
  let peak_in_job = peak.clone();

  let probe = func_async("probe", &[], move |_| {
    let current = current_in_job.clone();
    let peak = peak_in_job.clone();
    async move {
      let now = current.fetch_add(1, Ordering::SeqCst) + 1;
      peak.fetch_max(now, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(30)).await;
      current.fetch_sub(1, Ordering::SeqCst);
      Ok(json!({}))
    }
  });

  let manager =
    FlowManager::with_config(ManagerConfig::default().with_max_concurrent_tasks(1));
  let fqn = manager.add_graph(&probe, "bounded", "").unwrap();

  for _ in 0..3 {
    manager
      .submit_to(&fqn, Task::from_json(json!({})))
      .await
      .unwrap();
  }
  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);

  assert_eq!(peak.load(Ordering::SeqCst), 1);
  assert_eq!(manager.get_counts().completed, 3);
}

#[tokio::test]
async fn shared_context_reaches_jobs() {
  let reader = func("reader", &["j_ctx"], |call| {
    let ctx = call.ctx().unwrap();
    Ok(json!({"tenant": ctx.global["tenant"]}))
  });

  let manager = FlowManager::new();
  let mut global = TaskData::new();
  global.insert("tenant".to_string(), json!("acme"));
  manager.set_global(global);

  let envelope = manager
    .execute(
      Task::from_json(json!({})),
      &reader,
      "ctx",
      Duration::from_secs(5),
    )
    .await
    .unwrap();
  assert_eq!(envelope.get("tenant"), Some(&json!("acme")));
}

#[tokio::test]
async fn execute_surfaces_recorded_errors() {
  let manager = FlowManager::new();
  let err = manager
    .execute(
      Task::from_json(json!({"explode": true})),
      &fragile_pipeline(),
      "frail",
      Duration::from_secs(5),
    )
    .await
    .unwrap_err();

  match err {
    ManagerError::TaskErrors { errors } => {
      assert_eq!(errors.len(), 1);
      assert_eq!(errors[0].kind, ErrorKind::RunError);
    }
    other => panic!("expected TaskErrors, got {other:?}"),
  }
}

#[tokio::test]
async fn run_once_is_a_one_shot_convenience() {
  let envelope = FlowManager::run_once(
    &square_then_double(),
    Task::from_json(json!({"square.x": 6})),
    "oneshot",
  )
  .await
  .unwrap();
  assert_eq!(envelope.result(), Some(&json!(72)));
}

#[tokio::test]
async fn submit_all_accepts_a_batch() {
  let manager = FlowManager::new();
  let fqn = manager.add_graph(&square_then_double(), "batch", "").unwrap();

  let tasks: Vec<Task> = (1..=3)
    .map(|x| Task::from_json(json!({"square.x": x})))
    .collect();
  let ids = manager.submit_all(&fqn, tasks).await.unwrap();
  assert_eq!(ids.len(), 3);

  assert!(manager.wait_for_completion(Duration::from_secs(5)).await);
  let results = manager.pop_results();
  assert_eq!(results.completed[&fqn].len(), 3);

  let mut values: Vec<i64> = results.completed[&fqn]
    .iter()
    .map(|envelope| envelope.result().unwrap().as_i64().unwrap())
    .collect();
  values.sort_unstable();
  // x*x*2 for x in 1..=3
  assert_eq!(values, [2, 8, 18]);
}
