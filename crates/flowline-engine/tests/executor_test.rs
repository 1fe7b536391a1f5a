//! Engine scenario tests over compiled compositions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use flowline_dsl::{compile, func, func_async, job, parallel, Dsl};
use flowline_engine::{execute_task, EngineError, DEFAULT_INPUT_TIMEOUT};
use flowline_job::{Job, JobContext, JobError, RegisteredWorkflow};
use flowline_task::{Envelope, Task, TaskData};

fn register(dsl: &Dsl, graph_name: &str) -> Arc<RegisteredWorkflow> {
  let workflow = compile(dsl).expect("composition should compile");
  Arc::new(
    RegisteredWorkflow::register(workflow, graph_name, "").expect("workflow should register"),
  )
}

async fn run(dsl: &Dsl, task: Task) -> Result<Envelope, EngineError> {
  execute_task(
    register(dsl, "test"),
    task,
    Arc::new(TaskData::new()),
    DEFAULT_INPUT_TIMEOUT,
    &CancellationToken::new(),
  )
  .await
}

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

struct ScalarJob;

#[async_trait]
impl Job for ScalarJob {
  async fn run(&self, _ctx: &JobContext) -> Result<Value, JobError> {
    Ok(json!(5))
  }
}

struct FailingJob;

#[async_trait]
impl Job for FailingJob {
  async fn run(&self, _ctx: &JobContext) -> Result<Value, JobError> {
    Err(JobError::failed("boom"))
  }
}

#[tokio::test]
async fn linear_pipeline_of_wrapped_callables() {
  let task = Task::from_json(json!({"square.x": 5}));
  let original = task.data().clone();

  let envelope = run(&square_then_double(), task).await.unwrap();

  assert_eq!(envelope.result(), Some(&json!(50)));
  assert_eq!(envelope.return_job, "test$$$$double$$");
  assert_eq!(envelope.task.data(), &original);
  assert!(envelope.saved_results.is_empty());
}

#[tokio::test]
async fn fan_out_fan_in_with_saved_results() {
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

  let dsl = gen >> (sq | dbl) >> agg;
  let task = Task::from_json(json!({"gen.start": 1, "gen.count": 3}));
  let envelope = run(&dsl, task).await.unwrap();

  assert_eq!(envelope.get("squared"), Some(&json!([1, 4, 9])));
  assert_eq!(envelope.get("doubled"), Some(&json!([2, 4, 6])));
  assert_eq!(envelope.saved_results["gen"], json!({"numbers": [1, 2, 3]}));
  assert_eq!(envelope.saved_results.len(), 1);
}

#[tokio::test]
async fn synthetic_head_feeds_every_branch_the_task() {
  fn branch(name: &str) -> Dsl {
    func(name, &["j_ctx"], |call| {
      let ctx = call.ctx().unwrap();
      Ok(json!({"seen": ctx.inputs["__head__"]["x"]}))
    })
  }
  let transformer = func("transformer", &["j_ctx"], |call| {
    let ctx = call.ctx().unwrap();
    for output in ctx.inputs.values() {
      assert_eq!(output["seen"], json!(42));
    }
    Ok(json!({"branches": ctx.inputs.len()}))
  });

  let dsl = parallel([branch("a"), branch("b"), branch("c")]) >> transformer;
  let registered = register(&dsl, "multi");
  // The graph handle points at the synthetic head.
  assert_eq!(registered.fqn(), "multi$$$$__head__$$");

  let envelope = execute_task(
    registered,
    Task::from_json(json!({"x": 42})),
    Arc::new(TaskData::new()),
    DEFAULT_INPUT_TIMEOUT,
    &CancellationToken::new(),
  )
  .await
  .unwrap();

  assert_eq!(envelope.get("branches"), Some(&json!(3)));
  assert_eq!(envelope.return_job, "multi$$$$transformer$$");
}

#[tokio::test]
async fn input_timeout_names_the_gated_job() {
  let slow = func_async("slow", &[], |_| async {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(json!({}))
  });
  let gated = func("gated", &[], |_| Ok(json!({}))).timeout(Duration::from_millis(50));

  let err = run(&(slow >> gated), Task::from_json(json!({})))
    .await
    .unwrap_err();

  match err {
    EngineError::InputTimeout {
      job_fqn,
      expected,
      received,
    } => {
      assert_eq!(job_fqn, "test$$$$gated$$");
      assert_eq!(expected, ["slow"]);
      assert!(received.is_empty());
    }
    other => panic!("expected InputTimeout, got {other:?}"),
  }
}

#[tokio::test]
async fn user_error_terminates_the_task() {
  let head = func("head", &[], |_| Ok(json!({"n": 1})));
  let err = run(&(head >> job("bad", FailingJob)), Task::from_json(json!({})))
    .await
    .unwrap_err();

  match err {
    EngineError::Run { job_fqn, message } => {
      assert_eq!(job_fqn, "test$$$$bad$$");
      assert!(message.contains("boom"));
    }
    other => panic!("expected Run, got {other:?}"),
  }
}

#[tokio::test]
async fn non_mapping_from_non_tail_is_an_error() {
  let dsl = job("scalar", ScalarJob) >> func("sink", &[], |_| Ok(json!({})));
  let err = run(&dsl, Task::from_json(json!({}))).await.unwrap_err();

  assert!(matches!(
    err,
    EngineError::NonMappingOutput { job_fqn } if job_fqn == "test$$$$scalar$$"
  ));
}

#[tokio::test]
async fn non_mapping_tail_is_wrapped() {
  let head = func("head", &[], |_| Ok(json!({"n": 1})));
  let envelope = run(&(head >> job("scalar", ScalarJob)), Task::from_json(json!({})))
    .await
    .unwrap();
  assert_eq!(envelope.result(), Some(&json!(5)));
}

#[tokio::test]
async fn pre_cancelled_token_cancels_the_execution() {
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = execute_task(
    register(&square_then_double(), "test"),
    Task::from_json(json!({"square.x": 2})),
    Arc::new(TaskData::new()),
    DEFAULT_INPUT_TIMEOUT,
    &cancel,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, EngineError::Cancelled));
}

#[tokio::test]
async fn predecessor_completes_before_successor_runs() {
  let order = Arc::new(Mutex::new(Vec::new()));
  let first = order.clone();
  let second = order.clone();

  let a = func("a", &[], move |_| {
    first.lock().unwrap().push("a");
    Ok(json!({"done": true}))
  });
  let b = func("b", &["j_ctx"], move |call| {
    let ctx = call.ctx().unwrap();
    // A's output is observable here before B's user code runs.
    assert_eq!(ctx.inputs["a"]["done"], json!(true));
    second.lock().unwrap().push("b");
    Ok(json!({}))
  });

  run(&(a >> b), Task::from_json(json!({}))).await.unwrap();
  assert_eq!(*order.lock().unwrap(), ["a", "b"]);
}

#[tokio::test]
async fn saved_results_contain_exactly_the_opted_in_jobs() {
  let a = func("a", &[], |_| Ok(json!({"step": "a"}))).save_result();
  let b = func("b", &[], |_| Ok(json!({"step": "b"})));
  let c = func("c", &[], |_| Ok(json!({"step": "c"}))).save_result();

  let envelope = run(&(a >> b >> c), Task::from_json(json!({})))
    .await
    .unwrap();

  let mut saved: Vec<&str> = envelope.saved_results.keys().map(String::as_str).collect();
  saved.sort_unstable();
  assert_eq!(saved, ["a", "c"]);
}

#[tokio::test]
async fn shared_global_context_is_visible_to_jobs() {
  let mut global = TaskData::new();
  global.insert("tenant".to_string(), json!("acme"));

  let head = func("head", &["j_ctx"], |call| {
    let ctx = call.ctx().unwrap();
    Ok(json!({"tenant": ctx.global["tenant"]}))
  });

  let envelope = execute_task(
    register(&head, "ctx"),
    Task::from_json(json!({})),
    Arc::new(global),
    DEFAULT_INPUT_TIMEOUT,
    &CancellationToken::new(),
  )
  .await
  .unwrap();

  assert_eq!(envelope.get("tenant"), Some(&json!("acme")));
}
