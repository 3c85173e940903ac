// tests/runtime_fake_executor.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::{init_tracing, with_timeout};

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use rebundle::config::ConfigFile;
use rebundle::dag::{RunReport, Scheduler};
use rebundle::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use rebundle::types::{RunMode, TaskId};
use rebundle_test_utils::fake_executor::FakeExecutor;

/// lint -> browserify -> build, with an unrelated `vendor` task.
fn build_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::command("eslint static/js").build())
        .with_task("browserify", TaskConfigBuilder::group().after("lint").build())
        .with_task("vendor", TaskConfigBuilder::group().build())
        .with_task("build", TaskConfigBuilder::group().after("browserify").build())
        .build()
}

fn ids(executed: &Arc<Mutex<Vec<TaskId>>>) -> Vec<String> {
    executed.lock().unwrap().iter().map(|t| t.to_string()).collect()
}

async fn run(
    cfg: &ConfigFile,
    target: &str,
    mode: RunMode,
    failing: Option<&str>,
) -> (RunReport, Vec<String>, mpsc::Sender<RuntimeEvent>) {
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let mut executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));
    if let Some(task) = failing {
        executor = executor.failing(task);
    }

    let scheduler =
        Scheduler::new(cfg.graph().clone(), TaskId::new(target), mode.failure_policy()).unwrap();
    let core = CoreRuntime::new(scheduler, RuntimeOptions { mode });
    let report = Runtime::new(core, rx, executor).run().await.unwrap();
    (report, ids(&executed), tx)
}

#[tokio::test]
async fn once_mode_runs_the_target_closure_and_exits() {
    init_tracing();
    let cfg = build_config();
    let (report, executed, _tx) = with_timeout(run(&cfg, "build", RunMode::Once, None)).await;

    assert_eq!(executed, vec!["lint", "browserify", "build"]);
    assert!(report.is_success(), "{report}");
}

#[tokio::test]
async fn strict_failure_skips_dependents() {
    init_tracing();
    let cfg = build_config();
    let (report, executed, _tx) =
        with_timeout(run(&cfg, "build", RunMode::Once, Some("lint"))).await;

    assert_eq!(executed, vec!["lint"]);
    assert!(!report.is_success());
    let skipped: Vec<&str> = report.skipped.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(skipped, vec!["browserify", "build"]);
}

#[tokio::test]
async fn watch_mode_keeps_running_until_shutdown() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::command("eslint static/js").build())
        .with_task("browserify", TaskConfigBuilder::group().after("lint").build())
        .with_task("default", TaskConfigBuilder::group().after("browserify").build())
        .build();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed)).failing("lint");
    let scheduler = Scheduler::new(
        cfg.graph().clone(),
        TaskId::new("default"),
        RunMode::Watch.failure_policy(),
    )
    .unwrap();
    let core = CoreRuntime::new(
        scheduler,
        RuntimeOptions {
            mode: RunMode::Watch,
        },
    );
    let handle = tokio::spawn(Runtime::new(core, rx, executor).run());

    // Everything ran despite the lint failure, and the runtime is still up.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(ids(&executed), vec!["lint", "browserify", "default"]);
    assert!(!handle.is_finished());

    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    let report = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.fatal.is_none());
}

#[tokio::test]
async fn fatal_event_stops_watch_mode() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task("default", TaskConfigBuilder::group().build())
        .build();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));
    let scheduler = Scheduler::new(
        cfg.graph().clone(),
        TaskId::new("default"),
        RunMode::Watch.failure_policy(),
    )
    .unwrap();
    let core = CoreRuntime::new(
        scheduler,
        RuntimeOptions {
            mode: RunMode::Watch,
        },
    );
    let handle = tokio::spawn(Runtime::new(core, rx, executor).run());

    tx.send(RuntimeEvent::Fatal {
        message: "failed to write build/js/a.js: read-only file system".into(),
    })
    .await
    .unwrap();

    let report = with_timeout(handle).await.unwrap().unwrap();
    assert!(report.fatal.as_deref().is_some_and(|m| m.contains("build/js/a.js")));
    assert!(!report.is_success());
}

#[tokio::test]
async fn fatal_task_failure_stops_watch_mode() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task("browserify", TaskConfigBuilder::group().build())
        .with_task("default", TaskConfigBuilder::group().after("browserify").build())
        .build();

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed))
        .failing("browserify")
        .fatal_failures();
    let scheduler = Scheduler::new(
        cfg.graph().clone(),
        TaskId::new("default"),
        RunMode::Watch.failure_policy(),
    )
    .unwrap();
    let core = CoreRuntime::new(
        scheduler,
        RuntimeOptions {
            mode: RunMode::Watch,
        },
    );

    let report = with_timeout(Runtime::new(core, rx, executor).run()).await.unwrap();
    assert!(report.fatal.is_some());
    assert_eq!(ids(&executed), vec!["browserify"]);
}
