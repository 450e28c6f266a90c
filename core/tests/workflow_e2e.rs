mod common;

use std::sync::Arc;

use common::{complete, echo_body, fast_limiter, store_with};
use folio_core::api::{
    task_body_fn, ExecutorError, FileBackend, FlagInjector, FlagStatus, GuardConfig, GuardError, Issue,
    IssueCategory, ParallelExecutor, Severity, Task, TaskContext, TaskFailure, TaskGraph,
    StateBackend, TaskKind, TaskStatus, TaskStore, WorkflowContext, AppConfig,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn issue() -> Issue {
    Issue::new(
        IssueCategory::Foreshadowing,
        "the locket from chapter 15 must appear in chapter 1",
        Severity::High,
    )
}

fn analyze_items(n: u32) -> Vec<Task> {
    (1..=n).map(|i| Task::new(TaskKind::Analyze, i)).collect()
}

#[tokio::test]
async fn three_item_scenario_runs_in_three_waves() {
    let store = store_with(vec![
        Task::new(TaskKind::Analyze, 1),
        Task::new(TaskKind::Analyze, 2),
        Task::new(TaskKind::Analyze, 3),
        Task::new(TaskKind::Expand, 4).depends_on("analyze_1"),
        Task::new(TaskKind::Polish, 5).depends_on("expand_4"),
    ]);

    let plan = TaskGraph::from_tasks(&store.tasks()).resolve().unwrap();
    assert_eq!(
        plan.waves,
        vec![
            vec!["analyze_1", "analyze_2", "analyze_3"],
            vec!["expand_4"],
            vec!["polish_5"],
        ]
    );

    let executor = ParallelExecutor::new(store.clone(), fast_limiter());
    let report = executor.execute_workflow(echo_body(), "default").await.unwrap();

    assert_eq!(report.waves, plan.waves);
    assert_eq!(report.results["polish_5"], json!({ "task": "polish_5" }));
    assert_eq!(store.completed_count(), 5);
}

#[test]
fn fix_task_waits_for_discovering_analysis() {
    let store = store_with(analyze_items(15));
    let injector = FlagInjector::new(store.clone()).with_item_count(15);

    let flag = injector.add_flag(15, 1, issue()).unwrap();
    assert_eq!(flag.fix_task_id, "fix_1_1");

    let fix = store.get_task("fix_1_1").unwrap();
    assert_eq!(fix.item, 1);
    assert_eq!(fix.dependencies, vec!["analyze_15"]);
    assert_eq!(store.len(), 16);

    // Not ready while analyze_15 is outstanding
    let ready: Vec<String> = store.ready_tasks().into_iter().map(|t| t.id).collect();
    assert!(!ready.contains(&"fix_1_1".to_string()));
    let plan = TaskGraph::from_tasks(&store.tasks()).resolve().unwrap();
    assert_eq!(plan.wave_of("fix_1_1"), Some(2));

    complete(&store, "analyze_15");

    let ready: Vec<String> = store.ready_tasks().into_iter().map(|t| t.id).collect();
    assert!(ready.contains(&"fix_1_1".to_string()));
}

#[tokio::test]
async fn flag_raised_mid_wave_is_scheduled_next() {
    let store = store_with(analyze_items(15));
    let injector = Arc::new(FlagInjector::new(store.clone()).with_item_count(15));
    let executor = ParallelExecutor::builder(store.clone())
        .injector(injector.clone())
        .limiter(fast_limiter())
        .build();

    let body = task_body_fn(|task: Task, ctx: TaskContext| async move {
        if task.id == "analyze_15" {
            ctx.raise_flag(15, 1, issue())?;
        }
        Ok::<_, TaskFailure>(json!(task.id))
    });

    let report = executor.execute_workflow(body, "default").await.unwrap();

    assert_eq!(report.waves.len(), 2);
    assert_eq!(report.waves[0].len(), 15);
    assert_eq!(report.waves[1], vec!["fix_1_1"]);
    assert_eq!(report.flags_raised, 1);
    assert_eq!(store.get_task("fix_1_1").unwrap().status, TaskStatus::Complete);

    // Completing the fix resolves its flag
    let flags = injector.flags();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].status, FlagStatus::Resolved);
    assert_eq!(injector.open_flag_count(), 0);
}

#[tokio::test]
async fn standard_workflow_isolates_failed_item() {
    let mut ctx = WorkflowContext::from_config(AppConfig::default()).unwrap();
    ctx.bootstrap(3).unwrap();
    let executor = ctx.executor_builder().limiter(fast_limiter()).build();

    let body = task_body_fn(|task: Task, _ctx: TaskContext| async move {
        if task.id == "expand_2" {
            return Err(TaskFailure::fatal("expansion rejected"));
        }
        Ok(json!(null))
    });

    let report = executor.execute_workflow(body, "default").await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.stats.completed, 9);
    assert_eq!(report.stats.failed, 3);
    assert_eq!(
        report.failures["validate_2"],
        "upstream dependency 'polish_2' failed"
    );
    assert_eq!(report.failures["expand_2"], "expansion rejected");
    assert_eq!(report.waves.len(), 4);
    assert_eq!(report.waves[2], vec!["polish_1", "polish_3"]);

    let stored = ctx.store().get_task("expand_2").unwrap();
    assert_eq!(stored.last_error(), Some("expansion rejected"));
}

fn item_chain(items: u32) -> Vec<Task> {
    (1..=items)
        .flat_map(|i| {
            [
                Task::new(TaskKind::Analyze, i),
                Task::new(TaskKind::Expand, i).depends_on(format!("analyze_{i}")),
                Task::new(TaskKind::Polish, i).depends_on(format!("expand_{i}")),
                Task::new(TaskKind::Validate, i).depends_on(format!("polish_{i}")),
            ]
        })
        .collect()
}

fn open_file_store(path: &std::path::Path) -> Arc<TaskStore> {
    let backend: Arc<dyn StateBackend> = Arc::new(FileBackend::open(path).unwrap());
    Arc::new(TaskStore::open("resume", backend).unwrap())
}

#[tokio::test]
async fn resumed_run_retries_failed_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.json");

    {
        let store = open_file_store(&path);
        for task in item_chain(3) {
            store.add_task(task).unwrap();
        }
        let body = task_body_fn(|task: Task, _ctx: TaskContext| async move {
            if task.id == "expand_2" {
                return Err(TaskFailure::fatal("provider outage"));
            }
            Ok(json!(null))
        });
        let executor = ParallelExecutor::new(store.clone(), fast_limiter());
        let report = executor.execute_workflow(body, "default").await.unwrap();
        assert_eq!(report.stats.failed, 3);
        assert_eq!(report.stats.completed, 9);
    }

    let store = open_file_store(&path);
    assert_eq!(store.get_task("expand_2").unwrap().status, TaskStatus::Failed);
    let executor = ParallelExecutor::new(store.clone(), fast_limiter());
    let report = executor.execute_workflow(echo_body(), "default").await.unwrap();

    assert!(report.is_success());
    let mut rerun: Vec<&str> = report.results.keys().map(String::as_str).collect();
    rerun.sort_unstable();
    assert_eq!(rerun, vec!["expand_2", "polish_2", "validate_2"]);
    assert_eq!(report.waves, vec![vec!["expand_2"], vec!["polish_2"], vec!["validate_2"]]);
    assert_eq!(report.stats.completed, 12);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(report.metrics.total_tasks, 12);
    assert_eq!(report.metrics.completed_tasks, 12);
    assert_eq!(report.metrics.run_completed, 3);
    assert_eq!(report.metrics.failed_tasks, 0);

    let expand = store.get_task("expand_2").unwrap();
    assert_eq!(expand.status, TaskStatus::Complete);
    assert_eq!(expand.last_error(), None);
}

#[tokio::test]
async fn retried_task_failing_again_cascades() {
    let store = store_with(item_chain(1));
    store.mark_failed("analyze_1", "first outage").unwrap();
    store.mark_failed("expand_1", "upstream dependency 'analyze_1' failed").unwrap();

    let body = task_body_fn(|task: Task, _ctx: TaskContext| async move {
        if task.id == "analyze_1" {
            return Err(TaskFailure::fatal("second outage"));
        }
        Ok(json!(null))
    });
    let executor = ParallelExecutor::new(store.clone(), fast_limiter());
    let report = executor.execute_workflow(body, "default").await.unwrap();

    assert_eq!(report.waves, vec![vec!["analyze_1"]]);
    assert_eq!(report.failures["analyze_1"], "second outage");
    assert_eq!(
        report.failures["polish_1"],
        "upstream dependency 'expand_1' failed"
    );
    assert_eq!(report.stats.failed, 4);
    assert_eq!(
        store.get_task("analyze_1").unwrap().last_error(),
        Some("second outage")
    );
}

#[tokio::test]
async fn no_progress_guard_stops_stuck_workflow() {
    let store = store_with(analyze_items(2));
    let executor = ParallelExecutor::builder(store.clone())
        .limiter(fast_limiter())
        .build();

    // Every fix task spawns another fix task and fails, so the completed
    // count never moves while outstanding work stays constant.
    let body = task_body_fn(|task: Task, ctx: TaskContext| async move {
        match task.kind {
            TaskKind::Fix => {
                ctx.raise_flag(1, 2, issue())?;
                Err(TaskFailure::fatal("fix contradicted chapter 1"))
            }
            _ => {
                if task.item == 1 {
                    ctx.raise_flag(1, 2, issue())?;
                }
                Ok(json!(null))
            }
        }
    });

    let err = executor.execute_workflow(body, "default").await.unwrap_err();

    match err {
        ExecutorError::Guard(GuardError::NoProgress {
            completed,
            total,
            window,
        }) => {
            assert_eq!(completed, 2);
            assert_eq!(total, 3);
            assert_eq!(window, 10);
        }
        other => panic!("expected no-progress trip, got {other:?}"),
    }
    assert_eq!(executor.guard_status().iterations, 10);
}

fn flagging_body(flags: u32) -> Arc<dyn folio_core::api::TaskBody> {
    task_body_fn(move |task: Task, ctx: TaskContext| async move {
        if task.id == "analyze_1" {
            for _ in 0..flags {
                ctx.raise_flag(1, 2, issue())?;
            }
        }
        Ok::<_, TaskFailure>(json!(null))
    })
}

fn executor_with_flag_ceiling(store: Arc<TaskStore>, max_open_flags: usize) -> ParallelExecutor {
    ParallelExecutor::builder(store)
        .limiter(fast_limiter())
        .guards(GuardConfig {
            max_open_flags,
            ..GuardConfig::default()
        })
        .build()
}

#[tokio::test]
async fn flag_explosion_trips_only_above_ceiling() {
    let store = store_with(analyze_items(2));
    let executor = executor_with_flag_ceiling(store.clone(), 3);
    let report = executor
        .execute_workflow(flagging_body(3), "default")
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.flags_raised, 3);
    assert_eq!(store.open_flag_count(), 0);

    let store = store_with(analyze_items(2));
    let executor = executor_with_flag_ceiling(store.clone(), 3);
    let err = executor
        .execute_workflow(flagging_body(4), "default")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutorError::Guard(GuardError::FlagExplosion {
            open_flags: 4,
            max_open_flags: 3
        })
    ));
}

#[tokio::test]
async fn dangling_dependency_is_reported_not_skipped() {
    let store = store_with(vec![
        Task::new(TaskKind::Analyze, 1),
        Task::new(TaskKind::Expand, 1).depends_on("analyze_9"),
    ]);
    let executor = ParallelExecutor::new(store.clone(), fast_limiter());

    let err = executor.execute_workflow(echo_body(), "default").await.unwrap_err();

    match err {
        ExecutorError::UnresolvedDependencies {
            unresolved,
            dangling,
            ..
        } => {
            assert_eq!(unresolved, vec!["expand_1"]);
            assert_eq!(dangling, vec![("expand_1".to_string(), "analyze_9".to_string())]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.get_task("analyze_1").unwrap().status, TaskStatus::Pending);
}
