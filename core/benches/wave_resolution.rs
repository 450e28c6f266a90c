//! Wave resolution over standard workflows of growing size, with one fix
//! task per item injected from the last item.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use folio_core::api::{
    initialize_standard_workflow, FlagInjector, Issue, IssueCategory, Severity, Task, TaskGraph,
    TaskStore,
};
use std::sync::Arc;

fn workflow_tasks(items: u32) -> Vec<Task> {
    let store = Arc::new(TaskStore::in_memory("bench"));
    initialize_standard_workflow(&store, items).unwrap();

    let injector = FlagInjector::new(store.clone()).with_item_count(items);
    for item in 1..items {
        injector
            .add_flag(
                items,
                item,
                Issue::new(IssueCategory::Continuity, "timeline drift", Severity::Medium),
            )
            .unwrap();
    }
    store.tasks()
}

fn bench_resolve_waves(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_waves");

    for items in [15u32, 150, 1500] {
        let tasks = workflow_tasks(items);
        group.bench_with_input(BenchmarkId::from_parameter(tasks.len()), &tasks, |b, tasks| {
            b.iter(|| TaskGraph::from_tasks(black_box(tasks)).resolve_waves())
        });
    }

    group.finish();
}

fn bench_detect_cycle(c: &mut Criterion) {
    let tasks = workflow_tasks(150);
    let graph = TaskGraph::from_tasks(&tasks);

    c.bench_function("detect_cycle_150_items", |b| b.iter(|| black_box(&graph).detect_cycle()));
}

criterion_group!(benches, bench_resolve_waves, bench_detect_cycle);
criterion_main!(benches);
