use std::collections::HashSet;

use folio_core::api::{ExecutorError, Task, TaskGraph, TaskKind};
use proptest::prelude::*;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    let deps: HashSet<usize> = if i == 0 {
                        HashSet::new()
                    } else {
                        picks.into_iter().map(|p| p % i).collect()
                    };
                    let mut deps: Vec<usize> = deps.into_iter().collect();
                    deps.sort();
                    deps
                })
                .collect()
        })
    })
}

fn build(deps: &[Vec<usize>]) -> Vec<Task> {
    deps.iter()
        .enumerate()
        .map(|(i, ds)| {
            Task::with_id(format!("t{i}"), TaskKind::Analyze, i as u32 + 1)
                .with_dependencies(ds.iter().map(|d| format!("t{d}")))
        })
        .collect()
}

proptest! {
    #[test]
    fn every_task_lands_in_its_minimal_wave(deps in dag_strategy(24)) {
        let tasks = build(&deps);
        let plan = TaskGraph::from_tasks(&tasks).resolve_waves();

        prop_assert!(plan.unresolved.is_empty());
        prop_assert_eq!(plan.task_count(), tasks.len());

        // Longest chain ending at each task, in index order
        let mut depth = vec![0usize; deps.len()];
        for (i, ds) in deps.iter().enumerate() {
            let longest = ds.iter().map(|d| depth[*d]).max().map_or(1, |m| m + 1);
            depth[i] = longest;
        }

        for (i, expected) in depth.iter().enumerate() {
            prop_assert_eq!(plan.wave_of(&format!("t{i}")), Some(*expected));
        }
    }

    #[test]
    fn cycles_terminate_as_unresolved(deps in dag_strategy(16)) {
        prop_assume!(deps.len() >= 2);
        let last = deps.len() - 1;

        let mut tasks = build(&deps);
        // Close a loop between the first and the last task
        tasks[0] = tasks[0].clone().depends_on(format!("t{last}"));
        tasks[last] = tasks[last].clone().depends_on("t0");

        let graph = TaskGraph::from_tasks(&tasks);
        let plan = graph.resolve_waves();

        prop_assert!(plan.unresolved.contains(&"t0".to_string()));
        let last_id = format!("t{last}");
        prop_assert!(plan.unresolved.contains(&last_id));
        prop_assert_eq!(plan.task_count() + plan.unresolved.len(), tasks.len());

        match graph.resolve() {
            Err(ExecutorError::UnresolvedDependencies { cycle, .. }) => {
                let cycle = cycle.unwrap_or_default();
                prop_assert!(cycle.len() >= 3);
                prop_assert_eq!(cycle.first(), cycle.last());
            }
            other => prop_assert!(false, "expected unresolved error, got {:?}", other),
        }
    }
}
