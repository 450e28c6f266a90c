use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::ExecutorError;
use crate::task::TaskLike;

/// Task dependency graph built from a snapshot of the store.
#[derive(Debug, Clone)]
pub struct TaskGraph<T: TaskLike> {
    /// Task nodes: task_id -> Task
    pub nodes: HashMap<String, T>,

    /// Dependency edges: task_id -> list of dependencies (deduplicated)
    pub edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> list of tasks that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,

    /// Original insertion order (for stable sorting)
    insertion_order: Vec<String>,
}

/// Waves computed from a task set.
///
/// `waves[0]` is wave 1. Tasks that can never be placed (cycle members,
/// anything downstream of a cycle, or tasks waiting on ids that do not
/// exist) are listed in `unresolved` instead of being dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub waves: Vec<Vec<String>>,
    pub unresolved: Vec<String>,
}

impl WavePlan {
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn task_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// 1-based wave number of `task_id`.
    pub fn wave_of(&self, task_id: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|id| id == task_id))
            .map(|idx| idx + 1)
    }
}

impl<T: TaskLike> TaskGraph<T> {
    /// Construct task graph from task list. A repeated id replaces the
    /// earlier entry but keeps its position.
    pub fn from_tasks(tasks: &[T]) -> Self {
        let mut nodes = HashMap::new();
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut insertion_order = Vec::new();

        for task in tasks {
            let task_id = task.id().to_string();

            let mut seen = HashSet::new();
            let dependencies: Vec<String> = task
                .dependencies()
                .iter()
                .filter(|dep| seen.insert(dep.as_str()))
                .cloned()
                .collect();

            if nodes.insert(task_id.clone(), task.clone()).is_none() {
                insertion_order.push(task_id.clone());
            }
            edges.insert(task_id, dependencies);
        }

        // Build reverse edges
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();
        for task_id in &insertion_order {
            for dep in &edges[task_id] {
                reverse_edges
                    .entry(dep.clone())
                    .or_default()
                    .push(task_id.clone());
            }
        }

        Self {
            nodes,
            edges,
            reverse_edges,
            insertion_order,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Task ids in insertion order.
    pub fn task_ids(&self) -> &[String] {
        &self.insertion_order
    }

    pub fn dependencies_of(&self, task_id: &str) -> &[String] {
        self.edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.reverse_edges
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Adjacency map (task -> dependencies) for the cycle guard.
    pub fn adjacency(&self) -> HashMap<String, Vec<String>> {
        self.edges.clone()
    }

    /// Partition the graph into minimal waves.
    ///
    /// Each pass assigns, in one batch, every unassigned task whose
    /// dependencies are all assigned already; the batch becomes the next
    /// wave. A task therefore lands in wave `1 + longest chain below it`.
    /// Resolution stops when a pass assigns nothing.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn resolve_waves(&self) -> WavePlan {
        let position: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();

        // Number of not-yet-assigned dependencies per task. Dependencies on
        // unknown ids are never assigned, so those tasks never reach zero.
        let mut pending: HashMap<&str, usize> = self
            .edges
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();

        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = self
            .insertion_order
            .iter()
            .filter(|id| pending.get(id.as_str()) == Some(&0))
            .cloned()
            .collect();
        let mut assigned = 0;

        while !current.is_empty() {
            assigned += current.len();

            let mut next = Vec::new();
            for task_id in &current {
                for dependent in self.dependents_of(task_id) {
                    if let Some(count) = pending.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }

            // Preserve input order
            next.sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));

            waves.push(std::mem::replace(&mut current, next));
        }

        let unresolved = if assigned == self.nodes.len() {
            Vec::new()
        } else {
            self.insertion_order
                .iter()
                .filter(|id| pending.get(id.as_str()).is_some_and(|count| *count > 0))
                .cloned()
                .collect()
        };

        WavePlan { waves, unresolved }
    }

    /// Like [`resolve_waves`](Self::resolve_waves) but treats an unresolved
    /// remainder as an error carrying the cycle path and missing ids.
    pub fn resolve(&self) -> Result<WavePlan, ExecutorError> {
        let plan = self.resolve_waves();
        if plan.is_complete() {
            return Ok(plan);
        }

        let stuck: HashSet<&str> = plan.unresolved.iter().map(String::as_str).collect();
        let cycle = self.detect_cycle_within(&stuck);
        let dangling = plan
            .unresolved
            .iter()
            .flat_map(|id| {
                self.dependencies_of(id)
                    .iter()
                    .filter(|dep| !self.nodes.contains_key(*dep))
                    .map(move |dep| (id.clone(), dep.clone()))
            })
            .collect();

        Err(ExecutorError::UnresolvedDependencies {
            unresolved: plan.unresolved,
            cycle,
            dangling,
        })
    }

    /// Detect circular dependencies using DFS. Returns the cycle as a path
    /// that starts and ends on the same task.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let all: HashSet<&str> = self.insertion_order.iter().map(String::as_str).collect();
        self.detect_cycle_within(&all)
    }

    /// Dependency listing grouped by wave, one task per line.
    ///
    /// ```text
    /// Wave 1
    ///   analyze_1
    /// Wave 2
    ///   expand_1 <- analyze_1
    /// ```
    pub fn render_tree(&self, plan: &WavePlan) -> String {
        let mut out = String::new();
        for (idx, wave) in plan.waves.iter().enumerate() {
            out.push_str(&format!("Wave {}\n", idx + 1));
            for task_id in wave {
                out.push_str(&self.render_line(task_id));
            }
        }
        if !plan.unresolved.is_empty() {
            out.push_str("Unresolved\n");
            for task_id in &plan.unresolved {
                out.push_str(&self.render_line(task_id));
            }
        }
        out
    }

    fn render_line(&self, task_id: &str) -> String {
        let deps = self.dependencies_of(task_id);
        if deps.is_empty() {
            format!("  {task_id}\n")
        } else {
            format!("  {task_id} <- {}\n", deps.join(", "))
        }
    }

    fn detect_cycle_within(&self, scope: &HashSet<&str>) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();

        for task_id in &self.insertion_order {
            if scope.contains(task_id.as_str()) && !visited.contains(task_id.as_str()) {
                if let Some(cycle) = self.dfs_cycle(task_id, scope, &mut visited) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Depth-first search from `root` with an explicit stack of
    /// `(task, next dependency index)` frames.
    fn dfs_cycle<'a>(
        &'a self,
        root: &'a str,
        scope: &HashSet<&str>,
        visited: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];
        let mut on_path: HashSet<&'a str> = HashSet::from([root]);
        visited.insert(root);

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            frame.1 += 1;

            let Some(dep) = self.dependencies_of(node).get(next).map(String::as_str) else {
                stack.pop();
                on_path.remove(node);
                continue;
            };
            if !scope.contains(dep) {
                continue;
            }

            // Dependency on the current path closes a cycle
            if on_path.contains(dep) {
                let pos = stack.iter().position(|(n, _)| *n == dep)?;
                let mut cycle: Vec<String> = stack[pos..].iter().map(|(n, _)| n.to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }

            if visited.insert(dep) {
                on_path.insert(dep);
                stack.push((dep, 0));
            }
        }

        None
    }
}
