use std::collections::{HashMap, HashSet};

use crate::error::GuardError;

/// Depth-first walk from `start` through dependency edges.
///
/// A node revisited while it is still on the current path is a cycle; the
/// error carries the path from its first occurrence back to itself.
/// Reaching a node again through an independent branch is fine.
pub fn check_circular_dependency(
    start: &str,
    adjacency: &HashMap<String, Vec<String>>,
) -> Result<(), GuardError> {
    let mut cleared = HashSet::new();
    match walk(start, adjacency, &mut cleared) {
        Some(cycle) => Err(GuardError::CircularDependency { path: cycle }),
        None => Ok(()),
    }
}

/// Run [`check_circular_dependency`] from every node, in sorted order so the
/// reported cycle is stable.
pub fn find_any_cycle(adjacency: &HashMap<String, Vec<String>>) -> Result<(), GuardError> {
    let mut starts: Vec<&String> = adjacency.keys().collect();
    starts.sort();

    let mut cleared = HashSet::new();
    for start in starts {
        if let Some(cycle) = walk(start, adjacency, &mut cleared) {
            return Err(GuardError::CircularDependency { path: cycle });
        }
    }
    Ok(())
}

/// Iterative depth-first walk. Each frame holds a node and the index of
/// the next dependency to visit, so long chains do not grow the call stack.
fn walk<'a>(
    start: &'a str,
    adjacency: &'a HashMap<String, Vec<String>>,
    cleared: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    // Everything below a cleared node was already walked without a cycle.
    if cleared.contains(start) {
        return None;
    }

    let mut stack: Vec<(&'a str, usize)> = vec![(start, 0)];
    let mut on_path: HashSet<&'a str> = HashSet::from([start]);

    while let Some(frame) = stack.last_mut() {
        let (node, next) = *frame;
        frame.1 += 1;

        let deps = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
        let Some(dep) = deps.get(next).map(String::as_str) else {
            stack.pop();
            on_path.remove(node);
            cleared.insert(node);
            continue;
        };

        if on_path.contains(dep) {
            let pos = stack.iter().position(|(n, _)| *n == dep)?;
            let mut cycle: Vec<String> = stack[pos..].iter().map(|(n, _)| n.to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
        if !cleared.contains(dep) {
            on_path.insert(dep);
            stack.push((dep, 0));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(edges: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(k, deps)| (k.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_cycle_path_is_reported() {
        let adj = adjacency(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        let err = check_circular_dependency("a", &adj).unwrap_err();
        assert_eq!(
            err,
            GuardError::CircularDependency {
                path: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> c -> a");
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let adj = adjacency(&[
            ("d", &["b", "c"]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("a", &[]),
        ]);
        assert!(check_circular_dependency("d", &adj).is_ok());
        assert!(find_any_cycle(&adj).is_ok());
    }

    #[test]
    fn test_missing_nodes_are_leaves() {
        let adj = adjacency(&[("fix_1_1", &["analyze_15"])]);
        assert!(check_circular_dependency("fix_1_1", &adj).is_ok());
    }

    #[test]
    fn test_cycle_below_start() {
        let adj = adjacency(&[("top", &["x"]), ("x", &["y"]), ("y", &["x"])]);
        let err = check_circular_dependency("top", &adj).unwrap_err();
        assert_eq!(
            err,
            GuardError::CircularDependency {
                path: vec!["x".into(), "y".into(), "x".into()]
            }
        );
        assert!(find_any_cycle(&adj).is_err());
    }

    fn chain(len: usize) -> HashMap<String, Vec<String>> {
        (0..len)
            .map(|i| {
                let deps = if i == 0 { Vec::new() } else { vec![format!("n{}", i - 1)] };
                (format!("n{i}"), deps)
            })
            .collect()
    }

    #[test]
    fn test_long_chain_walks_without_recursion() {
        let mut adj = chain(50_000);
        assert!(check_circular_dependency("n49999", &adj).is_ok());
        assert!(find_any_cycle(&adj).is_ok());

        adj.insert("n0".into(), vec!["n49999".into()]);
        match check_circular_dependency("n49999", &adj).unwrap_err() {
            GuardError::CircularDependency { path } => {
                assert_eq!(path.len(), 50_001);
                assert_eq!(path.first().map(String::as_str), Some("n49999"));
                assert_eq!(path.last().map(String::as_str), Some("n49999"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
