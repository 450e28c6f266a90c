use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::store::TaskStore;
use crate::task::{Task, TaskKind, TaskStatus};

/// Phases of the standard per-item template, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Analyze,
    Expand,
    Polish,
    Validate,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Analyze, Phase::Expand, Phase::Polish, Phase::Validate];

    pub fn kind(self) -> TaskKind {
        match self {
            Phase::Analyze => TaskKind::Analyze,
            Phase::Expand => TaskKind::Expand,
            Phase::Polish => TaskKind::Polish,
            Phase::Validate => TaskKind::Validate,
        }
    }

    /// Phase the same item must finish first.
    pub fn previous(self) -> Option<Phase> {
        match self {
            Phase::Analyze => None,
            Phase::Expand => Some(Phase::Analyze),
            Phase::Polish => Some(Phase::Expand),
            Phase::Validate => Some(Phase::Polish),
        }
    }

    pub fn task_id(self, item: u32) -> String {
        Task::task_id(self.kind(), item)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().as_str())
    }
}

/// Populate `items` x 4 phase tasks, phase by phase.
///
/// Analyze tasks start `pending`; later phases start `blocked` on the same
/// item's previous phase. Tasks already in the store are left alone, so
/// calling this on a resumed workflow only fills gaps. Returns the number
/// of tasks created.
pub fn initialize_standard_workflow(store: &TaskStore, items: u32) -> Result<usize, StoreError> {
    let mut created = 0;

    for phase in Phase::ALL {
        for item in 1..=items {
            let id = phase.task_id(item);
            if store.contains(&id) {
                continue;
            }

            let mut task = Task::new(phase.kind(), item);
            if let Some(prev) = phase.previous() {
                task = task.depends_on(prev.task_id(item));
                task.status = TaskStatus::Blocked;
            }
            store.add_task(task)?;
            created += 1;
        }
    }

    info!(
        target: "folio.workflow",
        workflow_id = %store.workflow_id(),
        items,
        created,
        "standard workflow initialized"
    );
    Ok(created)
}
