use folio_core::api::{AppConfig, ExecutorError, TaskGraph};
use folio_core::error::CliError;
use serde_json::json;

use super::cli::PlanArgs;
use super::open_workflow;

pub fn plan(cfg: AppConfig, args: PlanArgs) -> Result<i32, CliError> {
    let ctx = open_workflow(cfg, &args.workflow, false)?;
    let tasks = ctx.store().tasks();
    let graph = TaskGraph::from_tasks(&tasks);
    let plan = graph.resolve_waves();

    if args.json {
        let value = json!({
            "workflow_id": ctx.workflow_id(),
            "tasks": plan.task_count(),
            "waves": plan.waves,
            "unresolved": plan.unresolved,
        });
        println!("{value}");
    } else {
        println!(
            "{}: {} task(s) in {} wave(s)",
            ctx.workflow_id(),
            plan.task_count(),
            plan.wave_count()
        );
        print!("{}", graph.render_tree(&plan));
    }

    if plan.is_complete() {
        Ok(0)
    } else {
        // Reuse the resolver's error for the diagnosis (cycle path, missing deps).
        Err(graph.resolve().err().map(CliError::Executor).unwrap_or_else(|| {
            CliError::Executor(ExecutorError::UnresolvedDependencies {
                unresolved: plan.unresolved.clone(),
                cycle: None,
                dangling: Vec::new(),
            })
        }))
    }
}
