use std::sync::Arc;
use std::time::Duration;

use folio_core::api::AppConfig;
use folio_core::error::CliError;
use folio_plugins::bodies::{ScriptedFlag, SimulatedTaskBody};
use folio_plugins::factory::{build_renderer, build_retry_strategy};

use super::cli::{OutputFormat, RunArgs};
use super::open_workflow;

/// Returns 0 when every task completed and 1 when some failed.
pub async fn run(mut cfg: AppConfig, args: RunArgs) -> Result<i32, CliError> {
    let flags = args
        .flags
        .iter()
        .map(|raw| raw.parse::<ScriptedFlag>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    let retry = build_retry_strategy(&cfg.retry).map_err(|e| CliError::Config(e.to_string()))?;

    if let Some(n) = args.max_concurrent {
        cfg.executor.max_concurrent = n;
    }
    cfg.executor.progress = args.progress && args.format != OutputFormat::Jsonl;
    let provider = args
        .provider
        .clone()
        .unwrap_or_else(|| cfg.executor.default_provider.clone());

    let ctx = open_workflow(cfg, &args.workflow, args.reset)?;
    let items = 1..=args.workflow.items;
    for flag in &flags {
        if !items.contains(&flag.discovered_in) || !items.contains(&flag.affects_item) {
            return Err(CliError::Config(format!(
                "flag {}->{} is outside items 1..={}",
                flag.discovered_in, flag.affects_item, args.workflow.items
            )));
        }
    }

    let body = Arc::new(
        SimulatedTaskBody::new(Duration::from_millis(args.delay_ms))
            .failing(args.fail.iter().cloned())
            .with_flags(flags),
    );

    let mut builder = ctx
        .executor_builder()
        .renderer(build_renderer(args.format.as_str()));
    if let Some(strategy) = retry {
        builder = builder.retry_strategy(strategy);
    }
    let executor = builder.build();

    let report = executor.execute_workflow(body, &provider).await?;
    tracing::info!(
        target: "folio.cli",
        run_id = %report.run_id,
        completed = report.results.len(),
        failed = report.failures.len(),
        waves = report.waves.len(),
        flags = report.flags_raised,
        "run finished"
    );

    if args.format != OutputFormat::Jsonl {
        for (task_id, error) in &report.failures {
            eprintln!("failed: {task_id}: {error}");
        }
    }
    Ok(if report.is_success() { 0 } else { 1 })
}
