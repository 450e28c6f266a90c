pub mod cli;
pub mod estimate;
pub mod plan;
pub mod run;

use folio_core::api::{AppConfig, StoreBackendKind, WorkflowContext};
use folio_core::error::CliError;

use cli::WorkflowArgs;

/// Open the configured store and make sure the standard workflow exists.
pub(crate) fn open_workflow(
    mut cfg: AppConfig,
    args: &WorkflowArgs,
    reset: bool,
) -> Result<WorkflowContext, CliError> {
    if let Some(path) = &args.store {
        cfg.store.backend = StoreBackendKind::File;
        cfg.store.path = Some(path.clone());
    }
    cfg.validate().map_err(CliError::Config)?;

    let mut ctx = WorkflowContext::from_config(cfg)?;
    if reset {
        ctx.reset()?;
    }
    let created = ctx.bootstrap(args.items)?;
    tracing::debug!(
        target: "folio.cli",
        workflow_id = %ctx.workflow_id(),
        created,
        total = ctx.store().len(),
        "workflow bootstrapped"
    );
    Ok(ctx)
}
