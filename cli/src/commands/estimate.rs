use folio_core::api::AppConfig;
use folio_core::error::CliError;

use super::cli::EstimateArgs;
use super::open_workflow;

pub fn estimate(mut cfg: AppConfig, args: EstimateArgs) -> Result<i32, CliError> {
    if !(args.avg_secs.is_finite() && args.avg_secs >= 0.0) {
        return Err(CliError::Config(format!(
            "--avg-secs must be a non-negative number, got {}",
            args.avg_secs
        )));
    }
    if let Some(n) = args.max_concurrent {
        cfg.executor.max_concurrent = n;
    }

    let ctx = open_workflow(cfg, &args.workflow, false)?;
    let executor = ctx.executor();
    let est = executor.estimate_time(args.avg_secs)?;

    if args.json {
        let line = serde_json::to_string(&est).map_err(|e| CliError::Command(e.to_string()))?;
        println!("{line}");
        return Ok(0);
    }

    println!("tasks:            {}", est.task_count);
    println!("waves:            {}", est.wave_count);
    println!("widest wave:      {}", est.max_wave_width);
    println!("avg tasks/wave:   {:.1}", est.avg_tasks_per_wave);
    println!("max concurrent:   {}", executor.opts().max_concurrent);
    println!("sequential:       {}", format_secs(est.sequential_secs));
    println!("parallel:         {}", format_secs(est.parallel_secs));
    println!("saved:            {}", format_secs(est.time_saved_secs));
    println!("speedup:          {:.2}x", est.speedup);
    Ok(0)
}

fn format_secs(secs: f64) -> String {
    let total = secs.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s ({secs:.0}s)")
    } else if m > 0 {
        format!("{m}m {s:02}s ({secs:.0}s)")
    } else {
        format!("{secs:.1}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(8.0), "8.0s");
        assert_eq!(format_secs(90.0), "1m 30s (90s)");
        assert_eq!(format_secs(3725.0), "1h 02m 05s (3725s)");
    }
}
