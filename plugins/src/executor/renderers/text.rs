use folio_core::executor::traits::{OutputRendererPlugin, RenderEvent};

/// Plain line-per-event output for terminals and logs.
pub struct TextRendererPlugin {
    ascii_only: bool,
    verbose: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self {
            ascii_only,
            verbose: false,
        }
    }

    /// Also print a line when each task starts.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn mark(&self, success: bool) -> &'static str {
        match (success, self.ascii_only) {
            (true, true) => "[ok]",
            (false, true) => "[x]",
            (true, false) => "✔",
            (false, false) => "✘",
        }
    }

    fn format_event(&self, event: &RenderEvent) -> Option<String> {
        let line = match event {
            RenderEvent::RunStart {
                run_id,
                workflow_id,
                total_tasks,
            } => format!("RUN START {run_id} (workflow {workflow_id}, tasks: {total_tasks})"),
            RenderEvent::Plan { run_id, waves } => {
                let mut out = format!("PLAN {run_id}: {} wave(s)", waves.len());
                for (idx, wave) in waves.iter().enumerate() {
                    out.push_str(&format!("\n  wave {}: {}", idx + 1, wave.join(", ")));
                }
                out
            }
            RenderEvent::WaveStart { wave, task_ids, .. } => {
                format!("WAVE {wave} START ({} task(s))", task_ids.len())
            }
            RenderEvent::TaskStart { task_id, wave, .. } => {
                if !self.verbose {
                    return None;
                }
                format!("  start {task_id} (wave {wave})")
            }
            RenderEvent::TaskComplete { outcome, .. } => {
                let mut line = format!(
                    "  {} {} {}ms",
                    self.mark(outcome.success),
                    outcome.task_id,
                    outcome.duration_ms
                );
                if outcome.retries_used > 0 {
                    line.push_str(&format!(", retries {}", outcome.retries_used));
                }
                if outcome.skipped {
                    line.push_str(", skipped");
                }
                if let Some(err) = &outcome.error {
                    line.push_str(&format!(": {err}"));
                }
                line
            }
            RenderEvent::FlagRaised { flag, .. } => format!(
                "  FLAG {} item {} -> item {} [{}/{}] {} (fix: {})",
                flag.id,
                flag.discovered_in,
                flag.affects_item,
                flag.issue.category,
                flag.issue.severity,
                flag.issue.detail,
                flag.fix_task_id
            ),
            RenderEvent::WaveEnd {
                wave,
                completed,
                failed,
                duration_ms,
                ..
            } => format!(
                "WAVE {wave} END (completed {completed}, failed {failed}, duration {duration_ms}ms)"
            ),
            RenderEvent::RunEnd { run_id, metrics } => format!(
                "RUN END {run_id} (completed {}, failed {}, waves {}, duration {}ms, {:.2} tasks/s)",
                metrics.completed_tasks,
                metrics.failed_tasks,
                metrics.wave_durations_ms.len(),
                metrics.total_duration_ms,
                metrics.tasks_per_second
            ),
        };
        Some(line)
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        if let Some(line) = self.format_event(event) {
            println!("{line}");
        }
    }
}
