use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

struct Bars {
    multi: MultiProgress,
    /// Every task of the workflow, including injected fixes
    overall: ProgressBar,
    /// Tasks of the wave currently running
    wave: ProgressBar,
    running: HashMap<String, ProgressBar>,
}

/// Terminal progress for a workflow run: one bar for the whole run, one for
/// the current wave and a spinner per in-flight task.
///
/// A disabled monitor (jsonl output, non-interactive runs) accepts every
/// call and draws nothing.
pub struct ProgressMonitor {
    bars: Option<Bars>,
}

impl ProgressMonitor {
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self { bars: None };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
        {
            overall.set_style(style.progress_chars("█▓▒░  "));
        }
        overall.set_message("resolving waves");

        let wave = multi.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::default_bar().template("  {msg:>8} {bar:30.green} {pos}/{len}") {
            wave.set_style(style.progress_chars("=> "));
        }

        Self {
            bars: Some(Bars {
                multi,
                overall,
                wave,
                running: HashMap::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bars.is_some()
    }

    /// Reset the wave bar and add a spinner for each task of `wave`.
    pub fn start_wave(&mut self, wave: usize, task_ids: &[String]) {
        let Some(bars) = self.bars.as_mut() else {
            return;
        };
        bars.wave.reset();
        bars.wave.set_length(task_ids.len() as u64);
        bars.wave.set_message(format!("wave {wave}"));
        bars.overall.set_message(format!("wave {wave}"));

        for id in task_ids {
            let spinner = bars.multi.add(ProgressBar::new_spinner());
            if let Ok(style) = ProgressStyle::default_spinner().template("    {spinner:.green} {msg}") {
                spinner.set_style(style.tick_strings(SPINNER_TICKS));
            }
            spinner.set_message(id.clone());
            spinner.enable_steady_tick(Duration::from_millis(100));
            bars.running.insert(id.clone(), spinner);
        }
    }

    pub fn complete_task(&mut self, task_id: &str, success: bool, duration_ms: u64) {
        let Some(bars) = self.bars.as_mut() else {
            return;
        };
        if let Some(spinner) = bars.running.remove(task_id) {
            let icon = if success { "✅" } else { "❌" };
            spinner.finish_with_message(format!("{icon} {task_id} ({duration_ms}ms)"));
        }
        bars.wave.inc(1);
        bars.overall.inc(1);
    }

    /// Count a task failed by an upstream failure; it never had a spinner.
    pub fn skip_task(&mut self, task_id: &str) {
        let Some(bars) = self.bars.as_mut() else {
            return;
        };
        bars.overall.inc(1);
        bars.overall.set_message(format!("skipped {task_id}"));
    }

    /// Track a task set that grew after flag injection.
    pub fn set_total(&self, total_tasks: usize) {
        if let Some(bars) = &self.bars {
            bars.overall.set_length(total_tasks as u64);
        }
    }

    pub fn finish(&mut self, success: bool) {
        let Some(bars) = self.bars.as_mut() else {
            return;
        };
        for (_, spinner) in bars.running.drain() {
            spinner.finish_and_clear();
        }
        bars.wave.finish_and_clear();
        let msg = if success {
            "✅ workflow complete"
        } else {
            "❌ workflow finished with failures"
        };
        bars.overall.finish_with_message(msg);
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Some(bars) = self.bars.as_mut() {
            for (_, spinner) in bars.running.drain() {
                spinner.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_disabled_monitor_ignores_calls() {
        let mut monitor = ProgressMonitor::new(3, false);
        assert!(!monitor.is_enabled());

        monitor.start_wave(1, &ids(&["analyze_1"]));
        monitor.complete_task("analyze_1", true, 100);
        monitor.skip_task("expand_1");
        monitor.set_total(5);
        monitor.finish(true);
    }

    #[test]
    fn test_wave_spinners_are_removed_on_completion() {
        let mut monitor = ProgressMonitor::new(3, true);
        monitor.start_wave(1, &ids(&["analyze_1", "fix_1_1"]));
        monitor.complete_task("analyze_1", true, 100);

        let running = monitor.bars.as_ref().map(|b| b.running.len());
        assert_eq!(running, Some(1));

        monitor.complete_task("fix_1_1", false, 200);
        monitor.skip_task("expand_1");
        monitor.set_total(4);
        monitor.finish(false);
        assert_eq!(monitor.bars.as_ref().map(|b| b.running.len()), Some(0));
    }
}
