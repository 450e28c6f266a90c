use chrono::Local;
use folio_core::executor::traits::{OutputRendererPlugin, RenderEvent};
use serde_json::{json, Map, Value};

/// One JSON object per event, suitable for piping into other tools.
pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let (event_type, run_id, metadata) = match event {
            RenderEvent::RunStart {
                run_id,
                workflow_id,
                total_tasks,
            } => (
                "run.start",
                run_id,
                json!({ "workflow_id": workflow_id, "total_tasks": total_tasks }),
            ),
            RenderEvent::Plan { run_id, waves } => {
                let total_tasks: usize = waves.iter().map(Vec::len).sum();
                (
                    "executor.plan",
                    run_id,
                    json!({ "waves": waves, "total_tasks": total_tasks }),
                )
            }
            RenderEvent::WaveStart {
                run_id,
                wave,
                task_ids,
            } => ("wave.start", run_id, json!({ "wave": wave, "tasks": task_ids })),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                wave,
            } => (
                "task.start",
                run_id,
                json!({ "task_id": task_id, "wave": wave }),
            ),
            RenderEvent::TaskComplete { run_id, outcome } => (
                "task.end",
                run_id,
                json!({
                    "task_id": outcome.task_id,
                    "wave": outcome.wave,
                    "success": outcome.success,
                    "skipped": outcome.skipped,
                    "duration_ms": outcome.duration_ms,
                    "retries_used": outcome.retries_used,
                    "error": outcome.error,
                }),
            ),
            RenderEvent::FlagRaised { run_id, flag } => (
                "flag.raised",
                run_id,
                serde_json::to_value(flag).unwrap_or(Value::Null),
            ),
            RenderEvent::WaveEnd {
                run_id,
                wave,
                completed,
                failed,
                duration_ms,
            } => (
                "wave.end",
                run_id,
                json!({
                    "wave": wave,
                    "completed": completed,
                    "failed": failed,
                    "duration_ms": duration_ms,
                }),
            ),
            RenderEvent::RunEnd { run_id, metrics } => (
                "run.end",
                run_id,
                serde_json::to_value(metrics).unwrap_or(Value::Null),
            ),
        };

        let mut out = Map::new();
        out.insert("v".into(), json!(1));
        out.insert("event_type".into(), json!(event_type));
        out.insert("ts".into(), json!(Local::now().to_rfc3339()));
        out.insert("run_id".into(), json!(run_id));
        out.insert("metadata".into(), metadata);
        Value::Object(out)
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        println!("{}", line.unwrap_or_else(|_| "{}".into()));
    }
}
