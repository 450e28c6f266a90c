//! Stand-in task body for dry runs: sleeps, optionally fails, and raises
//! scripted flags while analysing items.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use folio_core::api::{Issue, Task, TaskContext, TaskFailure, TaskKind};
use folio_core::executor::traits::TaskBody;

/// A flag raised while `analyze_<discovered_in>` runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFlag {
    pub discovered_in: u32,
    pub affects_item: u32,
    pub issue: Issue,
}

impl FromStr for ScriptedFlag {
    type Err = anyhow::Error;

    /// `FROM:TO:CATEGORY:SEVERITY[:DETAIL]`, e.g. `15:1:foreshadowing:high`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(5, ':');
        let mut next = |name: &str| {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| anyhow!("flag '{s}' is missing {name}"))
        };
        let discovered_in: u32 = next("FROM")?
            .parse()
            .with_context(|| format!("flag '{s}': FROM is not an item number"))?;
        let affects_item: u32 = next("TO")?
            .parse()
            .with_context(|| format!("flag '{s}': TO is not an item number"))?;
        let category = next("CATEGORY")?;
        let severity = next("SEVERITY")?;
        let detail = parts
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{category} issue found in item {discovered_in}"));
        let issue = Issue::parse(category, &detail, severity)?;
        Ok(Self {
            discovered_in,
            affects_item,
            issue,
        })
    }
}

#[derive(Default)]
pub struct SimulatedTaskBody {
    delay: Duration,
    failing: HashSet<String>,
    /// Task id -> number of leading attempts that fail.
    flaky: HashMap<String, u32>,
    flags: Vec<ScriptedFlag>,
    raised: Mutex<HashSet<usize>>,
}

impl SimulatedTaskBody {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Every attempt of these tasks fails.
    pub fn failing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(ids.into_iter().map(Into::into));
        self
    }

    /// The first `attempts` attempts of `id` fail, later ones succeed.
    pub fn flaky(mut self, id: impl Into<String>, attempts: u32) -> Self {
        self.flaky.insert(id.into(), attempts);
        self
    }

    pub fn with_flags(mut self, flags: Vec<ScriptedFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Scripted flags not yet raised by this task, marked raised.
    fn take_flags(&self, task: &Task) -> Vec<ScriptedFlag> {
        if task.kind != TaskKind::Analyze {
            return Vec::new();
        }
        let mut raised = match self.raised.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.discovered_in == task.item)
            .filter(|(idx, _)| raised.insert(*idx))
            .map(|(_, f)| f.clone())
            .collect()
    }
}

#[async_trait]
impl TaskBody for SimulatedTaskBody {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn run(&self, task: &Task, ctx: &TaskContext) -> Result<serde_json::Value, TaskFailure> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.contains(&task.id) {
            return Err(TaskFailure::new(format!("simulated failure in {}", task.id)));
        }
        if let Some(&attempts) = self.flaky.get(&task.id) {
            if ctx.attempt < attempts {
                return Err(TaskFailure::new(format!(
                    "simulated transient failure in {} (attempt {})",
                    task.id,
                    ctx.attempt + 1
                )));
            }
        }

        let mut raised = Vec::new();
        for scripted in self.take_flags(task) {
            let flag =
                ctx.raise_flag(scripted.discovered_in, scripted.affects_item, scripted.issue)?;
            debug!(target: "folio.plugins", task_id = %task.id, flag_id = %flag.id, "scripted flag raised");
            raised.push(flag.id);
        }

        Ok(json!({
            "task_id": task.id,
            "kind": task.kind.as_str(),
            "item": task.item,
            "attempt": ctx.attempt,
            "wave": ctx.wave,
            "flags_raised": raised,
        }))
    }
}
