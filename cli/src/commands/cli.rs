use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    /// Text plus a line per task start.
    TextVerbose,
    Jsonl,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TextVerbose => "text-verbose",
            Self::Jsonl => "jsonl",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Wave-based manuscript workflow runner")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.folio/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct WorkflowArgs {
    /// Number of items (chapters) in the manuscript.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub items: u32,

    /// Persist tasks and flags to this JSON file instead of memory.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Cross-item flag raised while analysing FROM:
    /// FROM:TO:CATEGORY:SEVERITY[:DETAIL]. Can be specified multiple times.
    #[arg(long = "flag", action = clap::ArgAction::Append)]
    pub flags: Vec<String>,

    /// Task id whose body always fails. Can be specified multiple times.
    #[arg(long = "fail", action = clap::ArgAction::Append)]
    pub fail: Vec<String>,

    /// Simulated work per task.
    #[arg(long, default_value_t = 50)]
    pub delay_ms: u64,

    /// Rate-limit provider for every task (defaults to executor.default_provider).
    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub max_concurrent: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Show a progress bar (text formats only).
    #[arg(long)]
    pub progress: bool,

    /// Clear a persisted workflow before bootstrapping.
    #[arg(long)]
    pub reset: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Print the plan as a single JSON object.
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Average seconds one task takes.
    #[arg(long, default_value_t = 30.0)]
    pub avg_secs: f64,

    #[arg(long)]
    pub max_concurrent: Option<usize>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap the standard workflow and execute it with a simulated body.
    Run(RunArgs),
    /// Print the wave partition and dependency listing.
    Plan(PlanArgs),
    /// Project sequential and parallel runtime of the plan.
    Estimate(EstimateArgs),
}
