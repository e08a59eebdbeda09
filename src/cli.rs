use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::filter::StalePolicy;

#[derive(Parser, Debug)]
#[command(
    name = "drilldown",
    version,
    about = "Linked drill-down bar charts over a defect dataset"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive session: read click events from stdin and redraw.
    Explore(ExploreArgs),
    /// Apply a recorded JSON Lines event log and print the final dashboard.
    Replay(ReplayArgs),
    /// Render the chain once for selections given on the command line.
    Summary(SummaryArgs),
    /// Report dataset columns and the configured chain.
    Schema(SchemaArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DashboardArgs {
    #[arg(long, default_value = "modified_new.csv")]
    pub dataset: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub variant: Option<String>,

    /// Comma-separated dimension names, overriding the variant's chain.
    #[arg(long)]
    pub chain: Option<String>,

    #[arg(long, value_enum)]
    pub stale_policy: Option<StalePolicyArg>,

    #[arg(long, default_value_t = false)]
    pub gate_on_upstream: bool,

    #[arg(long)]
    pub top_n: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StalePolicyArg {
    Retain,
    ClearDownstream,
}

impl StalePolicyArg {
    pub fn into_policy(self) -> StalePolicy {
        match self {
            Self::Retain => StalePolicy::Retain,
            Self::ClearDownstream => StalePolicy::ClearDownstream,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct ExploreArgs {
    #[command(flatten)]
    pub dashboard: DashboardArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub dashboard: DashboardArgs,

    #[arg(long)]
    pub events: PathBuf,

    /// Write a full JSON snapshot of the final state here.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub dashboard: DashboardArgs,

    /// STAGE=CATEGORY, where STAGE is an index or a dimension name.
    #[arg(long = "select")]
    pub selections: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub dashboard: DashboardArgs,
}
