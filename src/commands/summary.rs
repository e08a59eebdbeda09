use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::SummaryArgs;
use crate::commands::{open_dashboard, render_to_stdout, renderer};
use crate::model::StageRef;

pub fn run(args: SummaryArgs) -> Result<()> {
    let mut dashboard = open_dashboard(&args.dashboard)?;

    for raw in &args.selections {
        let (stage, category) = parse_selection(raw)?;
        let stage = dashboard
            .resolve_stage(&stage)
            .with_context(|| format!("invalid --select '{raw}'"))?;
        dashboard.select(stage, category);
    }

    info!(
        selections = args.selections.len(),
        satisfiable = dashboard.is_chain_satisfiable(),
        "summary computed"
    );

    let chart_renderer = renderer(args.format, &dashboard);
    render_to_stdout(chart_renderer.as_ref(), &dashboard)
}

pub(crate) fn parse_selection(raw: &str) -> Result<(StageRef, Option<String>)> {
    let Some((stage, category)) = raw.split_once('=') else {
        bail!("selection '{raw}' must look like STAGE=CATEGORY");
    };
    if stage.trim().is_empty() {
        bail!("selection '{raw}' is missing a stage");
    }

    let category = category.trim();
    let category = (!category.is_empty()).then(|| category.to_string());
    Ok((StageRef::parse(stage), category))
}
