use anyhow::Result;
use tracing::{info, warn};

use crate::cli::ReplayArgs;
use crate::commands::{open_dashboard, render_to_stdout, renderer};
use crate::dashboard::Dashboard;
use crate::event::{LoggedEvent, read_event_log};
use crate::util::write_json_pretty;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayCounts {
    pub applied: usize,
    pub skipped: usize,
}

pub fn run(args: ReplayArgs) -> Result<()> {
    let events = read_event_log(&args.events)?;
    let mut dashboard = open_dashboard(&args.dashboard)?;

    let counts = apply_events(&mut dashboard, &events);
    let memo = dashboard.memo_stats();
    info!(
        path = %args.events.display(),
        applied = counts.applied,
        skipped = counts.skipped,
        memo_hits = memo.hits,
        memo_misses = memo.misses,
        satisfiable = dashboard.is_chain_satisfiable(),
        "event log replayed"
    );

    if let Some(output) = &args.output {
        write_json_pretty(output, &dashboard.snapshot())?;
        info!(path = %output.display(), "wrote dashboard snapshot");
    }

    let chart_renderer = renderer(args.format, &dashboard);
    render_to_stdout(chart_renderer.as_ref(), &dashboard)
}

pub fn apply_events(dashboard: &mut Dashboard, events: &[LoggedEvent]) -> ReplayCounts {
    let mut counts = ReplayCounts::default();
    for (index, event) in events.iter().enumerate() {
        match dashboard.resolve_stage(&event.stage) {
            Ok(stage) => {
                dashboard.handle_click(stage, &event.event);
                counts.applied += 1;
            }
            Err(err) => {
                warn!(event = index + 1, error = %err, "event skipped");
                counts.skipped += 1;
            }
        }
    }
    counts
}
