use anyhow::Result;
use tracing::{info, warn};

use crate::cli::SchemaArgs;
use crate::commands::open_dashboard;

pub fn run(args: SchemaArgs) -> Result<()> {
    let dashboard = open_dashboard(&args.dashboard)?;
    let dataset = dashboard.dataset();

    info!(
        source = %dataset.source,
        sha256 = %dataset.sha256.as_deref().unwrap_or_default(),
        rows = dataset.len(),
        "dataset"
    );

    for dimension in dataset.schema() {
        info!(
            dimension = %dimension,
            distinct = dataset.distinct_count(dimension),
            "column"
        );
    }

    let chain = dashboard.machine().chain();
    for (stage, dimension) in chain.dimensions().iter().enumerate() {
        if dataset.has_dimension(dimension) {
            info!(stage, dimension = %dimension, "chain stage");
        } else {
            warn!(stage, dimension = %dimension, "chain stage has no matching column");
        }
    }

    info!(
        variant = %dashboard.variant().name,
        stale_policy = dashboard.machine().policy().as_str(),
        gate_on_upstream = dashboard.variant().gate_on_upstream,
        satisfiable = dashboard.is_chain_satisfiable(),
        "chain status"
    );

    Ok(())
}
