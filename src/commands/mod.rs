use std::io::Write;

use anyhow::Result;
use tracing::info;

use crate::cli::{DashboardArgs, OutputFormat};
use crate::config::{DashboardConfig, VariantOverrides, parse_chain_list, resolve_variant};
use crate::dashboard::Dashboard;
use crate::dataset::load_dataset;
use crate::render::{ChartRenderer, JsonRenderer, TextRenderer};

pub mod explore;
pub mod replay;
pub mod schema;
pub mod summary;

pub(crate) fn open_dashboard(args: &DashboardArgs) -> Result<Dashboard> {
    let config = match &args.config {
        Some(path) => {
            let config = DashboardConfig::load(path)?;
            info!(path = %path.display(), variants = config.variants.len(), "loaded dashboard config");
            config
        }
        None => DashboardConfig::default(),
    };

    let overrides = VariantOverrides {
        chain: args.chain.as_deref().map(parse_chain_list),
        stale_policy: args.stale_policy.map(|policy| policy.into_policy()),
        gate_on_upstream: args.gate_on_upstream,
        top_n: args.top_n,
    };
    let variant = resolve_variant(&config, args.variant.as_deref(), &overrides)?;
    let dataset = load_dataset(&args.dataset)?;

    Dashboard::new(dataset, variant)
}

pub(crate) fn renderer(format: OutputFormat, dashboard: &Dashboard) -> Box<dyn ChartRenderer> {
    let top_n = dashboard.variant().top_n;
    match format {
        OutputFormat::Text => Box::new(TextRenderer { top_n }),
        OutputFormat::Json => Box::new(JsonRenderer { top_n }),
    }
}

pub(crate) fn render_to_stdout(renderer: &dyn ChartRenderer, dashboard: &Dashboard) -> Result<()> {
    let mut output = std::io::BufWriter::new(std::io::stdout().lock());
    renderer.render_dashboard(dashboard, &mut output)?;
    output.flush()?;
    Ok(())
}
