use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::aggregate::StageOutcome;
use crate::dashboard::{Dashboard, StageView, StatusLine};
use crate::model::SeriesEntry;

const BAR_WIDTH: usize = 40;
const MAX_LABEL_WIDTH: usize = 32;

pub trait ChartRenderer {
    fn render_view(&self, view: &StageView, out: &mut dyn Write) -> Result<()>;

    fn render_status(&self, status: &StatusLine, out: &mut dyn Write) -> Result<()>;

    fn render_dashboard(&self, dashboard: &Dashboard, out: &mut dyn Write) -> Result<()> {
        for view in dashboard.views() {
            self.render_view(view, out)?;
        }
        self.render_status(dashboard.status(), out)
    }
}

pub struct TextRenderer {
    pub top_n: Option<usize>,
}

impl TextRenderer {
    fn visible<'a>(&self, entries: &'a [SeriesEntry]) -> &'a [SeriesEntry] {
        match self.top_n {
            Some(limit) if limit < entries.len() => &entries[..limit],
            _ => entries,
        }
    }
}

impl ChartRenderer for TextRenderer {
    fn render_view(&self, view: &StageView, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "[{}] {}", view.stage, view.title)?;
        writeln!(
            out,
            "    x: {}  y: {}  ({} of {} records)",
            view.x_label, view.y_label, view.matched_records, view.total_records
        )?;

        match &view.outcome {
            StageOutcome::Ready { series } => {
                let entries = self.visible(&series.entries);
                let label_width = entries
                    .iter()
                    .map(|entry| entry.category.chars().count())
                    .max()
                    .unwrap_or(0)
                    .min(MAX_LABEL_WIDTH);
                let max_count = series.max_count().max(1);

                for entry in entries {
                    let bar = (entry.count * BAR_WIDTH).div_ceil(max_count);
                    let marker = if view.selected.as_deref() == Some(entry.category.as_str()) {
                        " *"
                    } else {
                        ""
                    };
                    writeln!(
                        out,
                        "    {:<label_width$} | {} {}{marker}",
                        truncate_label(&entry.category, MAX_LABEL_WIDTH),
                        "#".repeat(bar),
                        entry.count,
                    )?;
                }

                let hidden = series.len() - entries.len();
                if hidden > 0 {
                    writeln!(out, "    ... {hidden} more categories")?;
                }
            }
            StageOutcome::Empty { reason } => {
                writeln!(
                    out,
                    "    (empty chart{})",
                    reason
                        .as_deref()
                        .map(|reason| format!(": {reason}"))
                        .unwrap_or_default()
                )?;
            }
            StageOutcome::Fault { reason } => {
                writeln!(out, "    (empty chart) error: {reason}")?;
            }
        }

        if let Some(selected) = &view.selected {
            writeln!(out, "    selected: {selected}")?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn render_status(&self, status: &StatusLine, out: &mut dyn Write) -> Result<()> {
        let line = status.render();
        if !line.is_empty() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

fn truncate_label(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    let mut truncated = label.chars().take(width.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}

pub struct JsonRenderer {
    pub top_n: Option<usize>,
}

#[derive(Serialize)]
struct JsonDashboard<'a> {
    views: Vec<StageView>,
    status: &'a StatusLine,
}

impl JsonRenderer {
    fn trimmed(&self, view: &StageView) -> StageView {
        let mut view = view.clone();
        if let (Some(limit), StageOutcome::Ready { series }) = (self.top_n, &mut view.outcome) {
            series.entries.truncate(limit);
        }
        view
    }
}

impl ChartRenderer for JsonRenderer {
    fn render_view(&self, view: &StageView, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer(&mut *out, &self.trimmed(view))
            .context("failed to serialize stage view")?;
        writeln!(out)?;
        Ok(())
    }

    fn render_status(&self, status: &StatusLine, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer(&mut *out, status).context("failed to serialize status")?;
        writeln!(out)?;
        Ok(())
    }

    fn render_dashboard(&self, dashboard: &Dashboard, out: &mut dyn Write) -> Result<()> {
        let document = JsonDashboard {
            views: dashboard
                .views()
                .iter()
                .map(|view| self.trimmed(view))
                .collect(),
            status: dashboard.status(),
        };
        serde_json::to_writer_pretty(&mut *out, &document)
            .context("failed to serialize dashboard json output")?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::COUNT_LABEL;
    use crate::model::AggregatedSeries;

    fn view(outcome: StageOutcome, selected: Option<&str>) -> StageView {
        StageView {
            stage: 1,
            dimension: "Defect Type".to_string(),
            title: "Defect Type Distribution for Test Type: UI".to_string(),
            x_label: "Defect Type".to_string(),
            y_label: COUNT_LABEL.to_string(),
            selected: selected.map(str::to_string),
            matched_records: 3,
            total_records: 10,
            outcome,
        }
    }

    fn ready(pairs: &[(&str, usize)]) -> StageOutcome {
        StageOutcome::Ready {
            series: AggregatedSeries {
                entries: pairs
                    .iter()
                    .map(|(category, count)| SeriesEntry {
                        category: category.to_string(),
                        count: *count,
                    })
                    .collect(),
            },
        }
    }

    fn render_text(renderer: &TextRenderer, view: &StageView) -> String {
        let mut out = Vec::new();
        renderer.render_view(view, &mut out).expect("render should succeed");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn text_chart_scales_bars_and_marks_selection() {
        let renderer = TextRenderer { top_n: None };
        let text = render_text(&renderer, &view(ready(&[("Crash", 2), ("Hang", 1)]), Some("Hang")));

        assert!(text.starts_with("[1] Defect Type Distribution for Test Type: UI\n"));
        assert!(text.contains("(3 of 10 records)"));
        assert!(text.contains(&format!("Crash | {} 2\n", "#".repeat(BAR_WIDTH))));
        assert!(text.contains(&format!("Hang  | {} 1 *\n", "#".repeat(BAR_WIDTH / 2))));
        assert!(text.contains("selected: Hang"));
    }

    #[test]
    fn text_chart_truncates_to_top_n() {
        let renderer = TextRenderer { top_n: Some(1) };
        let text = render_text(&renderer, &view(ready(&[("Crash", 2), ("Hang", 1)]), None));
        assert!(!text.contains("Hang"));
        assert!(text.contains("... 1 more categories"));
    }

    #[test]
    fn empty_and_fault_render_as_empty_charts() {
        let renderer = TextRenderer { top_n: None };
        let empty = render_text(
            &renderer,
            &view(
                StageOutcome::Empty {
                    reason: Some("no records match Test Type: API".to_string()),
                },
                None,
            ),
        );
        assert!(empty.contains("(empty chart: no records match Test Type: API)"));

        let fault = render_text(
            &renderer,
            &view(
                StageOutcome::Fault {
                    reason: "dimension 'Labels' is not a column of the dataset".to_string(),
                },
                None,
            ),
        );
        assert!(fault.contains("(empty chart) error: dimension 'Labels'"));
    }

    #[test]
    fn long_labels_are_truncated() {
        let label = "x".repeat(MAX_LABEL_WIDTH + 10);
        let truncated = truncate_label(&label, MAX_LABEL_WIDTH);
        assert_eq!(truncated.chars().count(), MAX_LABEL_WIDTH);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn json_view_is_one_line_with_trimmed_series() {
        let renderer = JsonRenderer { top_n: Some(1) };
        let mut out = Vec::new();
        renderer
            .render_view(&view(ready(&[("Crash", 2), ("Hang", 1)]), None), &mut out)
            .expect("render should succeed");
        let text = String::from_utf8(out).expect("utf8 output");
        assert_eq!(text.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["series"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["title"], "Defect Type Distribution for Test Type: UI");
    }
}
