use std::collections::BTreeMap;

use serde::Serialize;

use crate::aggregate::StageOutcome;
use crate::filter::Predicate;

pub const COUNT_LABEL: &str = "Count";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub stage: usize,
    pub dimension: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub selected: Option<String>,
    pub matched_records: usize,
    pub total_records: usize,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

pub(super) fn stage_title(
    dimension: &str,
    predicate: &Predicate,
    overrides: &BTreeMap<String, String>,
) -> String {
    let base = overrides
        .get(dimension)
        .cloned()
        .unwrap_or_else(|| format!("{dimension} Distribution"));

    if predicate.is_unfiltered() {
        base
    } else {
        format!("{base} for {predicate}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum StatusLine {
    #[default]
    Idle,
    Selected(String),
    Error(String),
}

impl StatusLine {
    pub fn render(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::Selected(category) => format!("Selected Category: {category}"),
            Self::Error(reason) => format!("Error: {reason}"),
        }
    }
}
