use std::collections::HashMap;

use serde::Serialize;

use crate::filter::Predicate;
use crate::model::{AggregatedSeries, Dataset, SeriesEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Ready { series: AggregatedSeries },
    Empty { reason: Option<String> },
    Fault { reason: String },
}

impl StageOutcome {
    #[cfg(test)]
    pub fn series(&self) -> Option<&AggregatedSeries> {
        match self {
            Self::Ready { series } => Some(series),
            Self::Empty { .. } | Self::Fault { .. } => None,
        }
    }

    pub fn fault(&self) -> Option<&str> {
        match self {
            Self::Fault { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Empty { .. } => "empty",
            Self::Fault { .. } => "fault",
        }
    }
}

/// Value counts of `target` over rows matching `predicate`, by descending
/// count with first-seen order kept among ties. Never fails: an unknown
/// target or an empty filter gives an empty series.
pub fn aggregate(dataset: &Dataset, predicate: &Predicate, target: &str) -> AggregatedSeries {
    if !dataset.has_dimension(target) {
        return AggregatedSeries::default();
    }

    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<SeriesEntry> = Vec::new();

    for record in dataset.records() {
        if !predicate.matches(record) {
            continue;
        }
        let Some(value) = record.get(target) else {
            continue;
        };
        match slots.get(value) {
            Some(&slot) => entries[slot].count += 1,
            None => {
                slots.insert(value, entries.len());
                entries.push(SeriesEntry {
                    category: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so ties stay in first-seen order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    AggregatedSeries { entries }
}

pub fn filtered_len(dataset: &Dataset, predicate: &Predicate) -> usize {
    dataset
        .records()
        .iter()
        .filter(|record| predicate.matches(record))
        .count()
}

pub fn compute_stage(dataset: &Dataset, predicate: &Predicate, target: &str) -> StageOutcome {
    if !dataset.has_dimension(target) {
        return StageOutcome::Fault {
            reason: format!("dimension '{target}' is not a column of the dataset"),
        };
    }

    if let Some(missing) = predicate
        .constraints()
        .iter()
        .find(|constraint| !dataset.has_dimension(&constraint.dimension))
    {
        return StageOutcome::Fault {
            reason: format!(
                "filter dimension '{}' is not a column of the dataset",
                missing.dimension
            ),
        };
    }

    let series = aggregate(dataset, predicate, target);
    if series.is_empty() {
        StageOutcome::Empty {
            reason: Some(if predicate.is_unfiltered() {
                "no records".to_string()
            } else {
                format!("no records match {predicate}")
            }),
        }
    } else {
        StageOutcome::Ready { series }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Constraint;
    use crate::model::Record;

    fn dataset(rows: &[(&str, &str)]) -> Dataset {
        Dataset::new(
            vec!["Feature Type".to_string(), "Defect Type".to_string()],
            rows.iter()
                .map(|(feature, defect)| {
                    Record::from_pairs([("Feature Type", *feature), ("Defect Type", *defect)])
                })
                .collect(),
        )
    }

    fn only(dimension: &str, value: &str) -> Predicate {
        Predicate::new(vec![Constraint {
            dimension: dimension.to_string(),
            value: value.to_string(),
        }])
    }

    #[test]
    fn counts_sum_to_filtered_size() {
        let ds = dataset(&[
            ("Login", "Crash"),
            ("Login", "Hang"),
            ("Search", "Crash"),
            ("Login", "Crash"),
            ("Search", "Typo"),
        ]);
        for predicate in [
            Predicate::default(),
            only("Feature Type", "Login"),
            only("Defect Type", "Crash"),
            only("Feature Type", "Checkout"),
        ] {
            for target in ["Feature Type", "Defect Type"] {
                let series = aggregate(&ds, &predicate, target);
                assert_eq!(series.total(), filtered_len(&ds, &predicate));
            }
        }
    }

    #[test]
    fn ranks_by_count_then_first_seen() {
        let ds = dataset(&[
            ("Login", "Typo"),
            ("Login", "Hang"),
            ("Login", "Crash"),
            ("Login", "Crash"),
            ("Login", "Hang"),
        ]);
        let series = aggregate(&ds, &Predicate::default(), "Defect Type");
        assert_eq!(series.pairs(), vec![("Hang", 2), ("Crash", 2), ("Typo", 1)]);
    }

    #[test]
    fn empty_filter_and_unknown_target_give_empty_series() {
        let ds = dataset(&[("Login", "Crash")]);
        assert!(aggregate(&ds, &only("Feature Type", "Search"), "Defect Type").is_empty());
        assert!(aggregate(&ds, &Predicate::default(), "Labels").is_empty());
    }

    #[test]
    fn rows_without_target_value_are_skipped() {
        let ds = Dataset::new(
            vec!["Feature Type".to_string(), "Defect Type".to_string()],
            vec![
                Record::from_pairs([("Feature Type", "Login")]),
                Record::from_pairs([("Feature Type", "Login"), ("Defect Type", "Crash")]),
            ],
        );
        let series = aggregate(&ds, &Predicate::default(), "Defect Type");
        assert_eq!(series.pairs(), vec![("Crash", 1)]);
    }

    #[test]
    fn compute_stage_classifies_outcomes() {
        let ds = dataset(&[("Login", "Crash")]);

        let ready = compute_stage(&ds, &Predicate::default(), "Defect Type");
        assert_eq!(ready.as_str(), "ready");

        let empty = compute_stage(&ds, &only("Feature Type", "Search"), "Defect Type");
        assert_eq!(
            empty,
            StageOutcome::Empty {
                reason: Some("no records match Feature Type: Search".to_string())
            }
        );

        let missing_target = compute_stage(&ds, &Predicate::default(), "Labels");
        assert!(missing_target.fault().is_some_and(|reason| reason.contains("Labels")));

        let missing_filter = compute_stage(&ds, &only("Quest Number", "3"), "Defect Type");
        assert!(missing_filter.fault().is_some_and(|reason| reason.contains("Quest Number")));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ds = dataset(&[("Login", "Crash")]);
        let outcome = compute_stage(&ds, &Predicate::default(), "Feature Type");
        let value = serde_json::to_value(&outcome).expect("outcome should serialize");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["series"][0]["category"], "Login");
        assert_eq!(value["series"][0]["count"], 1);
    }
}
