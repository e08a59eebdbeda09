use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::filtered_len;
use crate::model::{Dataset, DimensionChain, Record};
use crate::util::sha256_hex;


#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalePolicy {
    #[default]
    Retain,
    ClearDownstream,
}

impl StalePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::ClearDownstream => "clear-downstream",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub dimension: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Predicate {
    constraints: Vec<Constraint>,
}

impl Predicate {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_unfiltered(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.constraints
            .iter()
            .all(|constraint| record.get(&constraint.dimension) == Some(constraint.value.as_str()))
    }

    pub fn fingerprint(&self, target: &str) -> String {
        let mut parts = self
            .constraints
            .iter()
            .map(|constraint| format!("{}={}", constraint.dimension, constraint.value))
            .collect::<Vec<_>>();
        parts.sort();
        sha256_hex(&format!("{target}\u{1f}{}", parts.join("\u{1e}")))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, constraint) in self.constraints.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", constraint.dimension, constraint.value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FilterStateMachine {
    chain: DimensionChain,
    selections: Vec<Option<String>>,
    policy: StalePolicy,
    pending: BTreeSet<usize>,
}

impl FilterStateMachine {
    pub fn new(chain: DimensionChain, policy: StalePolicy) -> Self {
        let stages = chain.len();
        Self {
            chain,
            selections: vec![None; stages],
            policy,
            pending: (0..stages).collect(),
        }
    }

    pub fn chain(&self) -> &DimensionChain {
        &self.chain
    }

    pub fn policy(&self) -> StalePolicy {
        self.policy
    }

    pub fn selection(&self, stage: usize) -> Option<&str> {
        self.selections.get(stage).and_then(|value| value.as_deref())
    }

    pub fn selections(&self) -> &[Option<String>] {
        &self.selections
    }

    pub fn record_selection(&mut self, stage: usize, category: Option<String>) {
        let Some(dimension) = self.chain.dimension(stage).map(str::to_owned) else {
            warn!(stage, stages = self.chain.len(), "selection for unknown stage ignored");
            return;
        };

        let next = category.filter(|value| !value.trim().is_empty());
        if self.selections[stage] == next {
            debug!(stage, dimension = %dimension, "selection unchanged");
            return;
        }

        let previous = std::mem::replace(&mut self.selections[stage], next);
        info!(
            stage,
            dimension = %dimension,
            previous = %previous.as_deref().unwrap_or(""),
            current = %self.selection(stage).unwrap_or(""),
            "selection recorded"
        );

        if self.policy == StalePolicy::ClearDownstream {
            for later in stage + 1..self.selections.len() {
                if let Some(dropped) = self.selections[later].take() {
                    info!(stage = later, dropped = %dropped, "downstream selection cleared");
                }
            }
        }

        self.pending.extend(stage + 1..self.selections.len());
    }

    pub fn reset(&mut self) {
        self.selections.iter_mut().for_each(|value| *value = None);
        self.pending.extend(0..self.selections.len());
    }

    pub fn take_pending(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn predicate_for(&self, stage: usize) -> Predicate {
        let constraints = self
            .chain
            .dimensions()
            .iter()
            .zip(&self.selections)
            .take(stage)
            .filter_map(|(dimension, selection)| {
                selection.as_ref().map(|value| Constraint {
                    dimension: dimension.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        Predicate::new(constraints)
    }

    pub fn is_chain_satisfiable(&self, dataset: &Dataset) -> bool {
        (0..self.chain.len()).all(|stage| filtered_len(dataset, &self.predicate_for(stage)) > 0)
    }

    /// Stages whose stored selection no longer occurs under their upstream
    /// filter, whether it went stale after an upstream change or was picked
    /// that way.
    pub fn stale_selections(&self, dataset: &Dataset) -> Vec<usize> {
        (0..self.chain.len())
            .filter(|&stage| {
                let (Some(dimension), Some(selected)) =
                    (self.chain.dimension(stage), self.selection(stage))
                else {
                    return false;
                };
                let predicate = self.predicate_for(stage);
                !dataset.records().iter().any(|record| {
                    predicate.matches(record) && record.get(dimension) == Some(selected)
                })
            })
            .collect()
    }
}
