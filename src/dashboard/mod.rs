use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::aggregate::{StageOutcome, compute_stage, filtered_len};
use crate::config::VariantConfig;
use crate::event::resolve_click;
use crate::filter::{FilterStateMachine, Predicate, StalePolicy};
use crate::model::{Dataset, StageRef};
use crate::util::now_utc_string;

mod view;

pub use view::{COUNT_LABEL, StageView, StatusLine};

use view::stage_title;

// Memo entries are cheap, but a long session should not grow without bound.
const MEMO_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
struct MemoEntry {
    outcome: StageOutcome,
    matched: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoStats {
    pub hits: usize,
    pub misses: usize,
}

pub struct Dashboard {
    dataset: Dataset,
    variant: VariantConfig,
    machine: FilterStateMachine,
    memo: HashMap<String, MemoEntry>,
    memo_stats: MemoStats,
    // Malformed click payloads, keyed by the stage that received them.
    event_faults: BTreeMap<usize, String>,
    dirty: BTreeSet<usize>,
    views: Vec<StageView>,
    status: StatusLine,
}

impl Dashboard {
    pub fn new(dataset: Dataset, variant: VariantConfig) -> Result<Self> {
        let chain = variant.dimension_chain()?;
        for missing in chain.missing_from(&dataset) {
            warn!(
                dimension = %missing,
                variant = %variant.name,
                "chain dimension is not a dataset column"
            );
        }

        let machine = FilterStateMachine::new(chain, variant.stale_policy);
        let mut dashboard = Self {
            dataset,
            variant,
            machine,
            memo: HashMap::new(),
            memo_stats: MemoStats::default(),
            event_faults: BTreeMap::new(),
            dirty: BTreeSet::new(),
            views: Vec::new(),
            status: StatusLine::Idle,
        };

        let stages = dashboard.machine.take_pending();
        for stage in stages {
            let view = dashboard.compute_view(stage);
            dashboard.views.push(view);
        }

        info!(
            variant = %dashboard.variant.name,
            stages = dashboard.stage_count(),
            policy = dashboard.machine.policy().as_str(),
            "dashboard ready"
        );

        Ok(dashboard)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn variant(&self) -> &VariantConfig {
        &self.variant
    }

    pub fn machine(&self) -> &FilterStateMachine {
        &self.machine
    }

    pub fn stage_count(&self) -> usize {
        self.machine.chain().len()
    }

    pub fn views(&self) -> &[StageView] {
        &self.views
    }

    #[cfg(test)]
    pub fn view(&self, stage: usize) -> Option<&StageView> {
        self.views.get(stage)
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn memo_stats(&self) -> MemoStats {
        self.memo_stats
    }

    pub fn resolve_stage(&self, stage: &StageRef) -> Result<usize> {
        match self.machine.chain().resolve(stage) {
            Some(index) => Ok(index),
            None => bail!(
                "unknown stage {stage} (chain: {})",
                self.machine.chain().dimensions().join(" -> ")
            ),
        }
    }

    pub fn handle_click(&mut self, stage: usize, payload: &Value) -> Vec<usize> {
        match resolve_click(payload) {
            Ok(category) => self.select(stage, category),
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(stage, reason = %reason, "malformed click event");
                self.event_faults.insert(stage, reason.clone());
                if stage + 1 < self.stage_count() {
                    self.dirty.insert(stage + 1);
                }
                self.status = StatusLine::Error(reason);
                self.refresh()
            }
        }
    }

    pub fn select(&mut self, stage: usize, category: Option<String>) -> Vec<usize> {
        if stage >= self.stage_count() {
            warn!(stage, stages = self.stage_count(), "selection for unknown stage ignored");
            return Vec::new();
        }

        if self.event_faults.remove(&stage).is_some() && stage + 1 < self.stage_count() {
            self.dirty.insert(stage + 1);
        }

        self.machine.record_selection(stage, category);
        let current = self.machine.selection(stage).map(str::to_owned);
        self.status = StatusLine::Selected(current.clone().unwrap_or_default());
        if let Some(view) = self.views.get_mut(stage) {
            view.selected = current;
        }

        let stale = self.machine.stale_selections(&self.dataset);
        if !stale.is_empty() {
            warn!(stages = ?stale, "selections no longer match their upstream filter");
        }

        self.refresh()
    }

    pub fn reset(&mut self) -> Vec<usize> {
        self.machine.reset();
        self.event_faults.clear();
        self.status = StatusLine::Idle;
        info!("selections reset");
        self.refresh()
    }

    pub fn is_chain_satisfiable(&self) -> bool {
        self.machine.is_chain_satisfiable(&self.dataset)
    }

    pub fn refresh(&mut self) -> Vec<usize> {
        let mut stages = self.machine.take_pending().into_iter().collect::<BTreeSet<_>>();
        stages.append(&mut self.dirty);

        for &stage in &stages {
            let view = self.compute_view(stage);
            match self.views.get_mut(stage) {
                Some(slot) => *slot = view,
                None => self.views.push(view),
            }
        }

        let stages = stages.into_iter().collect::<Vec<_>>();
        debug!(stages = ?stages, "stage views recomputed");
        stages
    }

    fn compute_view(&mut self, stage: usize) -> StageView {
        let dimension = self
            .machine
            .chain()
            .dimension(stage)
            .unwrap_or_default()
            .to_string();
        let predicate = self.machine.predicate_for(stage);
        let (outcome, matched_records) = self.stage_outcome(stage, &dimension, &predicate);

        StageView {
            stage,
            title: stage_title(&dimension, &predicate, &self.variant.titles),
            x_label: dimension.clone(),
            y_label: COUNT_LABEL.to_string(),
            dimension,
            selected: self.machine.selection(stage).map(str::to_owned),
            matched_records,
            total_records: self.dataset.len(),
            outcome,
        }
    }

    fn stage_outcome(
        &mut self,
        stage: usize,
        dimension: &str,
        predicate: &Predicate,
    ) -> (StageOutcome, usize) {
        if let Some(reason) = stage
            .checked_sub(1)
            .and_then(|upstream| self.event_faults.get(&upstream))
        {
            return (
                StageOutcome::Fault {
                    reason: reason.clone(),
                },
                0,
            );
        }

        if self.variant.gate_on_upstream && stage > 0 && self.machine.selection(stage - 1).is_none()
        {
            let upstream = self.machine.chain().dimension(stage - 1).unwrap_or_default();
            return (
                StageOutcome::Empty {
                    reason: Some(format!("select a {upstream} to populate this chart")),
                },
                0,
            );
        }

        let fingerprint = predicate.fingerprint(dimension);
        if let Some(entry) = self.memo.get(&fingerprint) {
            self.memo_stats.hits += 1;
            debug!(stage, dimension = %dimension, "memo hit");
            return (entry.outcome.clone(), entry.matched);
        }

        self.memo_stats.misses += 1;
        let outcome = compute_stage(&self.dataset, predicate, dimension);
        let matched = filtered_len(&self.dataset, predicate);
        if let Some(reason) = outcome.fault() {
            warn!(stage, dimension = %dimension, reason = %reason, "stage fault");
        }
        debug!(
            stage,
            dimension = %dimension,
            outcome = outcome.as_str(),
            matched,
            "stage computed"
        );

        if self.memo.len() >= MEMO_CAPACITY {
            self.memo.clear();
        }
        self.memo.insert(
            fingerprint,
            MemoEntry {
                outcome: outcome.clone(),
                matched,
            },
        );

        (outcome, matched)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let chain = self.machine.chain();
        DashboardSnapshot {
            generated_at: now_utc_string(),
            dataset: DatasetSummary {
                source: self.dataset.source.clone(),
                sha256: self.dataset.sha256.clone(),
                rows: self.dataset.len(),
            },
            variant: self.variant.name.clone(),
            chain: chain.dimensions().to_vec(),
            stale_policy: self.machine.policy(),
            selections: self
                .machine
                .selections()
                .iter()
                .enumerate()
                .map(|(stage, category)| SelectionEntry {
                    stage,
                    dimension: chain.dimension(stage).unwrap_or_default().to_string(),
                    category: category.clone(),
                })
                .collect(),
            satisfiable: self.is_chain_satisfiable(),
            stale_stages: self.machine.stale_selections(&self.dataset),
            status: self.status.clone(),
            memo: self.memo_stats,
            views: self.views.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub source: String,
    pub sha256: Option<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionEntry {
    pub stage: usize,
    pub dimension: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: String,
    pub dataset: DatasetSummary,
    pub variant: String,
    pub chain: Vec<String>,
    pub stale_policy: StalePolicy,
    pub selections: Vec<SelectionEntry>,
    pub satisfiable: bool,
    pub stale_stages: Vec<usize>,
    pub status: StatusLine,
    pub memo: MemoStats,
    pub views: Vec<StageView>,
}
