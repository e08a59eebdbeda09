use std::collections::HashSet;
use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: String,
    pub sha256: Option<String>,
    schema: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(schema: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            source: "<memory>".to_string(),
            sha256: None,
            schema,
            records,
        }
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.schema.iter().any(|name| name == dimension)
    }

    pub fn distinct_count(&self, dimension: &str) -> usize {
        self.records
            .iter()
            .filter_map(|record| record.get(dimension))
            .collect::<HashSet<_>>()
            .len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionChain {
    stages: Vec<String>,
}

impl DimensionChain {
    pub fn new<I, S>(stages: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stages = stages
            .into_iter()
            .map(|stage| stage.into().trim().to_string())
            .collect::<Vec<_>>();

        if stages.is_empty() {
            bail!("dimension chain must contain at least one stage");
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if stage.is_empty() {
                bail!("dimension chain contains a blank stage name");
            }
            if !seen.insert(stage.as_str()) {
                bail!("dimension chain lists '{stage}' more than once");
            }
        }

        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn dimension(&self, stage: usize) -> Option<&str> {
        self.stages.get(stage).map(String::as_str)
    }

    pub fn dimensions(&self) -> &[String] {
        &self.stages
    }

    pub fn position(&self, dimension: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|name| name.eq_ignore_ascii_case(dimension.trim()))
    }

    pub fn resolve(&self, stage: &StageRef) -> Option<usize> {
        match stage {
            StageRef::Index(index) if *index < self.stages.len() => Some(*index),
            StageRef::Index(_) => None,
            StageRef::Name(name) => self.position(name),
        }
    }

    pub fn missing_from<'a>(&'a self, dataset: &Dataset) -> Vec<&'a str> {
        self.stages
            .iter()
            .filter(|stage| !dataset.has_dimension(stage))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StageRef {
    Index(usize),
    Name(String),
}

impl StageRef {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"');
        match trimmed.parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(trimmed.to_string()),
        }
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesEntry {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregatedSeries {
    pub entries: Vec<SeriesEntry>,
}

impl AggregatedSeries {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|entry| entry.count).sum()
    }

    #[cfg(test)]
    pub fn pairs(&self) -> Vec<(&str, usize)> {
        self.entries
            .iter()
            .map(|entry| (entry.category.as_str(), entry.count))
            .collect()
    }

    pub fn max_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.count)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_rejects_empty_and_duplicate_stages() {
        assert!(DimensionChain::new(Vec::<String>::new()).is_err());
        assert!(DimensionChain::new(["Test Type", "Labels", "Test Type"]).is_err());
        assert!(DimensionChain::new(["Test Type", "  "]).is_err());
    }

    #[test]
    fn chain_resolves_index_and_case_insensitive_name() {
        let chain = DimensionChain::new(["Test Type", "Quest Number", "Labels"])
            .expect("chain should build");
        assert_eq!(chain.resolve(&StageRef::Index(1)), Some(1));
        assert_eq!(chain.resolve(&StageRef::Index(3)), None);
        assert_eq!(chain.resolve(&StageRef::Name("quest number".into())), Some(1));
        assert_eq!(chain.resolve(&StageRef::Name("Severity".into())), None);
    }

    #[test]
    fn stage_ref_parse_prefers_numeric_index() {
        assert_eq!(StageRef::parse("2"), StageRef::Index(2));
        assert_eq!(
            StageRef::parse("\"Defect Type\""),
            StageRef::Name("Defect Type".to_string())
        );
    }

    #[test]
    fn chain_reports_dimensions_missing_from_schema() {
        let dataset = Dataset::new(vec!["Test Type".into(), "Defect Type".into()], Vec::new());
        let chain =
            DimensionChain::new(["Test Type", "Labels"]).expect("chain should build");
        assert_eq!(chain.missing_from(&dataset), vec!["Labels"]);
    }

    #[test]
    fn record_lookup_is_by_dimension_name() {
        let record = Record::from_pairs([("Test Type", "UI"), ("Defect Type", "Crash")]);
        assert_eq!(record.get("Defect Type"), Some("Crash"));
        assert_eq!(record.get("Labels"), None);
    }
}
