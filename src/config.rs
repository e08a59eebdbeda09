use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::filter::StalePolicy;
use crate::model::DimensionChain;

pub const DEFAULT_VARIANT: &str = "quest";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_variant_name")]
    pub default_variant: String,
    pub variants: Vec<VariantConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    pub chain: Vec<String>,
    #[serde(default)]
    pub titles: BTreeMap<String, String>,
    #[serde(default)]
    pub stale_policy: StalePolicy,
    #[serde(default)]
    pub gate_on_upstream: bool,
    #[serde(default)]
    pub top_n: Option<usize>,
}

fn default_variant_name() -> String {
    DEFAULT_VARIANT.to_string()
}

impl VariantConfig {
    pub fn dimension_chain(&self) -> Result<DimensionChain> {
        DimensionChain::new(self.chain.iter().cloned())
            .with_context(|| format!("invalid chain for variant '{}'", self.name))
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_variant: default_variant_name(),
            variants: vec![
                VariantConfig {
                    name: "quest".to_string(),
                    chain: [
                        "Test Type",
                        "Quest Number",
                        "Feature Type",
                        "Defect Type",
                        "Labels",
                    ]
                    .map(str::to_string)
                    .to_vec(),
                    titles: BTreeMap::new(),
                    stale_policy: StalePolicy::Retain,
                    gate_on_upstream: false,
                    top_n: None,
                },
                VariantConfig {
                    name: "defect".to_string(),
                    chain: ["Defect Type", "Modified Summary", "Feature Type", "Test Type"]
                        .map(str::to_string)
                        .to_vec(),
                    titles: BTreeMap::new(),
                    stale_policy: StalePolicy::Retain,
                    gate_on_upstream: true,
                    top_n: None,
                },
            ],
        }
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            bail!("dashboard config defines no variants");
        }
        for variant in &self.variants {
            variant.dimension_chain()?;
            if variant.top_n == Some(0) {
                bail!("variant '{}' sets top_n to 0", variant.name);
            }
        }
        if self.variant(&self.default_variant).is_none() {
            bail!("default variant '{}' is not defined", self.default_variant);
        }
        Ok(())
    }

    pub fn variant(&self, name: &str) -> Option<&VariantConfig> {
        self.variants
            .iter()
            .find(|variant| variant.name.eq_ignore_ascii_case(name))
    }

    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.iter().map(|variant| variant.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariantOverrides {
    pub chain: Option<Vec<String>>,
    pub stale_policy: Option<StalePolicy>,
    pub gate_on_upstream: bool,
    pub top_n: Option<usize>,
}

pub fn resolve_variant(
    config: &DashboardConfig,
    name: Option<&str>,
    overrides: &VariantOverrides,
) -> Result<VariantConfig> {
    let name = name.unwrap_or(&config.default_variant);
    let Some(base) = config.variant(name) else {
        bail!(
            "unknown variant '{name}' (available: {})",
            config.variant_names().join(", ")
        );
    };

    let mut variant = base.clone();
    if let Some(chain) = &overrides.chain {
        variant.chain = chain.clone();
    }
    if let Some(policy) = overrides.stale_policy {
        variant.stale_policy = policy;
    }
    if overrides.gate_on_upstream {
        variant.gate_on_upstream = true;
    }
    if overrides.top_n.is_some() {
        variant.top_n = overrides.top_n;
    }

    if variant.top_n == Some(0) {
        bail!("top_n must be at least 1 for variant '{}'", variant.name);
    }
    variant.dimension_chain()?;
    Ok(variant)
}

pub fn parse_chain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
