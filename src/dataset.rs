use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::model::{Dataset, Record};
use crate::util::sha256_file;

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))?;

    let mut dataset =
        read_dataset(file).with_context(|| format!("failed to parse dataset {}", path.display()))?;
    dataset.source = path.display().to_string();
    dataset.sha256 = Some(sha256_file(path)?);

    info!(
        path = %path.display(),
        rows = dataset.len(),
        dimensions = dataset.schema().len(),
        "loaded dataset"
    );

    Ok(dataset)
}

pub fn read_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().context("failed to read header row")?;
    let schema = headers
        .iter()
        .map(|name| name.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    if schema.iter().all(String::is_empty) {
        bail!("dataset has no header row");
    }

    let mut seen = HashSet::new();
    for name in &schema {
        if !name.is_empty() && !seen.insert(name.as_str()) {
            bail!("dataset header repeats column '{name}'");
        }
    }

    let mut records = Vec::new();
    let mut short_rows = 0_usize;
    for (index, row) in csv_reader.records().enumerate() {
        let row = row.with_context(|| format!("failed to read data row {}", index + 1))?;
        if row.len() < schema.len() {
            short_rows += 1;
        }
        let record = Record::from_pairs(
            schema
                .iter()
                .zip(row.iter())
                .filter(|(name, value)| !name.is_empty() && !value.is_empty())
                .map(|(name, value)| (name.as_str(), value)),
        );
        records.push(record);
    }

    if short_rows > 0 {
        warn!(short_rows, "rows with fewer fields than the header");
    }

    let schema = schema.into_iter().filter(|name| !name.is_empty()).collect();
    Ok(Dataset::new(schema, records))
}
