//! Loading jurisdiction tax rates from CSV.
//!
//! Expected header:
//! `jurisdiction,combined_rate,method,trade_in_reduces_base,fees_taxable,rebates_taxable`.
//! The three rule columns are optional and default to false.

use crate::db::Repository;
use crate::domain::{Decimal, TaxMethod, TaxProfile, TaxRules};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv parse error at line {line}: {message}")]
    Csv { line: u64, message: String },
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, serde::Deserialize)]
struct Row {
    jurisdiction: String,
    combined_rate: String,
    method: String,
    #[serde(default)]
    trade_in_reduces_base: Option<String>,
    #[serde(default)]
    fees_taxable: Option<String>,
    #[serde(default)]
    rebates_taxable: Option<String>,
}

fn parse_flag(value: Option<&str>) -> Result<bool, String> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "1" | "yes" | "y") => Ok(true),
        Some("false" | "0" | "no" | "n") => Ok(false),
        Some(other) => Err(format!("invalid flag: {}", other)),
    }
}

/// Parse tax profiles from CSV bytes.
pub fn parse_tax_rates(csv_bytes: &[u8]) -> Result<Vec<TaxProfile>, SeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_bytes);

    let mut profiles = Vec::new();
    for (index, record) in reader.deserialize::<Row>().enumerate() {
        // header is line 1
        let line = index as u64 + 2;
        let row = record.map_err(|e| SeedError::Csv {
            line,
            message: e.to_string(),
        })?;
        let csv_err = |message: String| SeedError::Csv { line, message };

        if row.jurisdiction.is_empty() {
            return Err(csv_err("empty jurisdiction".to_string()));
        }
        let combined_rate = Decimal::from_str_canonical(&row.combined_rate)
            .map_err(|e| csv_err(format!("invalid combined_rate: {}", e)))?;
        if combined_rate.is_negative() {
            return Err(csv_err(format!("negative combined_rate: {}", combined_rate)));
        }
        let method = row.method.parse::<TaxMethod>().map_err(csv_err)?;

        profiles.push(TaxProfile {
            jurisdiction: row.jurisdiction,
            combined_rate,
            method,
            rules: TaxRules {
                trade_in_reduces_base: parse_flag(row.trade_in_reduces_base.as_deref())
                    .map_err(csv_err)?,
                fees_taxable: parse_flag(row.fees_taxable.as_deref()).map_err(csv_err)?,
                rebates_taxable: parse_flag(row.rebates_taxable.as_deref()).map_err(csv_err)?,
            },
        });
    }

    Ok(profiles)
}

/// Read tax profiles from a CSV file.
pub fn load_tax_rates_csv(path: impl AsRef<Path>) -> Result<Vec<TaxProfile>, SeedError> {
    let bytes = std::fs::read(path)?;
    parse_tax_rates(&bytes)
}

/// Load a CSV file into the `tax_rates` table, replacing rows for the same jurisdiction.
///
/// Returns the number of profiles written.
pub async fn seed_tax_rates(repo: &Repository, path: impl AsRef<Path>) -> Result<usize, SeedError> {
    let path = path.as_ref();
    let profiles = load_tax_rates_csv(path)?;
    for profile in &profiles {
        repo.upsert_tax_rate(profile).await?;
    }
    info!("Seeded {} tax rate(s) from {}", profiles.len(), path.display());
    Ok(profiles.len())
}
