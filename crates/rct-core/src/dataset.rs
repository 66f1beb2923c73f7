//! Unit by covariate table consumed by balance objectives.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{ErrorInfo, RctError};

/// Values of a single covariate, one per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum Covariate {
    /// Complete real valued covariate.
    Numeric(Vec<f64>),
    /// Discrete labelled covariate.
    Categorical(Vec<String>),
}

impl Covariate {
    /// Number of units covered by the covariate.
    pub fn len(&self) -> usize {
        match self {
            Covariate::Numeric(values) => values.len(),
            Covariate::Categorical(values) => values.len(),
        }
    }

    /// Returns `true` when the covariate has no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps every unit to the index of its level among the sorted distinct
    /// levels of the covariate. Returns `(level_per_unit, level_count)`.
    pub fn level_indices(&self) -> (Vec<usize>, usize) {
        match self {
            Covariate::Numeric(values) => {
                let mut levels = values.clone();
                levels.sort_by(f64::total_cmp);
                levels.dedup_by(|a, b| a.total_cmp(b).is_eq());
                let per_unit = values
                    .iter()
                    .map(|value| {
                        levels
                            .binary_search_by(|level| level.total_cmp(value))
                            .unwrap_or_default()
                    })
                    .collect();
                (per_unit, levels.len())
            }
            Covariate::Categorical(values) => {
                let levels: Vec<&str> = values
                    .iter()
                    .map(String::as_str)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let per_unit = values
                    .iter()
                    .map(|value| {
                        levels
                            .binary_search(&value.as_str())
                            .unwrap_or_default()
                    })
                    .collect();
                (per_unit, levels.len())
            }
        }
    }
}

/// Named covariate column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column header.
    pub name: String,
    /// Per-unit values.
    pub values: Covariate,
}

/// Immutable table of experimental units and their covariates.
///
/// Units are identified by their row index `0..len()`. The `content_hash`
/// ties design seeds to the literal source bytes when the table was loaded
/// from bytes or a file, and is `0` for tables assembled in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    units: usize,
    content_hash: u64,
    digest: String,
}

impl Dataset {
    /// Builds an in-memory dataset from named columns.
    pub fn new(columns: Vec<(String, Covariate)>) -> Result<Self, RctError> {
        let units = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut seen = BTreeSet::new();
        let mut built = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if !seen.insert(name.clone()) {
                return Err(RctError::Dataset(
                    ErrorInfo::new("dataset-duplicate-column", "column names must be unique")
                        .with_context("column", &name),
                ));
            }
            if values.len() != units {
                return Err(RctError::Dataset(
                    ErrorInfo::new("dataset-ragged-column", "column length differs from unit count")
                        .with_context("column", &name)
                        .with_context("expected", units)
                        .with_context("actual", values.len()),
                ));
            }
            built.push(Column { name, values });
        }
        Ok(Self {
            columns: built,
            units,
            content_hash: 0,
            digest: String::new(),
        })
    }

    /// Convenience constructor for purely numeric tables.
    pub fn from_numeric<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Vec<f64>)>,
    ) -> Result<Self, RctError> {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| (name.into(), Covariate::Numeric(values)))
                .collect(),
        )
    }

    /// Parses CSV bytes (header row, one row per unit) and records their hash.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, RctError> {
        let mut dataset = Self::from_csv_reader(bytes)?;
        let digest = Sha256::digest(bytes);
        let mut low = [0u8; 8];
        low.copy_from_slice(&digest[digest.len() - 8..]);
        dataset.content_hash = u64::from_be_bytes(low);
        dataset.digest = format!("{:x}", digest);
        Ok(dataset)
    }

    /// Loads a CSV file; the seed is tied to the file's bytes.
    pub fn from_csv_path(path: &Path) -> Result<Self, RctError> {
        let bytes = fs::read(path).map_err(|err| {
            RctError::Dataset(
                ErrorInfo::new("dataset-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_csv_bytes(&bytes)
    }

    /// Parses CSV from a reader without recording a content hash.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, RctError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|err| wrap_csv("dataset-csv-header", err))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record.map_err(|err| wrap_csv("dataset-csv-record", err))?;
            if record.len() != headers.len() {
                return Err(RctError::Dataset(
                    ErrorInfo::new("dataset-csv-width", "record width differs from header")
                        .with_context("row", row)
                        .with_context("expected", headers.len())
                        .with_context("actual", record.len()),
                ));
            }
            for (column, field) in raw.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }
        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, fields)| (name, infer_covariate(fields)))
            .collect();
        Self::new(columns)
    }

    /// Number of units (rows).
    pub fn len(&self) -> usize {
        self.units
    }

    /// Returns `true` when the dataset contains no units.
    pub fn is_empty(&self) -> bool {
        self.units == 0
    }

    /// Hash of the source bytes folded into design seeds.
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Hex digest of the source bytes (empty for in-memory datasets).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// All columns in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column headers in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column, RctError> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| {
                RctError::Dataset(
                    ErrorInfo::new("dataset-unknown-column", "no column with this name")
                        .with_context("column", name),
                )
            })
    }

    /// Resolves an optional column selection; `None` selects every column.
    pub fn select(&self, names: Option<&[String]>) -> Result<Vec<&Column>, RctError> {
        match names {
            None => Ok(self.columns.iter().collect()),
            Some(names) => names.iter().map(|name| self.column(name)).collect(),
        }
    }

    /// Returns the values of a numeric column.
    pub fn numeric(&self, name: &str) -> Result<&[f64], RctError> {
        match &self.column(name)?.values {
            Covariate::Numeric(values) => Ok(values),
            Covariate::Categorical(_) => Err(RctError::Dataset(
                ErrorInfo::new("dataset-not-numeric", "column is categorical")
                    .with_context("column", name)
                    .with_hint("numeric objectives need complete numeric covariates"),
            )),
        }
    }
}

fn infer_covariate(fields: Vec<String>) -> Covariate {
    let parsed: Option<Vec<f64>> = fields
        .iter()
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
        })
        .collect();
    match parsed {
        Some(values) => Covariate::Numeric(values),
        None => Covariate::Categorical(fields),
    }
}

fn wrap_csv(code: &str, err: csv::Error) -> RctError {
    RctError::Dataset(ErrorInfo::new(code, err.to_string()))
}
