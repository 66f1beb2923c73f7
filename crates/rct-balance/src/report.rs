//! Human-facing p-value balance report.

use std::io::Write;

use csv::WriterBuilder;
use rct_core::errors::{ErrorInfo, RctError};
use rct_core::{Assignment, Dataset};
use serde::{Deserialize, Serialize};

use crate::pvalue::PValueBalance;

/// Unreduced p-values with rows `t1..tN` (one per non-baseline arm) and one
/// column per covariate in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Row labels `t1..tN`.
    pub rows: Vec<String>,
    /// Covariate names.
    pub columns: Vec<String>,
    /// `pvalues[row][column]`.
    pub pvalues: Vec<Vec<f64>>,
}

impl BalanceReport {
    /// P-value for a row and covariate label.
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|label| label == row)?;
        let c = self.columns.iter().position(|label| label == column)?;
        Some(self.pvalues[r][c])
    }

    /// Smallest p-value of the table.
    pub fn min_pvalue(&self) -> f64 {
        self.pvalues
            .iter()
            .flatten()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Writes the report as CSV with a leading `arm` column.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), RctError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        let mut header = vec!["arm".to_string()];
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)
            .map_err(|err| wrap_csv("report-csv-header", err))?;
        for (label, row) in self.rows.iter().zip(&self.pvalues) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|p| p.to_string()));
            wtr.write_record(&record)
                .map_err(|err| wrap_csv("report-csv-record", err))?;
        }
        wtr.flush().map_err(|err| {
            RctError::Serde(ErrorInfo::new("report-csv-flush", err.to_string()))
        })
    }
}

/// Unreduced p-value balance of `assignment`, labelled for reporting.
pub fn pvalues_report(dataset: &Dataset, assignment: &Assignment) -> Result<BalanceReport, RctError> {
    let score = PValueBalance::new().pvalues(dataset, assignment)?;
    let (rows, _) = score.shape();
    let pvalues = (0..rows).map(|r| score.row(r).to_vec()).collect();
    Ok(BalanceReport {
        rows: (1..=rows).map(|i| format!("t{i}")).collect(),
        columns: score.columns().to_vec(),
        pvalues,
    })
}

fn wrap_csv(code: &str, err: csv::Error) -> RctError {
    RctError::Serde(ErrorInfo::new(code, err.to_string()))
}
