//! Parallel entity/value table for numeric attribute data.

use crate::error::{OutlierError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A record that could not be parsed while loading an attribute table.
///
/// Malformed rows are skipped, never inserted into the table, and reported
/// back to the caller as a side list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseFailure {
    /// Entity identifier of the offending row (empty if the row had none).
    pub entity_id: String,
    /// Raw value text that failed to parse.
    pub raw_value: String,
    /// Zero-based row index in the source file (excluding the header).
    pub row: usize,
}

/// A numeric attribute dataset: one scalar value per entity.
///
/// Entity identifiers and values are parallel arrays sharing the index space
/// used by every downstream stage (feature rows, cluster labels, outlier
/// index sets).
#[derive(Debug, Clone)]
pub struct AttributeTable {
    entity_ids: Vec<String>,
    values: Vec<f64>,
}

impl AttributeTable {
    /// Create a table from parallel identifier and value arrays.
    pub fn new(entity_ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if entity_ids.len() != values.len() {
            return Err(OutlierError::DimensionMismatch {
                expected: entity_ids.len(),
                actual: values.len(),
            });
        }
        Ok(Self { entity_ids, values })
    }

    /// Load an attribute table from a TSV file.
    ///
    /// Expected format: a header line, then `entity_id<TAB>value` rows.
    /// Rows whose value does not parse as a number are skipped and returned
    /// in the failure list; they never occupy an index in the table.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<ParseFailure>)> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        lines
            .next()
            .ok_or_else(|| OutlierError::EmptyData("Empty TSV file".to_string()))??;

        let mut entity_ids = Vec::new();
        let mut values = Vec::new();
        let mut failures = Vec::new();

        for (row, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(2, '\t');
            let entity_id = fields.next().unwrap_or("").to_string();
            let raw_value = fields.next().unwrap_or("").trim();

            match raw_value.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    entity_ids.push(entity_id);
                    values.push(v);
                }
                _ => failures.push(ParseFailure {
                    entity_id,
                    raw_value: raw_value.to_string(),
                    row,
                }),
            }
        }

        if entity_ids.is_empty() {
            return Err(OutlierError::EmptyData(
                "No parsable rows in TSV".to_string(),
            ));
        }

        Ok((Self { entity_ids, values }, failures))
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "entity_id\tvalue")?;
        for (id, v) in self.entity_ids.iter().zip(&self.values) {
            writeln!(writer, "{}\t{}", id, v)?;
        }
        Ok(())
    }

    /// Number of entities.
    pub fn n_entities(&self) -> usize {
        self.entity_ids.len()
    }

    /// Entity identifiers, in dataset order.
    pub fn entity_ids(&self) -> &[String] {
        &self.entity_ids
    }

    /// Numeric attribute values, parallel to `entity_ids`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up the identifier at a given index.
    pub fn entity_at(&self, index: usize) -> Option<&str> {
        self.entity_ids.get(index).map(|s| s.as_str())
    }
}
