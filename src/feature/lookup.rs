//! Type-membership lookup abstraction.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Source of type tags for entities.
///
/// Abstracts the external knowledge-base client. Implementations report
/// failure per entity; a failed lookup never aborts a whole extraction run.
pub trait TypeLookup {
    /// Return the type tags currently associated with an entity.
    fn types_for(&self, entity_id: &str) -> Result<Vec<String>>;
}

/// A recorded per-entity lookup failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupFailure {
    /// Entity identifier whose lookup failed.
    pub entity_id: String,
    /// Index of the entity in the ordered sequence.
    pub index: usize,
    /// Failure description.
    pub reason: String,
}

/// In-memory type table, loadable from TSV.
///
/// Entities absent from the table simply have no tags; that is not a
/// lookup failure.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    tags: HashMap<String, Vec<String>>,
}

impl TypeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a type table from a TSV file.
    ///
    /// Expected format: a header line, then `entity_id<TAB>tag` rows, one
    /// row per (entity, tag) pair.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        lines.next().transpose()?;

        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        for line_result in lines {
            let line = line_result?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(2, '\t');
            let entity = fields.next().unwrap_or("");
            if let Some(tag) = fields.next() {
                tags.entry(entity.to_string())
                    .or_default()
                    .push(tag.trim().to_string());
            }
        }
        Ok(Self { tags })
    }

    /// Associate a set of tags with an entity, replacing any existing set.
    pub fn insert(&mut self, entity_id: &str, entity_tags: Vec<String>) {
        self.tags.insert(entity_id.to_string(), entity_tags);
    }

    /// Number of entities with at least one tag.
    pub fn n_entities(&self) -> usize {
        self.tags.len()
    }
}

impl TypeLookup for TypeTable {
    fn types_for(&self, entity_id: &str) -> Result<Vec<String>> {
        Ok(self.tags.get(entity_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "entity_id\ttag").unwrap();
        writeln!(file, "France\tCountry").unwrap();
        writeln!(file, "France\tPlace").unwrap();
        writeln!(file, "Paris\tCity").unwrap();
        file.flush().unwrap();

        let table = TypeTable::from_tsv(file.path()).unwrap();
        assert_eq!(table.n_entities(), 2);
        assert_eq!(
            table.types_for("France").unwrap(),
            vec!["Country".to_string(), "Place".to_string()]
        );
    }

    #[test]
    fn test_missing_entity_has_no_tags() {
        let table = TypeTable::new();
        assert!(table.types_for("nowhere").unwrap().is_empty());
    }
}
