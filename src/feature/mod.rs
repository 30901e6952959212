//! Categorical type-tag feature extraction.
//!
//! Turns per-entity type tags into a fixed-width binary feature matrix.
//! Tags that are too common or too rare under the discard policy contribute
//! no column; retained tags get contiguous indices in first-seen order.

mod lookup;
mod matrix;
mod vocabulary;

pub use lookup::{LookupFailure, TypeLookup, TypeTable};
pub use matrix::TypeMatrix;
pub use vocabulary::{FeatureIndexMap, TagVocabulary};

use crate::error::Result;
use sprs::TriMat;

/// Output of feature extraction over an ordered entity sequence.
#[derive(Debug, Clone)]
pub struct FeatureExtraction {
    /// Binary entities × retained-features matrix.
    pub matrix: TypeMatrix,
    /// Tag occurrence statistics in first-seen order.
    pub vocabulary: TagVocabulary,
    /// Retained tag → column index mapping.
    pub index_map: FeatureIndexMap,
    /// Per-entity lookup failures. Failed entities keep their row (all
    /// zeros); the entity sequence is never filtered or reordered.
    pub failures: Vec<LookupFailure>,
}

/// Extract a binary type-membership feature matrix for an ordered entity
/// sequence.
///
/// For each entity the lookup returns its set of type tags. Tag frequencies
/// are accumulated across the whole sequence, the discard policy drops tags
/// with relative frequency `>= 1 - p` or `<= p` of the entity count, and the
/// surviving tags become matrix columns in first-seen order.
///
/// A lookup failure is recorded per entity and leaves an all-zero row. A tag
/// present on an entity but discarded by policy is silently skipped.
pub fn extract_features(
    entities: &[String],
    lookup: &dyn TypeLookup,
    p: f64,
) -> Result<FeatureExtraction> {
    let mut vocabulary = TagVocabulary::new();
    let mut entity_tags: Vec<Vec<String>> = Vec::with_capacity(entities.len());
    let mut failures = Vec::new();

    for (index, entity_id) in entities.iter().enumerate() {
        match lookup.types_for(entity_id) {
            Ok(tags) => {
                // Count each tag once per entity carrying it.
                let mut seen = Vec::new();
                for tag in tags {
                    if !seen.contains(&tag) {
                        vocabulary.record(&tag);
                        seen.push(tag);
                    }
                }
                entity_tags.push(seen);
            }
            Err(e) => {
                failures.push(LookupFailure {
                    entity_id: entity_id.clone(),
                    index,
                    reason: e.to_string(),
                });
                entity_tags.push(Vec::new());
            }
        }
    }

    let index_map = vocabulary.retained_index_map(entities.len(), p)?;

    let mut tri_mat = TriMat::new((entities.len(), index_map.n_features()));
    for (i, tags) in entity_tags.iter().enumerate() {
        for tag in tags {
            // Discarded tags have no column; skip them silently.
            if let Some(j) = index_map.index_of(tag) {
                tri_mat.add_triplet(i, j, 1u8);
            }
        }
    }

    let matrix = TypeMatrix::new(tri_mat.to_csr(), index_map.tags().to_vec())?;

    Ok(FeatureExtraction {
        matrix,
        vocabulary,
        index_map,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutlierError;

    struct FailingLookup;

    impl TypeLookup for FailingLookup {
        fn types_for(&self, entity_id: &str) -> Result<Vec<String>> {
            if entity_id == "bad" {
                Err(OutlierError::Lookup {
                    entity: entity_id.to_string(),
                    reason: "connection refused".to_string(),
                })
            } else {
                Ok(vec!["Place".to_string(), "City".to_string()])
            }
        }
    }

    fn entity_names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("e{}", i)).collect()
    }

    #[test]
    fn test_extraction_discards_ubiquitous_and_singleton_tags() {
        // 1000 entities. "Agent" occurs on all of them, "Obscure" on exactly
        // one, "City" on 100, "Company" on 400. With p = 0.05 the first two
        // are discarded and exactly two features survive.
        let mut table = TypeTable::new();
        let entities = entity_names(1000);
        for (i, e) in entities.iter().enumerate() {
            let mut tags = vec!["Agent".to_string()];
            if i < 100 {
                tags.push("City".to_string());
            }
            if i >= 100 && i < 500 {
                tags.push("Company".to_string());
            }
            if i == 999 {
                tags.push("Obscure".to_string());
            }
            table.insert(e, tags);
        }

        let extraction = extract_features(&entities, &table, 0.05).unwrap();
        assert_eq!(extraction.vocabulary.n_distinct(), 4);
        assert_eq!(extraction.matrix.n_features(), 2);
        assert_eq!(extraction.index_map.tags(), &["City", "Company"]);
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn test_extraction_preserves_first_seen_column_order() {
        let mut table = TypeTable::new();
        let entities = entity_names(10);
        for (i, e) in entities.iter().enumerate() {
            let mut tags = Vec::new();
            if i % 2 == 0 {
                tags.push("Even".to_string());
            }
            if i % 3 == 0 {
                tags.push("Third".to_string());
            }
            if i >= 5 {
                tags.push("Late".to_string());
            }
            table.insert(e, tags);
        }

        let extraction = extract_features(&entities, &table, 0.05).unwrap();
        // Columns follow first-seen order, not alphabetical or map order.
        assert_eq!(extraction.index_map.tags(), &["Even", "Third", "Late"]);
        assert_eq!(extraction.matrix.n_entities(), 10);
    }

    #[test]
    fn test_lookup_failure_yields_zero_row_and_side_record() {
        let entities: Vec<String> =
            vec!["a".into(), "bad".into(), "c".into(), "d".into(), "e".into()];
        let extraction = extract_features(&entities, &FailingLookup, 0.05).unwrap();

        assert_eq!(extraction.failures.len(), 1);
        assert_eq!(extraction.failures[0].entity_id, "bad");
        assert_eq!(extraction.failures[0].index, 1);
        // The failed entity keeps its row in the shared index space.
        assert_eq!(extraction.matrix.n_entities(), 5);
        let dense = extraction.matrix.to_dense();
        for j in 0..extraction.matrix.n_features() {
            assert_eq!(dense[(1, j)], 0.0);
        }
    }

    #[test]
    fn test_entity_with_no_surviving_tags_is_not_an_error() {
        let mut table = TypeTable::new();
        let entities = entity_names(20);
        for (i, e) in entities.iter().enumerate() {
            if i == 0 {
                // Only a singleton tag, which the policy discards.
                table.insert(e, vec!["Unique".to_string()]);
            } else if i < 10 {
                table.insert(e, vec!["Common".to_string()]);
            } else {
                table.insert(e, vec!["Other".to_string()]);
            }
        }

        let extraction = extract_features(&entities, &table, 0.05).unwrap();
        let dense = extraction.matrix.to_dense();
        for j in 0..extraction.matrix.n_features() {
            assert_eq!(dense[(0, j)], 0.0);
        }
    }
}
