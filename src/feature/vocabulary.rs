//! Tag vocabulary with insertion-ordered statistics and discard policy.

use crate::error::{OutlierError, Result};
use std::collections::HashMap;

/// Tag occurrence statistics accumulated over one extraction run.
///
/// First-seen order is recorded explicitly so that feature column assignment
/// is reproducible run-to-run, rather than depending on hash map iteration.
#[derive(Debug, Clone, Default)]
pub struct TagVocabulary {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl TagVocabulary {
    /// Create an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of a tag.
    pub fn record(&mut self, tag: &str) {
        match self.counts.get_mut(tag) {
            Some(count) => *count += 1,
            None => {
                self.order.push(tag.to_string());
                self.counts.insert(tag.to_string(), 1);
            }
        }
    }

    /// Number of distinct tags seen.
    pub fn n_distinct(&self) -> usize {
        self.order.len()
    }

    /// Total number of recorded occurrences.
    pub fn n_occurrences(&self) -> usize {
        self.counts.values().sum()
    }

    /// Occurrence count for a tag (0 if never seen).
    pub fn count(&self, tag: &str) -> usize {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Distinct tags in first-seen order.
    pub fn tags(&self) -> &[String] {
        &self.order
    }

    /// Build the retained-feature index map under the discard policy.
    ///
    /// A tag is discarded when its count relative to the entity count is
    /// `>= 1 - p` (too common) or `<= p` (too rare). The denominator is the
    /// number of entities in the sequence, so the ratio reads as "fraction
    /// of entities carrying the tag". Retained tags receive contiguous
    /// zero-based indices in first-seen order.
    pub fn retained_index_map(&self, n_entities: usize, p: f64) -> Result<FeatureIndexMap> {
        if !(0.0..1.0).contains(&p) {
            return Err(OutlierError::InvalidParameter(format!(
                "discard fraction p must be in [0, 1), got {}",
                p
            )));
        }
        if n_entities == 0 {
            return Err(OutlierError::EmptyData(
                "Cannot build feature map for zero entities".to_string(),
            ));
        }

        let n = n_entities as f64;
        let mut tags = Vec::new();
        let mut index = HashMap::new();
        for tag in &self.order {
            let frequency = self.counts[tag] as f64 / n;
            if frequency >= 1.0 - p || frequency <= p {
                continue;
            }
            index.insert(tag.clone(), tags.len());
            tags.push(tag.clone());
        }

        Ok(FeatureIndexMap { tags, index })
    }
}

/// Mapping from retained tags to contiguous feature column indices.
#[derive(Debug, Clone)]
pub struct FeatureIndexMap {
    tags: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureIndexMap {
    /// Number of retained features.
    pub fn n_features(&self) -> usize {
        self.tags.len()
    }

    /// Column index of a tag, or `None` if it was discarded.
    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.index.get(tag).copied()
    }

    /// Retained tags in column order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
