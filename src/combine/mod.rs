//! Intersection of outlier index sets.

use crate::detect::OutlierSet;

/// Intersect outlier index sets from multiple detectors/configurations.
///
/// Returns the indices flagged by every supplied set. An empty input slice,
/// or any empty member, yields an empty result. The operation is
/// associative, idempotent, and independent of argument order; the sets are
/// comparable only because they share the entity index space.
pub fn intersect(sets: &[OutlierSet]) -> OutlierSet {
    let mut iter = sets.iter();
    let first = match iter.next() {
        Some(first) => first.clone(),
        None => return OutlierSet::new(),
    };
    iter.fold(first, |acc, set| acc.intersection(set).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(indices: &[usize]) -> OutlierSet {
        indices.iter().copied().collect()
    }

    #[test]
    fn test_basic_intersection() {
        let a = set(&[1, 2, 5, 9]);
        let b = set(&[2, 5, 7]);
        assert_eq!(intersect(&[a, b]), set(&[2, 5]));
    }

    #[test]
    fn test_empty_input_list() {
        assert!(intersect(&[]).is_empty());
    }

    #[test]
    fn test_any_empty_set_yields_empty() {
        let a = set(&[1, 2, 3]);
        assert!(intersect(&[a, set(&[])]).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let a = set(&[3, 4, 5]);
        assert_eq!(intersect(&[a.clone(), a.clone()]), a);
    }

    #[test]
    fn test_order_independent() {
        let a = set(&[1, 2, 3, 4]);
        let b = set(&[2, 3, 4, 5]);
        let c = set(&[3, 4, 5, 6]);

        let abc = intersect(&[a.clone(), b.clone(), c.clone()]);
        let cab = intersect(&[c.clone(), a.clone(), b.clone()]);
        let bca = intersect(&[b, c, a]);

        assert_eq!(abc, set(&[3, 4]));
        assert_eq!(abc, cab);
        assert_eq!(abc, bca);
    }

    #[test]
    fn test_associative() {
        let a = set(&[1, 2, 3]);
        let b = set(&[2, 3, 4]);
        let c = set(&[3, 4, 5]);

        let left = intersect(&[intersect(&[a.clone(), b.clone()]), c.clone()]);
        let right = intersect(&[a, intersect(&[b, c])]);
        assert_eq!(left, right);
    }
}
