use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::digest::centroid::Centroid;

/// Ordered centroid container keyed by mean.
///
/// The engine needs exact lookup, floor/ceil neighbor queries, min/max and
/// ordered traversal, all logarithmic except the traversal. A `BTreeMap`
/// over `OrderedFloat` keys gives exactly that. The key is kept equal to the
/// centroid mean at all times; a merge that shifts a mean re-keys the entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CentroidIndex {
    by_mean: BTreeMap<OrderedFloat<f64>, Centroid>,
}

impl CentroidIndex {
    #[inline]
    pub fn len(&self) -> usize {
        self.by_mean.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_mean.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.by_mean.clear();
    }

    #[inline]
    pub fn get(&self, mean: f64) -> Option<&Centroid> {
        self.by_mean.get(&OrderedFloat(mean))
    }

    /// Insert-or-replace by mean key. Returns the replaced centroid, if any.
    #[inline]
    pub fn insert(&mut self, c: Centroid) -> Option<Centroid> {
        self.by_mean.insert(OrderedFloat(c.mean), c)
    }

    /// Insert, folding the weight into an existing centroid when the means
    /// collide exactly. A mean shift can land a re-keyed centroid on another
    /// centroid's key; the two summarize the same point mass then, and the
    /// next cumulation pass repairs the cumulative fields.
    pub fn insert_or_fold(&mut self, c: Centroid) {
        match self.by_mean.entry(OrderedFloat(c.mean)) {
            Entry::Vacant(slot) => {
                slot.insert(c);
            }
            Entry::Occupied(mut slot) => {
                slot.get_mut().weight += c.weight;
            }
        }
    }

    #[inline]
    pub fn remove(&mut self, mean: f64) -> Option<Centroid> {
        self.by_mean.remove(&OrderedFloat(mean))
    }

    /// Greatest mean `<= x`, or `None`.
    #[inline]
    pub fn floor(&self, x: f64) -> Option<&Centroid> {
        self.by_mean
            .range(..=OrderedFloat(x))
            .next_back()
            .map(|(_, c)| c)
    }

    /// Smallest mean `>= x`, or `None`.
    #[inline]
    pub fn ceil(&self, x: f64) -> Option<&Centroid> {
        self.by_mean.range(OrderedFloat(x)..).next().map(|(_, c)| c)
    }

    /// Centroid with the smallest mean.
    #[inline]
    pub fn first(&self) -> Option<&Centroid> {
        self.by_mean.first_key_value().map(|(_, c)| c)
    }

    /// Centroid with the largest mean.
    #[inline]
    pub fn last(&self) -> Option<&Centroid> {
        self.by_mean.last_key_value().map(|(_, c)| c)
    }

    /// Ascending-mean traversal.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Centroid> {
        self.by_mean.values()
    }

    /// Ascending-mean mutable traversal for the cumulation pass.
    /// Callers must not change a centroid's mean through this iterator.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Centroid> {
        self.by_mean.values_mut()
    }

    /// Extract every centroid in ascending-mean order, leaving the index empty.
    pub fn drain(&mut self) -> Vec<Centroid> {
        std::mem::take(&mut self.by_mean).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(means: &[f64]) -> CentroidIndex {
        let mut idx = CentroidIndex::default();
        for &m in means {
            idx.insert(Centroid::new(m, 1.0));
        }
        idx
    }

    #[test]
    fn floor_and_ceil_bracket_a_probe() {
        let idx = index_of(&[1.0, 3.0, 5.0]);

        assert_eq!(idx.floor(4.0).map(|c| c.mean()), Some(3.0));
        assert_eq!(idx.ceil(4.0).map(|c| c.mean()), Some(5.0));

        // Exact hits resolve to the same entry on both sides.
        assert_eq!(idx.floor(3.0).map(|c| c.mean()), Some(3.0));
        assert_eq!(idx.ceil(3.0).map(|c| c.mean()), Some(3.0));

        // Probes past either end lose the missing side.
        assert_eq!(idx.floor(0.5), None);
        assert_eq!(idx.ceil(0.5).map(|c| c.mean()), Some(1.0));
        assert_eq!(idx.floor(9.0).map(|c| c.mean()), Some(5.0));
        assert_eq!(idx.ceil(9.0), None);
    }

    #[test]
    fn first_last_and_ordered_traversal() {
        let idx = index_of(&[5.0, 1.0, 3.0]);
        assert_eq!(idx.first().map(|c| c.mean()), Some(1.0));
        assert_eq!(idx.last().map(|c| c.mean()), Some(5.0));
        let means: Vec<f64> = idx.iter().map(|c| c.mean()).collect();
        assert_eq!(means, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn insert_or_fold_merges_equal_means() {
        let mut idx = index_of(&[2.0]);
        idx.insert_or_fold(Centroid::new(2.0, 3.0));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get(2.0).map(|c| c.weight()), Some(4.0));
    }

    #[test]
    fn drain_empties_in_order() {
        let mut idx = index_of(&[2.0, -1.0, 0.5]);
        let drained: Vec<f64> = idx.drain().iter().map(|c| c.mean()).collect();
        assert_eq!(drained, vec![-1.0, 0.5, 2.0]);
        assert!(idx.is_empty());
    }
}
