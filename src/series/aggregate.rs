use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt::Display;

use super::SeriesError;
use crate::models::EntityId;

/// Positional sum of per-entity count vectors.
///
/// Every vector must have exactly `month_count` entries. Addition is
/// commutative, so the result does not depend on input order, and partial
/// aggregations of separate shards can be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator<K: Ord = EntityId> {
    month_count: usize,
    totals: BTreeMap<K, Vec<u64>>,
}

impl<K: Ord + Display> Aggregator<K> {
    pub fn new(month_count: usize) -> Self {
        Self {
            month_count,
            totals: BTreeMap::new(),
        }
    }

    pub fn month_count(&self) -> usize {
        self.month_count
    }

    /// Add one vector to the running total of `key`.
    pub fn add(&mut self, key: K, counts: &[u64]) -> Result<(), SeriesError> {
        if counts.len() != self.month_count {
            return Err(SeriesError::LengthMismatch {
                key: key.to_string(),
                expected: self.month_count,
                found: counts.len(),
            });
        }

        match self.totals.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(counts.to_vec());
            }
            Entry::Occupied(mut slot) => {
                let mut summed = Vec::with_capacity(counts.len());
                for (t, c) in slot.get().iter().zip(counts) {
                    let sum = t.checked_add(*c).ok_or_else(|| SeriesError::Overflow {
                        key: slot.key().to_string(),
                    })?;
                    summed.push(sum);
                }
                *slot.get_mut() = summed;
            }
        }
        Ok(())
    }

    /// Fold another partial aggregation into this one.
    pub fn merge(&mut self, other: Aggregator<K>) -> Result<(), SeriesError> {
        if other.month_count != self.month_count {
            return Err(SeriesError::ShardMismatch {
                expected: self.month_count,
                found: other.month_count,
            });
        }
        for (key, counts) in other.totals {
            self.add(key, &counts)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&[u64]> {
        self.totals.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Rows in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[u64])> {
        self.totals.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_sum() {
        let mut agg = Aggregator::new(3);
        agg.add(7u64, &[1, 2, 3]).unwrap();
        agg.add(7u64, &[4, 5, 6]).unwrap();
        assert_eq!(agg.get(&7), Some(&[5, 7, 9][..]));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let mut agg = Aggregator::new(2);
        agg.add(1u64, &[1, 2]).unwrap();
        let err = agg.add(1u64, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::LengthMismatch {
                expected: 2,
                found: 3,
                ..
            }
        ));
        // A rejected vector never creates an entry.
        assert!(agg.add(2u64, &[1]).is_err());
        assert!(agg.get(&2).is_none());
    }

    #[test]
    fn test_order_independent() {
        let inputs: [(u64, [u64; 3]); 3] = [(1, [1, 0, 2]), (2, [3, 3, 3]), (1, [4, 5, 6])];
        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let mut results = Vec::new();
        for order in permutations {
            let mut agg = Aggregator::new(3);
            for i in order {
                let (key, counts) = inputs[i];
                agg.add(key, &counts).unwrap();
            }
            results.push(agg);
        }
        for agg in &results[1..] {
            assert_eq!(agg, &results[0]);
        }
        assert_eq!(results[0].get(&1), Some(&[5, 5, 8][..]));
    }

    #[test]
    fn test_merge_shards() {
        let mut left = Aggregator::new(2);
        left.add(1u64, &[1, 1]).unwrap();
        let mut right = Aggregator::new(2);
        right.add(1u64, &[2, 3]).unwrap();
        right.add(9u64, &[0, 4]).unwrap();

        left.merge(right).unwrap();
        let rows: Vec<(u64, Vec<u64>)> = left.iter().map(|(k, v)| (*k, v.to_vec())).collect();
        assert_eq!(rows, vec![(1, vec![3, 4]), (9, vec![0, 4])]);
    }

    #[test]
    fn test_merge_rejects_different_month_count() {
        let mut left: Aggregator = Aggregator::new(2);
        let right: Aggregator = Aggregator::new(3);
        assert!(matches!(
            left.merge(right),
            Err(SeriesError::ShardMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_overflow_is_error() {
        let mut agg = Aggregator::new(1);
        agg.add(1u64, &[u64::MAX]).unwrap();
        assert!(matches!(
            agg.add(1u64, &[1]),
            Err(SeriesError::Overflow { .. })
        ));
        assert_eq!(agg.get(&1), Some(&[u64::MAX][..]));
    }

    #[test]
    fn test_string_keys() {
        let mut agg: Aggregator<String> = Aggregator::new(1);
        agg.add("Paris".to_string(), &[2]).unwrap();
        agg.add("Paris".to_string(), &[3]).unwrap();
        assert_eq!(agg.get(&"Paris".to_string()), Some(&[5][..]));
    }
}
