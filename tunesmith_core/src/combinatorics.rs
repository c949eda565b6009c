// Exact duration decomposition.
//
// `DurationSolver` tabulates, for every total up to a cache limit, each
// distinct way to write the total as a non-negative combination of a small
// fixed set of unit costs. The looping optimizer uses it to find leg lengths
// a track line can realize exactly: the units are the traversal durations of
// the straight, diagonal, and curved track pieces, and a combination is a
// count per category.
//
// The table is built bottom-up. Every unit value is a base case (one piece of
// that unit); every other entry is the union, over each unit `u`, of the
// entry for `total - u` with `u`'s count incremented. Entries are kept
// sorted and deduplicated so callers see a fixed order.
//
// See also: `looping/loop_body.rs`, the only consumer.

use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Count of pieces per unit, in unit order.
pub type Combination = SmallVec<[u32; 3]>;

pub struct DurationSolver {
    units: Vec<u32>,
    /// `table[n]` holds every combination summing to `n`, sorted.
    table: Vec<Vec<Combination>>,
    /// Totals with at least one combination, ascending.
    achievable: Vec<u32>,
}

impl DurationSolver {
    /// Tabulate every total in `0..=cache_limit`. Zero-valued units are
    /// ignored.
    pub fn new(units: &[u32], cache_limit: u32) -> Self {
        let units: Vec<u32> = units.to_vec();
        let limit = cache_limit as usize;
        let mut table: Vec<Vec<Combination>> = vec![Vec::new(); limit + 1];

        for n in 1..=limit {
            let mut found: BTreeSet<Combination> = BTreeSet::new();
            for (i, &unit) in units.iter().enumerate() {
                let unit = unit as usize;
                if unit == 0 || unit > n {
                    continue;
                }
                if unit == n {
                    let mut base: Combination = SmallVec::from_elem(0, units.len());
                    base[i] = 1;
                    found.insert(base);
                } else {
                    for prev in &table[n - unit] {
                        let mut next = prev.clone();
                        next[i] += 1;
                        found.insert(next);
                    }
                }
            }
            table[n] = found.into_iter().collect();
        }

        let achievable = (0..=limit)
            .filter(|&n| !table[n].is_empty())
            .map(|n| n as u32)
            .collect();

        Self {
            units,
            table,
            achievable,
        }
    }

    /// Every combination summing exactly to `total`. Empty when `total` is
    /// not achievable or beyond the cache.
    pub fn combinations(&self, total: u32) -> &[Combination] {
        self.table
            .get(total as usize)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Achievable totals, ascending.
    pub fn achievable_totals(&self) -> &[u32] {
        &self.achievable
    }

    /// The smallest achievable total `>= desired`, or `None` if the cache
    /// holds none.
    pub fn nearest_loop_period(&self, desired: u32) -> Option<u32> {
        let idx = self.achievable.partition_point(|&t| t < desired);
        self.achievable.get(idx).copied()
    }

    /// Sum of `combination`'s counts weighted by the unit costs.
    pub fn total_of(&self, combination: &[u32]) -> u32 {
        combination
            .iter()
            .zip(&self.units)
            .map(|(count, unit)| count * unit)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn track_solver() -> DurationSolver {
        DurationSolver::new(&[21, 30, 36], 200)
    }

    #[test]
    fn base_cases_are_single_pieces() {
        let solver = track_solver();
        let c21: Combination = smallvec![1, 0, 0];
        assert_eq!(solver.combinations(21), &[c21]);
        let c36: Combination = smallvec![0, 0, 1];
        assert_eq!(solver.combinations(36), &[c36]);
        assert!(solver.combinations(0).is_empty());
        assert!(solver.combinations(20).is_empty());
    }

    #[test]
    fn seventy_eight_has_one_split() {
        let solver = track_solver();
        let expected: Combination = smallvec![2, 0, 1];
        assert_eq!(solver.combinations(78), &[expected]);
    }

    #[test]
    fn combinations_are_sorted_and_distinct() {
        let solver = track_solver();
        // 72 = 36 + 36 = 30 + 21 + 21.
        let combos = solver.combinations(72);
        assert!(combos.len() >= 2);
        for pair in combos.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn achievable_totals_start_small() {
        let solver = track_solver();
        assert_eq!(&solver.achievable_totals()[..6], &[21, 30, 36, 42, 51, 57]);
    }

    #[test]
    fn nearest_period_rounds_up() {
        let solver = track_solver();
        assert_eq!(solver.nearest_loop_period(0), Some(21));
        assert_eq!(solver.nearest_loop_period(22), Some(30));
        assert_eq!(solver.nearest_loop_period(78), Some(78));
        assert_eq!(solver.nearest_loop_period(201), None);
    }

    #[test]
    fn beyond_cache_is_empty() {
        let solver = track_solver();
        assert!(solver.combinations(10_000).is_empty());
        assert!(solver.achievable_totals().iter().all(|&t| t <= 200));
    }
}
