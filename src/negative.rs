use crate::attribute_set::AttributeSet;
use crate::partition::{ClusterId, StrippedPartition};
use crate::trie::{AttributeTrie, Invalid};
use crate::validation::RelationIndex;
use tracing::trace;

/// Non-dependencies known to hold in the relation, kept maximal as they're inserted.
pub type NegativeCover = AttributeTrie<Invalid>;

impl AttributeTrie<Invalid> {
    /// Records `lhs ↛ rhs` unless it, or a specialization of it, is already recorded. Any
    /// recorded generalizations are removed, since this entry implies them. Returns `true` if it
    /// was added.
    ///
    /// ```
    /// use fdhunter::{AttributeSet, NegativeCover};
    ///
    /// let mut cover = NegativeCover::new(3);
    /// assert!(cover.add_if_maximal(&AttributeSet::from_attributes(3, vec![0]), 2));
    /// assert!(cover.add_if_maximal(&AttributeSet::from_attributes(3, vec![0, 1]), 2));
    /// assert!(!cover.contains(&AttributeSet::from_attributes(3, vec![0]), 2));
    /// assert!(!cover.add_if_maximal(&AttributeSet::from_attributes(3, vec![1]), 2));
    /// ```
    pub fn add_if_maximal(&mut self, lhs: &AttributeSet, rhs: usize) -> bool {
        if self.contains_or_specialization(lhs, rhs) {
            return false;
        }
        for generalization in self.generalizations(lhs, rhs) {
            self.remove(&generalization, rhs);
        }
        self.add_one(lhs, rhs);
        true
    }

    /// Records what one agree set proves: rows that agree on exactly `agree_set` show that it
    /// determines none of the other attributes. Returns the right-hand sides that were new.
    pub fn add_agree_set(&mut self, agree_set: &AttributeSet) -> AttributeSet {
        let mut added = AttributeSet::new(self.universe());
        for rhs in agree_set.complement().iter() {
            if self.add_if_maximal(agree_set, rhs) {
                added.insert(rhs);
            }
        }
        added
    }

    /// Removes every non-dependency implied by a larger one. Returns how many were removed.
    pub fn maximize(&mut self) -> usize {
        self.filter_generalizations()
    }

    /// Replaces every non-dependency with a left-hand side larger than `depth` by its
    /// generalization at that depth, which is also a non-dependency.
    pub fn trim(&mut self, depth: usize) {
        self.fold_below(depth);
        self.maximize();
    }

    /// Searches the relation for non-dependencies from scratch, starting at `∅ ↛ r` for every
    /// non-constant attribute `r` and extending left-hand sides one attribute at a time for as
    /// long as they stay invalid. Returns how many entries were added.
    ///
    /// Every invalid left-hand side is visited exactly once, in set-enumeration order (each step
    /// only adds attributes above the last one it added), so every maximal non-dependency is
    /// reached no matter what the cover already holds. Each step intersects the partition it
    /// arrived with, so no left-hand side's partition is computed from scratch.
    pub fn grow_negative(&mut self, index: &RelationIndex, max_lhs_size: Option<usize>) -> usize {
        let num_records = index.num_records();
        let mut added = 0;
        for rhs in 0..self.universe() {
            if index.partition(rhs).is_constant(num_records) {
                continue;
            }
            let empty = AttributeSet::new(self.universe());
            if self.add_if_maximal(&empty, rhs) {
                added += 1;
            }
            let inverted = index.partition(rhs).invert(num_records);
            let everything = StrippedPartition::full(num_records);
            added += self.extend(&empty, rhs, 0, &everything, &inverted, index, max_lhs_size);
        }
        added
    }

    /// Checks every recorded non-dependency against the relation, adding every larger
    /// non-dependency it extends to. Entries that turn out not to be maximal are replaced, so
    /// afterwards every entry is maximal in the relation, not just among the entries. Returns
    /// how many entries were added.
    pub fn maximize_negative(
        &mut self,
        index: &RelationIndex,
        max_lhs_size: Option<usize>,
    ) -> usize {
        let num_records = index.num_records();
        let mut added = 0;
        let mut inverted: Vec<Option<Vec<ClusterId>>> = vec![None; self.universe()];
        for (lhs, rhs) in self.entries() {
            let partition = index.partition_of(&lhs);
            for r in rhs.iter() {
                // Even if an earlier extension already superseded this entry, supersets of it
                // outside that extension may still be unexplored.
                let inverted = inverted[r]
                    .get_or_insert_with(|| index.partition(r).invert(num_records));
                added += self.extend(&lhs, r, 0, &partition, inverted, index, max_lhs_size);
            }
        }
        added
    }

    fn extend(
        &mut self,
        lhs: &AttributeSet,
        rhs: usize,
        from: usize,
        partition: &StrippedPartition,
        inverted: &[ClusterId],
        index: &RelationIndex,
        max_lhs_size: Option<usize>,
    ) -> usize {
        if max_lhs_size.map_or(false, |max| lhs.cardinality() >= max) {
            return 0;
        }

        let mut added = 0;
        for attribute in from..self.universe() {
            if attribute == rhs || lhs.contains(attribute) {
                continue;
            }
            let narrowed = partition.intersect(&[index.partition(attribute)], index.num_records());
            if narrowed.refines(inverted) {
                // Every superset of a valid left-hand side is valid too.
                continue;
            }
            let extended = lhs.with(attribute);
            trace!(lhs = ?extended, rhs, "deepened non-dependency");
            if self.add_if_maximal(&extended, rhs) {
                added += 1;
            }
            added += self.extend(
                &extended,
                rhs,
                attribute + 1,
                &narrowed,
                inverted,
                index,
                max_lhs_size,
            );
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionBuilder;
    use crate::relation::InMemoryRelation;

    fn set(attributes: &[usize]) -> AttributeSet {
        AttributeSet::from_attributes(3, attributes.iter().copied())
    }

    fn fixture() -> RelationIndex {
        // A determines B and C; B and C together don't determine A.
        let mut relation = InMemoryRelation::from_strs(
            "r",
            &["A", "B", "C"],
            &[&["1", "2", "5"], &["2", "2", "4"], &["3", "3", "4"], &["4", "3", "4"]],
            None,
        );
        let partitioning = PartitionBuilder::default().build(&mut relation).unwrap();
        RelationIndex::new(partitioning.partitions, partitioning.num_records)
    }

    #[test]
    fn agree_sets_become_non_dependencies() {
        let mut cover = NegativeCover::new(3);
        assert_eq!(cover.add_agree_set(&set(&[1])), set(&[0, 2]));
        assert_eq!(cover.add_agree_set(&set(&[1, 2])), set(&[0]));
        // {1} -/-> 0 is implied by {1, 2} -/-> 0 now.
        assert!(!cover.contains(&set(&[1]), 0));
        assert!(cover.contains(&set(&[1]), 2));
        assert!(cover.add_agree_set(&set(&[1])).is_empty());
    }

    #[test]
    fn trim_generalizes_deep_entries() {
        let mut cover = NegativeCover::new(3);
        cover.add_one(&set(&[0, 1]), 2);
        cover.add_one(&set(&[0]), 2);
        cover.trim(1);
        assert_eq!(cover.entries(), vec![(set(&[0]), set(&[2]))]);
    }

    #[test]
    fn exhaustive_search_finds_maximal_non_dependencies() {
        let index = fixture();
        let mut cover = NegativeCover::new(3);
        cover.grow_negative(&index, None);

        // Rows 2 and 3 agree on {B, C} but not A; rows 1 and 2 agree on C only.
        assert!(cover.contains(&set(&[1, 2]), 0));
        assert!(cover.contains(&set(&[2]), 1));
        assert!(!cover.contains_or_specialization(&set(&[0]), 1));
        assert!(!cover.contains_or_specialization(&set(&[0]), 2));
        assert_eq!(cover.len(), 3);
        assert!(cover.contains(&set(&[1]), 2));
    }

    #[test]
    fn maximize_negative_deepens_sampled_entries() {
        let index = fixture();
        let mut cover = NegativeCover::new(3);
        cover.add_one(&set(&[]), 0);
        cover.maximize_negative(&index, None);
        assert!(!cover.contains(&set(&[]), 0));
        assert!(cover.contains(&set(&[1, 2]), 0));

        let mut bounded = NegativeCover::new(3);
        bounded.add_one(&set(&[]), 0);
        bounded.maximize_negative(&index, Some(1));
        assert!(!bounded.contains_or_specialization(&set(&[1, 2]), 0));
        assert_eq!(bounded.depth(), 1);
    }

    /// Tables of `width` columns with a few distinct values each, from a fixed seed.
    fn random_rows(seed: u64, width: usize, height: usize) -> Vec<Vec<String>> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        ((state >> 33) % 3).to_string()
                    })
                    .collect()
            })
            .collect()
    }

    /// Every maximal `lhs -/-> rhs`, found by trying every left-hand side on every row pair.
    fn maximal_non_dependencies(width: usize, rows: &[Vec<String>]) -> Vec<(Vec<usize>, usize)> {
        let holds = |lhs: u32, rhs: usize| {
            rows.iter().enumerate().all(|(i, a)| {
                rows[i + 1..].iter().all(|b| {
                    let same = (0..width).filter(|&c| lhs & (1 << c) != 0).all(|c| a[c] == b[c]);
                    !same || a[rhs] == b[rhs]
                })
            })
        };
        let mut found = Vec::new();
        for lhs in 0u32..(1 << width) {
            for rhs in 0..width {
                if lhs & (1 << rhs) != 0 || holds(lhs, rhs) {
                    continue;
                }
                let maximal = (0..width)
                    .filter(|&c| c != rhs && lhs & (1 << c) == 0)
                    .all(|c| holds(lhs | (1 << c), rhs));
                if maximal {
                    found.push(((0..width).filter(|&c| lhs & (1 << c) != 0).collect(), rhs));
                }
            }
        }
        found.sort();
        found
    }

    fn flatten(cover: &NegativeCover) -> Vec<(Vec<usize>, usize)> {
        let mut flat: Vec<(Vec<usize>, usize)> = cover
            .entries()
            .into_iter()
            .flat_map(|(lhs, rhs)| {
                let lhs: Vec<usize> = lhs.iter().collect();
                rhs.iter().map(move |r| (lhs.clone(), r)).collect::<Vec<_>>()
            })
            .collect();
        flat.sort();
        flat
    }

    #[test]
    fn exhaustive_search_matches_brute_force() {
        let width = 6;
        for seed in 0..20 {
            let rows = random_rows(seed, width, 25);
            let names: Vec<String> = (0..width).map(|c| format!("c{}", c)).collect();
            let mut relation = InMemoryRelation::new(
                "r",
                names,
                rows.iter()
                    .map(|row| row.iter().cloned().map(Some).collect())
                    .collect(),
            );
            let partitioning = PartitionBuilder::default().build(&mut relation).unwrap();
            let index = RelationIndex::new(partitioning.partitions, partitioning.num_records);
            let expected = maximal_non_dependencies(width, &rows);

            let mut grown = NegativeCover::new(width);
            grown.grow_negative(&index, None);
            assert_eq!(flatten(&grown), expected, "seed {}", seed);

            // Starting from sampled entries that overlap awkwardly has to reach the same cover.
            let mut deepened = NegativeCover::new(width);
            deepened.add_agree_set(&index.matrix().agree_set(0, 1));
            for rhs in 0..width {
                if !index.partition(rhs).is_constant(index.num_records()) {
                    deepened.add_one(&AttributeSet::new(width), rhs);
                }
            }
            deepened.maximize_negative(&index, None);
            assert_eq!(flatten(&deepened), expected, "seed {}", seed);
        }
    }

    #[test]
    fn overlapping_specializations_dont_hide_maximal_entries() {
        // {0, 2} and {1, 3} are recorded already; {0, 1} is maximal too and only reachable
        // through {0} or {1}, both of which the recorded entries cover. E is a key, so every
        // left-hand side on which two rows agree fails to determine it.
        let rows: &[&[&str]] = &[
            &["a", "b", "x", "y", "1"],
            &["a", "c", "x", "z", "2"],
            &["d", "b", "w", "y", "3"],
            &["e", "f", "v", "y", "4"],
            &["a", "b", "u", "t", "5"],
        ];
        let mut relation =
            InMemoryRelation::from_strs("r", &["A", "B", "C", "D", "E"], rows, None);
        let partitioning = PartitionBuilder::default().build(&mut relation).unwrap();
        let index = RelationIndex::new(partitioning.partitions, partitioning.num_records);
        let five =
            |attributes: &[usize]| AttributeSet::from_attributes(5, attributes.iter().copied());

        let mut cover = NegativeCover::new(5);
        cover.add_one(&five(&[0, 2]), 4);
        cover.add_one(&five(&[1, 3]), 4);
        cover.grow_negative(&index, None);
        assert!(cover.contains(&five(&[0, 1]), 4));
        assert!(cover.contains(&five(&[0, 2]), 4));
        assert!(cover.contains(&five(&[1, 3]), 4));
    }
}
