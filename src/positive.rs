use crate::attribute_set::AttributeSet;
use crate::error::{Error, Result};
use crate::negative::NegativeCover;
use crate::trie::{AttributeTrie, Valid};

/// Candidate and validated functional dependencies, kept minimal as they're inserted.
pub type PositiveCover = AttributeTrie<Valid>;

/// What one round of specialization did to a [`PositiveCover`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Specialization {
    /// Dependencies removed because the evidence contradicts them.
    pub removed: usize,
    /// More specific candidates added in their place.
    pub added: usize,
    /// Whether some candidate was not added because its left-hand side would exceed the size
    /// limit.
    pub depth_bounded: bool,
}

impl Specialization {
    pub(crate) fn absorb(&mut self, other: Specialization) {
        self.removed += other.removed;
        self.added += other.added;
        self.depth_bounded |= other.depth_bounded;
    }
}

impl AttributeTrie<Valid> {
    /// The most optimistic cover: the empty set determines every attribute.
    pub fn seeded(universe: usize) -> Self {
        let mut cover = PositiveCover::new(universe);
        cover.add(&AttributeSet::new(universe), &AttributeSet::full(universe));
        cover
    }

    /// Records `lhs → rhs` unless it, or a generalization of it, is already recorded. Returns
    /// `true` if it was added.
    ///
    /// ```
    /// use fdhunter::{AttributeSet, PositiveCover};
    ///
    /// let mut cover = PositiveCover::new(3);
    /// assert!(cover.add_if_minimal(&AttributeSet::from_attributes(3, vec![0]), 2));
    /// assert!(!cover.add_if_minimal(&AttributeSet::from_attributes(3, vec![0, 1]), 2));
    /// assert!(cover.add_if_minimal(&AttributeSet::from_attributes(3, vec![1]), 2));
    /// ```
    pub fn add_if_minimal(&mut self, lhs: &AttributeSet, rhs: usize) -> bool {
        if self.contains_or_generalization(lhs, rhs) {
            return false;
        }
        self.add_one(lhs, rhs);
        true
    }

    /// Adapts the cover to the non-dependency `non_fd ↛ rhs`.
    ///
    /// Every recorded `l → rhs` with `l ⊆ non_fd` is now known to be false and is removed. Its
    /// place is taken by `l ∪ {b} → rhs` for each attribute `b` outside `non_fd` (and not `rhs`
    /// itself), the smallest extensions that this non-dependency doesn't rule out.
    ///
    /// Left-hand sides smaller than `frontier` have been validated against the full relation,
    /// so evidence contradicting one of them means the engine has a bug, and is reported as an
    /// [`Error::InvariantViolation`].
    pub fn specialize(
        &mut self,
        non_fd: &AttributeSet,
        rhs: usize,
        max_lhs_size: Option<usize>,
        frontier: usize,
    ) -> Result<Specialization> {
        let mut outcome = Specialization::default();
        let invalid = self.generalizations(non_fd, rhs);
        if invalid.is_empty() {
            return Ok(outcome);
        }

        for lhs in invalid.iter() {
            if lhs.cardinality() < frontier {
                return Err(Error::invariant(format!(
                    "validated dependency {:?} -> {} contradicted by non-dependency {:?}",
                    lhs, rhs, non_fd
                )));
            }
            self.remove(lhs, rhs);
            outcome.removed += 1;
        }

        let mut extensions = non_fd.complement();
        extensions.remove(rhs);
        for lhs in invalid.iter() {
            if max_lhs_size.map_or(false, |max| lhs.cardinality() >= max) {
                outcome.depth_bounded |= !extensions.is_empty();
                continue;
            }
            for extension in extensions.iter() {
                if self.add_if_minimal(&lhs.with(extension), rhs) {
                    outcome.added += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Specializes the cover by every entry of the negative cover, largest left-hand sides first.
    ///
    /// Starting from [`PositiveCover::seeded`], this turns a negative cover into the set of
    /// candidates it implies: the minimal left-hand sides which no recorded non-dependency
    /// contradicts.
    pub fn grow(
        &mut self,
        negative: &NegativeCover,
        max_lhs_size: Option<usize>,
        frontier: usize,
    ) -> Result<Specialization> {
        let mut entries = negative.entries();
        entries.sort_by(|(a, _), (b, _)| b.cardinality().cmp(&a.cardinality()));

        let mut outcome = Specialization::default();
        for (lhs, rhs) in entries {
            for r in rhs.iter() {
                outcome.absorb(self.specialize(&lhs, r, max_lhs_size, frontier)?);
            }
        }
        Ok(outcome)
    }

    /// Removes every dependency that has a recorded generalization. Returns how many were
    /// removed.
    pub fn minimize(&mut self) -> usize {
        self.filter_specializations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(attributes: &[usize]) -> AttributeSet {
        AttributeSet::from_attributes(4, attributes.iter().copied())
    }

    #[test]
    fn specialize_replaces_contradicted_candidates() {
        let mut cover = PositiveCover::seeded(4);
        // Rows that agree on {0, 1} but not on 2 or 3.
        let outcome = cover.specialize(&set(&[0, 1]), 3, None, 0).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(!cover.contains(&set(&[]), 3));
        assert!(cover.contains(&set(&[2]), 3));
        assert!(!cover.contains(&set(&[0]), 3));
        assert!(cover.contains(&set(&[]), 2));

        let outcome = cover.specialize(&set(&[1, 2]), 3, None, 0).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(cover.contains(&set(&[0, 2]), 3));
        assert!(!cover.contains(&set(&[1, 2]), 3));
    }

    #[test]
    fn specialize_respects_size_limit() {
        let mut cover = PositiveCover::seeded(4);
        let outcome = cover.specialize(&set(&[0]), 3, Some(0), 0).unwrap();
        assert!(outcome.depth_bounded);
        assert_eq!(outcome.added, 0);
        assert!(!cover.contains_or_specialization(&set(&[]), 3));
    }

    #[test]
    fn specialize_refuses_to_undo_validated_levels() {
        let mut cover = PositiveCover::new(4);
        cover.add_one(&set(&[0]), 3);
        match cover.specialize(&set(&[0, 1]), 3, None, 2) {
            Err(Error::InvariantViolation(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn grow_from_negative_cover() {
        // Agree sets of {0} and {1} for attribute 2 mean neither 0 nor 1 alone determine it.
        let mut negative = NegativeCover::new(3);
        negative.add_one(&set3(&[0]), 2);
        negative.add_one(&set3(&[1]), 2);

        let mut cover = PositiveCover::seeded(3);
        cover.grow(&negative, None, 0).unwrap();
        assert_eq!(
            cover.generalizations(&AttributeSet::full(3), 2),
            vec![set3(&[0, 1])]
        );
        assert!(cover.contains(&set3(&[]), 0));
        assert!(cover.contains(&set3(&[]), 1));
    }

    #[test]
    fn minimize_drops_redundant_entries() {
        let mut cover = PositiveCover::new(4);
        cover.add_one(&set(&[0, 1]), 3);
        cover.add_one(&set(&[1]), 3);
        cover.add_one(&set(&[0, 2]), 3);
        assert_eq!(cover.minimize(), 1);
        assert_eq!(cover.len(), 2);
    }

    fn set3(attributes: &[usize]) -> AttributeSet {
        AttributeSet::from_attributes(3, attributes.iter().copied())
    }
}
