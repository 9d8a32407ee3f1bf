use fixedbitset::FixedBitSet;
use std::fmt;
use std::iter;

/// A set of attributes (columns) drawn from a fixed universe `0..universe`.
///
/// Every set that takes part in one discovery run has the same universe, which is the number of
/// columns in the relation. Mixing sets from different universes is a programming error and the
/// binary operations panic on it.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct AttributeSet(FixedBitSet);

impl AttributeSet {
    /// Creates an empty set over `universe` attributes.
    pub fn new(universe: usize) -> Self {
        AttributeSet(FixedBitSet::with_capacity(universe))
    }

    /// Creates the set containing every attribute of the universe.
    ///
    /// ```
    /// use fdhunter::AttributeSet;
    ///
    /// let all = AttributeSet::full(3);
    /// assert_eq!(all.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    /// ```
    pub fn full(universe: usize) -> Self {
        let mut bits = FixedBitSet::with_capacity(universe);
        bits.insert_range(..);
        AttributeSet(bits)
    }

    /// Creates a set over `universe` attributes containing the given ones.
    ///
    /// It's okay if the iterator yields duplicates.
    ///
    /// # Panics
    ///
    /// Panics if any attribute is outside the universe.
    pub fn from_attributes<I: IntoIterator<Item = usize>>(universe: usize, attributes: I) -> Self {
        let mut set = AttributeSet::new(universe);
        for attribute in attributes {
            set.insert(attribute);
        }
        set
    }

    /// Number of attributes in the universe, not the number of members.
    pub fn universe(&self) -> usize {
        self.0.len()
    }

    /// Number of attributes in the set.
    pub fn cardinality(&self) -> usize {
        self.0.count_ones(..)
    }

    /// Returns `true` if no attribute is in the set.
    pub fn is_empty(&self) -> bool {
        self.0.is_clear()
    }

    /// Returns `true` if `attribute` is in the set.
    pub fn contains(&self, attribute: usize) -> bool {
        self.0.contains(attribute)
    }

    /// Adds `attribute`; returns `true` if it wasn't there already.
    pub fn insert(&mut self, attribute: usize) -> bool {
        !self.0.put(attribute)
    }

    /// Removes `attribute`; returns `true` if it was there.
    pub fn remove(&mut self, attribute: usize) -> bool {
        let was = self.0.contains(attribute);
        self.0.set(attribute, false);
        was
    }

    /// Removes every attribute.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterates over the members in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.ones()
    }

    /// Returns the smallest member that is at least `from`.
    ///
    /// ```
    /// use fdhunter::AttributeSet;
    ///
    /// let set = AttributeSet::from_attributes(8, vec![1, 4, 6]);
    /// assert_eq!(set.next_set_bit(0), Some(1));
    /// assert_eq!(set.next_set_bit(2), Some(4));
    /// assert_eq!(set.next_set_bit(4), Some(4));
    /// assert_eq!(set.next_set_bit(7), None);
    /// ```
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        self.0.ones().find(|&attribute| attribute >= from)
    }

    /// Adds every member of `other` to this set.
    pub fn union_with(&mut self, other: &AttributeSet) {
        debug_assert_eq!(self.universe(), other.universe());
        self.0.union_with(&other.0);
    }

    /// Keeps only the members that are also in `other`.
    pub fn intersect_with(&mut self, other: &AttributeSet) {
        debug_assert_eq!(self.universe(), other.universe());
        self.0.intersect_with(&other.0);
    }

    /// Removes every member of `other` from this set.
    pub fn difference_with(&mut self, other: &AttributeSet) {
        debug_assert_eq!(self.universe(), other.universe());
        self.0.difference_with(&other.0);
    }

    /// Returns a copy of this set with `attribute` added.
    pub fn with(&self, attribute: usize) -> AttributeSet {
        let mut extended = self.clone();
        extended.insert(attribute);
        extended
    }

    /// Returns the attributes of the universe which are not in this set.
    ///
    /// ```
    /// use fdhunter::AttributeSet;
    ///
    /// let set = AttributeSet::from_attributes(4, vec![0, 2]);
    /// assert_eq!(set.complement().iter().collect::<Vec<_>>(), vec![1, 3]);
    /// ```
    pub fn complement(&self) -> AttributeSet {
        let mut complement = AttributeSet::full(self.universe());
        complement.difference_with(self);
        complement
    }

    /// Returns `true` if every member of this set is also in `other`.
    ///
    /// ```
    /// use fdhunter::AttributeSet;
    ///
    /// let nil = AttributeSet::new(3);
    /// let one = AttributeSet::from_attributes(3, vec![1]);
    ///
    /// assert!(nil.is_subset(&one));
    /// assert!(nil.is_subset(&nil));
    /// assert!(one.is_subset(&one));
    /// assert!(!one.is_subset(&nil));
    /// ```
    pub fn is_subset(&self, other: &AttributeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns `true` if this set and `other` share no members.
    pub fn is_disjoint(&self, other: &AttributeSet) -> bool {
        self.0.is_disjoint(&other.0)
    }
}

impl fmt::Debug for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.ones()).finish()
    }
}

impl iter::Extend<usize> for AttributeSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for attribute in iter {
            self.insert(attribute);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeSet;

    #[test]
    fn insert_and_remove_report_changes() {
        let mut set = AttributeSet::new(5);
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert_eq!(set.cardinality(), 1);
        assert!(set.remove(3));
        assert!(!set.remove(3));
        assert!(set.is_empty());
    }

    #[test]
    fn set_algebra() {
        let ab = AttributeSet::from_attributes(4, vec![0, 1]);
        let bc = AttributeSet::from_attributes(4, vec![1, 2]);

        let mut union = ab.clone();
        union.union_with(&bc);
        assert_eq!(union, AttributeSet::from_attributes(4, vec![0, 1, 2]));

        let mut intersection = ab.clone();
        intersection.intersect_with(&bc);
        assert_eq!(intersection, AttributeSet::from_attributes(4, vec![1]));

        let mut difference = ab.clone();
        difference.difference_with(&bc);
        assert_eq!(difference, AttributeSet::from_attributes(4, vec![0]));

        assert!(!ab.is_disjoint(&bc));
        assert!(difference.is_disjoint(&bc));
    }

    #[test]
    fn empty_universe() {
        let set = AttributeSet::full(0);
        assert!(set.is_empty());
        assert_eq!(set.complement().cardinality(), 0);
        assert_eq!(set.next_set_bit(0), None);
    }

    #[test]
    fn searches_span_words() {
        let mut set = AttributeSet::from_attributes(200, vec![3, 70, 130]);
        assert_eq!(set.next_set_bit(0), Some(3));
        assert_eq!(set.next_set_bit(4), Some(70));
        assert_eq!(set.next_set_bit(71), Some(130));
        assert_eq!(set.next_set_bit(131), None);
        assert_eq!(set.next_set_bit(500), None);

        for attribute in vec![3, 70, 130] {
            assert!(!set.is_empty());
            set.remove(attribute);
        }
        assert!(set.is_empty());
    }
}
