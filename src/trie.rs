//! A prefix tree over attribute sets, used for both covers.
//!
//! A path from the root visits attributes in increasing order, so every node stands for exactly
//! one left-hand side: the set of attributes on its path. Each node carries two right-hand sets:
//!
//! - `confirmed`: the attributes `R` for which this left-hand side is currently recorded, and
//! - `associated`: the attributes confirmed here or anywhere below, which lets every search
//!   skip whole subtrees that can't contain the right-hand side it's looking for.
//!
//! What "recorded" means depends on the cover. In a [`PositiveCover`](crate::PositiveCover) it's
//! a candidate or validated dependency `L → R`; in a [`NegativeCover`](crate::NegativeCover) it's
//! a non-dependency `L ↛ R`. The two meanings pull minimality in opposite directions (smallest
//! left-hand sides for dependencies, largest for non-dependencies) so they get distinct types that
//! share this one implementation of the searches.

use crate::attribute_set::AttributeSet;
use std::fmt;
use std::marker::PhantomData;

/// Marks what the entries of an [`AttributeTrie`] mean.
pub trait CoverKind {
    /// Describes one entry, for debug output.
    const ARROW: &'static str;
}

/// Entries are functional dependencies.
#[derive(Clone, Copy, Debug)]
pub enum Valid {}

/// Entries are non-dependencies.
#[derive(Clone, Copy, Debug)]
pub enum Invalid {}

impl CoverKind for Valid {
    const ARROW: &'static str = "->";
}

impl CoverKind for Invalid {
    const ARROW: &'static str = "-/->";
}

#[derive(Clone, Debug)]
struct TrieNode {
    associated: AttributeSet,
    confirmed: AttributeSet,
    children: Vec<Option<Box<TrieNode>>>,
}

impl TrieNode {
    fn new(universe: usize) -> Self {
        TrieNode {
            associated: AttributeSet::new(universe),
            confirmed: AttributeSet::new(universe),
            children: Vec::new(),
        }
    }

    fn child(&self, attribute: usize) -> Option<&TrieNode> {
        self.children.get(attribute).and_then(|child| child.as_deref())
    }

    fn child_mut(&mut self, attribute: usize) -> Option<&mut TrieNode> {
        self.children
            .get_mut(attribute)
            .and_then(|child| child.as_deref_mut())
    }

    fn child_or_insert(&mut self, attribute: usize, universe: usize) -> &mut TrieNode {
        if self.children.is_empty() {
            self.children.resize_with(universe, || None);
        }
        self.children[attribute].get_or_insert_with(|| Box::new(TrieNode::new(universe)))
    }

    fn children(&self) -> impl Iterator<Item = (usize, &TrieNode)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(attribute, child)| child.as_deref().map(|child| (attribute, child)))
    }

    /// Recomputes whether `rhs` is confirmed here or below, assuming the children are correct.
    fn refresh(&mut self, rhs: usize) {
        let below = self.children().any(|(_, child)| child.associated.contains(rhs));
        if below || self.confirmed.contains(rhs) {
            self.associated.insert(rhs);
        } else {
            self.associated.remove(rhs);
        }
    }

    fn find_generalization(
        &self,
        lhs: &AttributeSet,
        rhs: usize,
        from: usize,
        depth: usize,
        strict: bool,
    ) -> bool {
        if self.confirmed.contains(rhs) && !(strict && depth == lhs.cardinality()) {
            return true;
        }
        let mut next = lhs.next_set_bit(from);
        while let Some(attribute) = next {
            if let Some(child) = self.child(attribute) {
                if child.associated.contains(rhs)
                    && child.find_generalization(lhs, rhs, attribute + 1, depth + 1, strict)
                {
                    return true;
                }
            }
            next = lhs.next_set_bit(attribute + 1);
        }
        false
    }

    fn collect_generalizations(
        &self,
        lhs: &AttributeSet,
        rhs: usize,
        from: usize,
        current: &mut AttributeSet,
        found: &mut Vec<AttributeSet>,
    ) {
        if self.confirmed.contains(rhs) {
            found.push(current.clone());
        }
        let mut next = lhs.next_set_bit(from);
        while let Some(attribute) = next {
            if let Some(child) = self.child(attribute) {
                if child.associated.contains(rhs) {
                    current.insert(attribute);
                    child.collect_generalizations(lhs, rhs, attribute + 1, current, found);
                    current.remove(attribute);
                }
            }
            next = lhs.next_set_bit(attribute + 1);
        }
    }

    fn find_specialization(
        &self,
        lhs: &AttributeSet,
        rhs: usize,
        from: usize,
        extended: bool,
        strict: bool,
    ) -> bool {
        match lhs.next_set_bit(from) {
            None => {
                if self.confirmed.contains(rhs) && (extended || !strict) {
                    return true;
                }
                // Every attribute of `lhs` is on the path already, so anything below is a
                // specialization.
                self.children().any(|(attribute, child)| {
                    child.associated.contains(rhs)
                        && child.find_specialization(lhs, rhs, attribute + 1, true, strict)
                })
            }
            Some(required) => {
                // The path may pick up extra attributes before reaching the next required one,
                // but it can't skip past it: attributes only increase along a path.
                self.children()
                    .skip_while(|(attribute, _)| *attribute < from)
                    .take_while(|(attribute, _)| *attribute <= required)
                    .any(|(attribute, child)| {
                        child.associated.contains(rhs)
                            && child.find_specialization(
                                lhs,
                                rhs,
                                attribute + 1,
                                extended || attribute != required,
                                strict,
                            )
                    })
            }
        }
    }

    fn remove(&mut self, lhs: &AttributeSet, rhs: usize, from: usize) -> bool {
        let removed = match lhs.next_set_bit(from) {
            None => self.confirmed.remove(rhs),
            Some(attribute) => {
                let removed = match self.child_mut(attribute) {
                    Some(child) => child.remove(lhs, rhs, attribute + 1),
                    None => false,
                };
                if removed && self.child(attribute).map_or(false, |c| c.associated.is_empty()) {
                    self.children[attribute] = None;
                }
                removed
            }
        };
        if removed {
            self.refresh(rhs);
        }
        removed
    }

    fn collect(
        &self,
        current: &mut AttributeSet,
        level: Option<usize>,
        found: &mut Vec<(AttributeSet, AttributeSet)>,
    ) {
        let depth = current.cardinality();
        if !self.confirmed.is_empty() && level.map_or(true, |level| level == depth) {
            found.push((current.clone(), self.confirmed.clone()));
        }
        if level.map_or(false, |level| depth >= level) {
            return;
        }
        for (attribute, child) in self.children() {
            current.insert(attribute);
            child.collect(current, level, found);
            current.remove(attribute);
        }
    }

    fn fold_below(&mut self, depth: usize, cut: usize) {
        if depth == cut {
            let associated = self.associated.clone();
            self.confirmed = associated;
            self.children.clear();
            return;
        }
        for child in self.children.iter_mut().flatten() {
            child.fold_below(depth + 1, cut);
        }
    }

    fn depth(&self) -> usize {
        self.children()
            .map(|(_, child)| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// A set of `lhs → rhs` entries stored as a prefix tree over left-hand sides.
///
/// The kind parameter `K` says whether entries are dependencies ([`Valid`]) or non-dependencies
/// ([`Invalid`]); the searches are the same for both.
///
/// ```
/// use fdhunter::{AttributeSet, PositiveCover};
///
/// let mut cover = PositiveCover::new(4);
/// let a = AttributeSet::from_attributes(4, vec![0]);
/// let ab = AttributeSet::from_attributes(4, vec![0, 1]);
/// let bc = AttributeSet::from_attributes(4, vec![1, 2]);
///
/// cover.add_one(&a, 3);
/// assert!(cover.contains_or_generalization(&ab, 3));
/// assert!(!cover.contains_or_generalization(&bc, 3));
/// assert!(cover.contains_or_specialization(&AttributeSet::new(4), 3));
/// assert!(!cover.contains_or_specialization(&ab, 3));
/// ```
pub struct AttributeTrie<K> {
    universe: usize,
    root: TrieNode,
    kind: PhantomData<K>,
}

impl<K> Clone for AttributeTrie<K> {
    fn clone(&self) -> Self {
        AttributeTrie {
            universe: self.universe,
            root: self.root.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: CoverKind> fmt::Debug for AttributeTrie<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (lhs, rhs) in self.entries() {
            list.entry(&format_args!("{:?} {} {:?}", lhs, K::ARROW, rhs));
        }
        list.finish()
    }
}

impl<K> AttributeTrie<K> {
    /// Creates an empty trie over `universe` attributes.
    pub fn new(universe: usize) -> Self {
        AttributeTrie {
            universe,
            root: TrieNode::new(universe),
            kind: PhantomData,
        }
    }

    /// Number of attributes in the universe.
    pub fn universe(&self) -> usize {
        self.universe
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.root.associated.is_empty()
    }

    /// Records `lhs → r` for every `r` in `rhs`.
    ///
    /// This doesn't look for generalizations or specializations; see the cover-specific
    /// insertion methods for that.
    pub fn add(&mut self, lhs: &AttributeSet, rhs: &AttributeSet) {
        let universe = self.universe;
        let mut node = &mut self.root;
        node.associated.union_with(rhs);
        for attribute in lhs.iter() {
            node = node.child_or_insert(attribute, universe);
            node.associated.union_with(rhs);
        }
        node.confirmed.union_with(rhs);
    }

    /// Records `lhs → rhs`.
    pub fn add_one(&mut self, lhs: &AttributeSet, rhs: usize) {
        self.add(lhs, &AttributeSet::from_attributes(self.universe, Some(rhs)));
    }

    /// Returns `true` if exactly `lhs → rhs` is recorded.
    pub fn contains(&self, lhs: &AttributeSet, rhs: usize) -> bool {
        self.rhs_of(lhs).map_or(false, |confirmed| confirmed.contains(rhs))
    }

    /// Returns every right-hand side recorded for exactly `lhs`, if its node exists.
    pub fn rhs_of(&self, lhs: &AttributeSet) -> Option<&AttributeSet> {
        let mut node = &self.root;
        for attribute in lhs.iter() {
            node = node.child(attribute)?;
        }
        Some(&node.confirmed)
    }

    /// Returns `true` if `l → rhs` is recorded for `lhs` itself or any subset of it.
    pub fn contains_or_generalization(&self, lhs: &AttributeSet, rhs: usize) -> bool {
        self.root.associated.contains(rhs) && self.root.find_generalization(lhs, rhs, 0, 0, false)
    }

    /// Returns `true` if `l → rhs` is recorded for some proper subset `l` of `lhs`.
    pub fn contains_strict_generalization(&self, lhs: &AttributeSet, rhs: usize) -> bool {
        self.root.associated.contains(rhs) && self.root.find_generalization(lhs, rhs, 0, 0, true)
    }

    /// Returns every recorded left-hand side `l ⊆ lhs` with `l → rhs`.
    pub fn generalizations(&self, lhs: &AttributeSet, rhs: usize) -> Vec<AttributeSet> {
        let mut found = Vec::new();
        if self.root.associated.contains(rhs) {
            let mut current = AttributeSet::new(self.universe);
            self.root
                .collect_generalizations(lhs, rhs, 0, &mut current, &mut found);
        }
        found
    }

    /// Returns `true` if `l → rhs` is recorded for `lhs` itself or any superset of it.
    pub fn contains_or_specialization(&self, lhs: &AttributeSet, rhs: usize) -> bool {
        self.root.associated.contains(rhs)
            && self.root.find_specialization(lhs, rhs, 0, false, false)
    }

    /// Returns `true` if `l → rhs` is recorded for some proper superset `l` of `lhs`.
    pub fn contains_strict_specialization(&self, lhs: &AttributeSet, rhs: usize) -> bool {
        self.root.associated.contains(rhs)
            && self.root.find_specialization(lhs, rhs, 0, false, true)
    }

    /// Removes `lhs → rhs`, pruning nodes that no longer lead to any entry. Returns `true` if the
    /// entry was there.
    pub fn remove(&mut self, lhs: &AttributeSet, rhs: usize) -> bool {
        self.root.remove(lhs, rhs, 0)
    }

    /// Every node at depth `level` with at least one entry, as `(lhs, rhs)` pairs.
    pub fn level(&self, level: usize) -> Vec<(AttributeSet, AttributeSet)> {
        let mut found = Vec::new();
        let mut current = AttributeSet::new(self.universe);
        self.root.collect(&mut current, Some(level), &mut found);
        found
    }

    /// Every node with at least one entry, depth first, as `(lhs, rhs)` pairs.
    pub fn entries(&self) -> Vec<(AttributeSet, AttributeSet)> {
        let mut found = Vec::new();
        let mut current = AttributeSet::new(self.universe);
        self.root.collect(&mut current, None, &mut found);
        found
    }

    /// Number of `lhs → r` entries, counting each right-hand attribute separately. Walks the
    /// whole trie, so callers should not use it in loops.
    pub fn len(&self) -> usize {
        self.entries()
            .iter()
            .map(|(_, rhs)| rhs.cardinality())
            .sum()
    }

    /// Size of the largest left-hand side in the trie.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Removes every entry `l → r` for which some proper superset of `l` also has `r`, leaving
    /// only maximal left-hand sides.
    pub fn filter_generalizations(&mut self) -> usize {
        let mut doomed = Vec::new();
        for (lhs, rhs) in self.entries() {
            for r in rhs.iter() {
                if self.contains_strict_specialization(&lhs, r) {
                    doomed.push((lhs.clone(), r));
                }
            }
        }
        for (lhs, r) in doomed.iter() {
            self.remove(lhs, *r);
        }
        doomed.len()
    }

    /// Removes every entry `l → r` for which some proper subset of `l` also has `r`, leaving
    /// only minimal left-hand sides.
    ///
    /// Deciding all removals before making any is safe: if `l` goes because of a smaller `g`,
    /// then either `g` stays or something smaller than `g` does, and that still covers `l`.
    pub fn filter_specializations(&mut self) -> usize {
        let mut doomed = Vec::new();
        for (lhs, rhs) in self.entries() {
            for r in rhs.iter() {
                if self.contains_strict_generalization(&lhs, r) {
                    doomed.push((lhs.clone(), r));
                }
            }
        }
        for (lhs, r) in doomed.iter() {
            self.remove(lhs, *r);
        }
        doomed.len()
    }

    /// Cuts the trie off below depth `depth`: every entry with a larger left-hand side is moved
    /// to the ancestor at that depth, i.e. replaced by a generalization of itself.
    pub(crate) fn fold_below(&mut self, depth: usize) {
        self.root.fold_below(0, depth);
    }
}
