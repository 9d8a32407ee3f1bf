//! Cheap evidence: comparing row pairs to find the attribute sets they agree on.
//!
//! Every pair of rows that agrees on exactly the attributes `X` proves `X ↛ A` for every other
//! attribute `A`. Sampling can't prove that anything *is* a dependency, but a good sample rules
//! out most candidates before any partition has to be intersected.

use crate::attribute_set::AttributeSet;
use crate::matrix::CompressedRowMatrix;
use crate::partition::RowId;
use crate::validation::RelationIndex;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
struct AgreeNode {
    children: BTreeMap<usize, AgreeNode>,
    terminal: bool,
}

impl AgreeNode {
    fn collect(&self, current: &mut AttributeSet, found: &mut Vec<AttributeSet>) {
        if self.terminal {
            found.push(current.clone());
        }
        for (&attribute, child) in self.children.iter() {
            current.insert(attribute);
            child.collect(current, found);
            current.remove(attribute);
        }
    }
}

/// Every distinct agree set observed so far, as a trie over the attributes in increasing order.
/// A node is terminal if some compared pair agreed on exactly its path.
#[derive(Debug)]
pub struct AgreeSetTrie {
    universe: usize,
    root: AgreeNode,
    len: usize,
}

impl AgreeSetTrie {
    /// Creates an empty trie over `universe` attributes.
    pub fn new(universe: usize) -> Self {
        AgreeSetTrie {
            universe,
            root: AgreeNode::default(),
            len: 0,
        }
    }

    /// Number of distinct agree sets recorded.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Compares two rows and records the attributes they agree on. Returns that agree set if it
    /// hadn't been seen before.
    pub fn add_matches(
        &mut self,
        matrix: &CompressedRowMatrix,
        a: RowId,
        b: RowId,
    ) -> Option<AttributeSet> {
        let mut agreement = AttributeSet::new(self.universe);
        let mut node = &mut self.root;
        for attribute in 0..self.universe {
            if matrix.agrees(a, b, attribute) {
                agreement.insert(attribute);
                node = node.children.entry(attribute).or_insert_with(AgreeNode::default);
            }
        }
        if node.terminal {
            None
        } else {
            node.terminal = true;
            self.len += 1;
            Some(agreement)
        }
    }

    /// Records an agree set directly. Returns `true` if it was new.
    pub fn insert(&mut self, agree_set: &AttributeSet) -> bool {
        let mut node = &mut self.root;
        for attribute in agree_set.iter() {
            node = node.children.entry(attribute).or_insert_with(AgreeNode::default);
        }
        let new = !node.terminal;
        node.terminal = true;
        if new {
            self.len += 1;
        }
        new
    }

    /// Returns `true` if exactly this agree set has been recorded.
    pub fn contains(&self, agree_set: &AttributeSet) -> bool {
        let mut node = &self.root;
        for attribute in agree_set.iter() {
            match node.children.get(&attribute) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.terminal
    }

    /// Every recorded agree set, in lexicographic order of their attribute lists.
    pub fn as_attribute_sets(&self) -> Vec<AttributeSet> {
        let mut found = Vec::with_capacity(self.len);
        let mut current = AttributeSet::new(self.universe);
        self.root.collect(&mut current, &mut found);
        found
    }
}

/// Tallies from one call to [`Sampler::sample`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SamplingRound {
    /// Row pairs compared.
    pub comparisons: usize,
    /// Attributes whose clusters ran out of pairs to compare.
    pub exhausted: usize,
}

/// Compares rows that share a value on some attribute, at growing distances.
///
/// Within each cluster, rows are sorted by all of their cluster ids, so neighbours tend to agree
/// on many attributes. Those pairs give the largest agree sets, which rule out the most
/// candidates. Each attribute compares every row with the one `window` places further on, then
/// widens the window, for as long as each widening still turns up new agree sets at a rate of at
/// least the efficiency threshold.
#[derive(Debug)]
pub struct Sampler {
    order: Vec<usize>,
    clusters: Vec<Vec<Vec<RowId>>>,
    windows: Vec<usize>,
    threshold: f64,
}

impl Sampler {
    /// Prepares sorted copies of every attribute's clusters.
    pub fn new(index: &RelationIndex, threshold: f64) -> Self {
        let matrix = index.matrix();
        let clusters: Vec<Vec<Vec<RowId>>> = index
            .partitions()
            .iter()
            .map(|partition| {
                partition
                    .clusters()
                    .iter()
                    .map(|cluster| {
                        let mut rows = cluster.clone();
                        rows.sort_by(|&a, &b| matrix.row(a).cmp(matrix.row(b)));
                        rows
                    })
                    .collect()
            })
            .collect();

        // Attributes with few clusters are cheapest to sweep, so they go first.
        let mut order: Vec<usize> = (0..clusters.len()).collect();
        order.sort_by_key(|&attribute| clusters[attribute].len());

        Sampler {
            windows: vec![1; clusters.len()],
            order,
            clusters,
            threshold,
        }
    }

    /// The efficiency an attribute's latest window must reach for sampling to widen it further.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Runs one round of sampling, recording agree sets in `agree_sets` and returning the ones
    /// that were new. Each round lowers the threshold for the next one, so later rounds dig
    /// deeper.
    pub fn sample(
        &mut self,
        index: &RelationIndex,
        agree_sets: &mut AgreeSetTrie,
    ) -> (Vec<AttributeSet>, SamplingRound) {
        let matrix = index.matrix();
        let mut found = Vec::new();
        let mut round = SamplingRound::default();

        for &attribute in self.order.iter() {
            loop {
                let window = self.windows[attribute];
                let mut comparisons = 0;
                let mut discoveries = 0;
                for cluster in self.clusters[attribute].iter() {
                    for (i, &a) in cluster.iter().enumerate() {
                        let b = match cluster.get(i + window) {
                            Some(&b) => b,
                            None => break,
                        };
                        comparisons += 1;
                        if let Some(agree_set) = agree_sets.add_matches(matrix, a, b) {
                            discoveries += 1;
                            found.push(agree_set);
                        }
                    }
                }

                round.comparisons += comparisons;
                if comparisons == 0 {
                    round.exhausted += 1;
                    break;
                }
                self.windows[attribute] += 1;
                if (discoveries as f64) / (comparisons as f64) < self.threshold {
                    break;
                }
            }
        }

        debug!(
            comparisons = round.comparisons,
            new_agree_sets = found.len(),
            exhausted = round.exhausted,
            threshold = self.threshold,
            "sampling round"
        );
        self.threshold /= 2.0;
        (found, round)
    }

    /// Compares specific row pairs, such as the witnesses of failed validations. Returns the
    /// agree sets that were new.
    pub fn compare(
        index: &RelationIndex,
        pairs: &[(RowId, RowId)],
        agree_sets: &mut AgreeSetTrie,
    ) -> Vec<AttributeSet> {
        pairs
            .iter()
            .filter_map(|&(a, b)| agree_sets.add_matches(index.matrix(), a, b))
            .collect()
    }
}
