use crate::partition::{ClusterId, RowId, UNIQUE};
use std::collections::HashMap;

/// What [`EqualityWitnessIndex::insert`] found for a row.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Witness {
    /// The row is unique on some attribute of the path, so it agrees with no other row.
    Unique,
    /// No earlier row took this path; this row now represents it.
    First,
    /// An earlier row took exactly the same path.
    Shared(RowId),
}

#[derive(Debug)]
enum WitnessNode {
    Vacant,
    Leaf(RowId),
    Branch(HashMap<ClusterId, WitnessNode>),
}

/// Groups the rows of one cluster by their cluster ids on further attributes, one trie level per
/// attribute, keeping only the first row seen for each group.
///
/// Validation inserts every row of a left-hand cluster and compares each row against the
/// representative of its group as it goes, so it can stop at the first disagreement without
/// ever materializing the intersected partition.
#[derive(Debug)]
pub struct EqualityWitnessIndex {
    root: WitnessNode,
}

impl Default for EqualityWitnessIndex {
    fn default() -> Self {
        EqualityWitnessIndex::new()
    }
}

impl EqualityWitnessIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        EqualityWitnessIndex {
            root: WitnessNode::Vacant,
        }
    }

    /// Forgets every row, so the index can be reused for the next cluster.
    pub fn clear(&mut self) {
        self.root = WitnessNode::Vacant;
    }

    /// Files `row` under `path`, its cluster ids on the attributes being grouped by.
    ///
    /// Every path inserted between two calls to [`EqualityWitnessIndex::clear`] must have the
    /// same length.
    pub fn insert(&mut self, path: &[ClusterId], row: RowId) -> Witness {
        if path.contains(&UNIQUE) {
            return Witness::Unique;
        }

        let mut node = &mut self.root;
        for &cluster in path {
            if let WitnessNode::Vacant = node {
                *node = WitnessNode::Branch(HashMap::new());
            }
            node = match node {
                WitnessNode::Branch(children) => {
                    children.entry(cluster).or_insert(WitnessNode::Vacant)
                }
                _ => unreachable!("witness paths of different lengths in one index"),
            };
        }

        match *node {
            WitnessNode::Leaf(representative) => Witness::Shared(representative),
            WitnessNode::Branch(_) => unreachable!("witness paths of different lengths in one index"),
            WitnessNode::Vacant => {
                *node = WitnessNode::Leaf(row);
                Witness::First
            }
        }
    }
}
