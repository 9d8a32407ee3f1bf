use crate::attribute_set::AttributeSet;
use crate::matrix::CompressedRowMatrix;
use crate::partition::{ClusterId, RowId, StrippedPartition};
use crate::witness::{EqualityWitnessIndex, Witness};
use smallvec::SmallVec;

/// Everything needed to check a dependency against the full relation: the single-attribute
/// partitions and the compressed row matrix derived from them. Read-only once built, so it can
/// be shared freely between validation workers.
#[derive(Clone, Debug)]
pub struct RelationIndex {
    partitions: Vec<StrippedPartition>,
    matrix: CompressedRowMatrix,
    num_records: usize,
}

/// The result of checking `lhs → r` for a batch of right-hand sides `r`.
#[derive(Clone, Debug)]
pub struct Validation {
    /// The left-hand side that was checked.
    pub lhs: AttributeSet,
    /// Right-hand sides that hold.
    pub valid: AttributeSet,
    /// Right-hand sides that don't.
    pub invalid: AttributeSet,
    /// For each failed right-hand side, a pair of rows that agree on `lhs` but not on it.
    pub violations: Vec<(RowId, RowId)>,
}

impl RelationIndex {
    /// Builds the index from one partition per attribute.
    pub fn new(partitions: Vec<StrippedPartition>, num_records: usize) -> Self {
        let matrix = CompressedRowMatrix::new(&partitions, num_records);
        RelationIndex {
            partitions,
            matrix,
            num_records,
        }
    }

    /// Number of rows.
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Number of attributes.
    pub fn num_attributes(&self) -> usize {
        self.partitions.len()
    }

    /// The partition of a single attribute.
    pub fn partition(&self, attribute: usize) -> &StrippedPartition {
        &self.partitions[attribute]
    }

    /// All single-attribute partitions.
    pub fn partitions(&self) -> &[StrippedPartition] {
        &self.partitions
    }

    /// The compressed row matrix.
    pub fn matrix(&self) -> &CompressedRowMatrix {
        &self.matrix
    }

    /// Computes the partition of an attribute set by intersecting its members' partitions.
    pub fn partition_of(&self, lhs: &AttributeSet) -> StrippedPartition {
        let mut attributes = lhs.iter();
        match attributes.next() {
            None => StrippedPartition::full(self.num_records),
            Some(first) => {
                let rest: Vec<&StrippedPartition> =
                    attributes.map(|attribute| &self.partitions[attribute]).collect();
                if rest.is_empty() {
                    self.partitions[first].clone()
                } else {
                    self.partitions[first].intersect(&rest, self.num_records)
                }
            }
        }
    }

    /// Checks `lhs → r` for every `r` in `rhs` at once.
    ///
    /// One attribute of `lhs` (the one with the fewest clustered rows) supplies the clusters to
    /// scan; the rest of `lhs` splits each cluster further through an [`EqualityWitnessIndex`].
    /// Every row is compared with the first row of its group, and a right-hand side drops out at
    /// its first disagreement. The scan stops as soon as nothing is left to check.
    pub fn validate(&self, lhs: &AttributeSet, rhs: &AttributeSet) -> Validation {
        let mut result = Validation {
            lhs: lhs.clone(),
            valid: rhs.clone(),
            invalid: AttributeSet::new(rhs.universe()),
            violations: Vec::new(),
        };
        debug_assert!(lhs.is_disjoint(rhs), "trivial dependency {:?} -> {:?}", lhs, rhs);

        let pivot = match lhs
            .iter()
            .min_by_key(|&attribute| self.partitions[attribute].size())
        {
            Some(pivot) => pivot,
            None => {
                self.validate_constants(&mut result);
                return result;
            }
        };
        let rest: SmallVec<[usize; 8]> = lhs.iter().filter(|&a| a != pivot).collect();

        let mut index = EqualityWitnessIndex::new();
        let mut path: SmallVec<[ClusterId; 8]> = SmallVec::new();
        for cluster in self.partitions[pivot].clusters() {
            index.clear();
            for &row in cluster {
                path.clear();
                path.extend(rest.iter().map(|&attribute| self.matrix.cluster(row, attribute)));
                if let Witness::Shared(representative) = index.insert(&path, row) {
                    self.compare(representative, row, &mut result);
                    if result.valid.is_empty() {
                        return result;
                    }
                }
            }
        }
        result
    }

    fn compare(&self, representative: RowId, row: RowId, result: &mut Validation) {
        let mut failed = false;
        for attribute in result.valid.iter() {
            if !self.matrix.agrees(representative, row, attribute) {
                result.invalid.insert(attribute);
                failed = true;
            }
        }
        if failed {
            result.valid.difference_with(&result.invalid);
            result.violations.push((representative, row));
        }
    }

    fn validate_constants(&self, result: &mut Validation) {
        let candidates: Vec<usize> = result.valid.iter().collect();
        for attribute in candidates {
            if self.partitions[attribute].is_constant(self.num_records) {
                continue;
            }
            result.valid.remove(attribute);
            result.invalid.insert(attribute);
            // A non-constant column has at least two rows, and some row disagrees with row 0.
            if let Some(row) = (1..self.num_records as RowId)
                .find(|&row| !self.matrix.agrees(0, row, attribute))
            {
                result.violations.push((0, row));
            }
        }
    }
}
