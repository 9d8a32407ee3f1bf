use crate::attribute_set::AttributeSet;
use crate::partition::{ClusterId, RowId, StrippedPartition, UNIQUE};

/// Row-major table of cluster ids: cell `(row, attribute)` says which cluster of `attribute`'s
/// partition the row belongs to, or [`UNIQUE`] if it belongs to none.
///
/// Comparing two rows on an attribute is then a pair of array reads instead of a partition
/// lookup, which is what sampling and validation spend most of their time doing.
#[derive(Clone, Debug)]
pub struct CompressedRowMatrix {
    num_records: usize,
    num_attributes: usize,
    cells: Vec<ClusterId>,
}

impl CompressedRowMatrix {
    /// Builds the matrix from one partition per attribute, in attribute order.
    pub fn new(partitions: &[StrippedPartition], num_records: usize) -> Self {
        let num_attributes = partitions.len();
        let mut cells = vec![UNIQUE; num_records * num_attributes];
        for (attribute, partition) in partitions.iter().enumerate() {
            for (cluster_id, cluster) in partition.clusters().iter().enumerate() {
                for &row in cluster {
                    cells[row as usize * num_attributes + attribute] = cluster_id as ClusterId;
                }
            }
        }
        CompressedRowMatrix {
            num_records,
            num_attributes,
            cells,
        }
    }

    /// Number of rows.
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Number of attributes per row.
    pub fn num_attributes(&self) -> usize {
        self.num_attributes
    }

    /// All of one row's cluster ids.
    pub fn row(&self, row: RowId) -> &[ClusterId] {
        let start = row as usize * self.num_attributes;
        &self.cells[start..start + self.num_attributes]
    }

    /// The cluster id of `row` for `attribute`.
    pub fn cluster(&self, row: RowId, attribute: usize) -> ClusterId {
        self.cells[row as usize * self.num_attributes + attribute]
    }

    /// Returns `true` if the two rows have the same value for `attribute`.
    ///
    /// A row with a unique value agrees with nothing, not even itself under another row id.
    pub fn agrees(&self, a: RowId, b: RowId, attribute: usize) -> bool {
        let cluster = self.cluster(a, attribute);
        cluster != UNIQUE && cluster == self.cluster(b, attribute)
    }

    /// The set of attributes on which the two rows agree.
    pub fn agree_set(&self, a: RowId, b: RowId) -> AttributeSet {
        let mut agreement = AttributeSet::new(self.num_attributes);
        let (a, b) = (self.row(a), self.row(b));
        for (attribute, (x, y)) in a.iter().zip(b).enumerate() {
            if *x != UNIQUE && x == y {
                agreement.insert(attribute);
            }
        }
        agreement
    }
}
