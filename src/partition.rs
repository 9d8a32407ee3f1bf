use crate::error::{Error, Result};
use crate::relation::Relation;
use lasso::{Rodeo, Spur};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::debug;

/// Identifies a row by its position in the scanned relation.
pub type RowId = u32;

/// Identifies one cluster of a [`StrippedPartition`].
pub type ClusterId = u32;

/// Stands in for a cluster id when a row shares its value with no other row.
pub const UNIQUE: ClusterId = ClusterId::MAX;

/// The largest number of rows a relation may have. Row ids are kept within the signed 32-bit
/// range so they survive being handed to consumers that store them that way.
pub const MAX_RECORDS: usize = i32::MAX as usize;

/// Groups of row ids which share the same value(s) on some set of attributes.
///
/// Rows whose value is unique are left out entirely: a cluster of one row can never witness two
/// rows agreeing, so it carries no information. That also means an empty partition is the
/// signature of a key: every row is distinguishable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StrippedPartition {
    attribute: Option<usize>,
    clusters: Vec<Vec<RowId>>,
}

impl StrippedPartition {
    /// Creates a partition from the given groups, dropping those with fewer than two rows.
    ///
    /// `attribute` is the column this partition was built for, or `None` for partitions derived
    /// from several columns.
    pub fn new(attribute: Option<usize>, mut clusters: Vec<Vec<RowId>>) -> Self {
        clusters.retain(|cluster| cluster.len() >= 2);
        StrippedPartition {
            attribute,
            clusters,
        }
    }

    /// The partition of the empty attribute set: every row agrees with every other.
    pub fn full(num_records: usize) -> Self {
        StrippedPartition::new(None, vec![(0..num_records as RowId).collect()])
    }

    /// The column this partition describes, if it describes exactly one.
    pub fn attribute(&self) -> Option<usize> {
        self.attribute
    }

    /// The clusters, each holding at least two row ids.
    pub fn clusters(&self) -> &[Vec<RowId>] {
        &self.clusters
    }

    /// Number of clusters.
    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Total number of rows across all clusters.
    pub fn size(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }

    /// Returns `true` if every row is in its own group, i.e. the attributes form a key.
    pub fn is_unique(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Returns `true` if every one of the `num_records` rows has the same value, so the empty set
    /// already determines this partition's attributes.
    ///
    /// ```
    /// use fdhunter::StrippedPartition;
    ///
    /// assert!(StrippedPartition::new(Some(0), vec![]).is_constant(0));
    /// assert!(StrippedPartition::new(Some(0), vec![]).is_constant(1));
    /// assert!(StrippedPartition::new(Some(0), vec![vec![0, 1, 2]]).is_constant(3));
    /// assert!(!StrippedPartition::new(Some(0), vec![vec![0, 1]]).is_constant(3));
    /// ```
    pub fn is_constant(&self, num_records: usize) -> bool {
        num_records <= 1 || (self.clusters.len() == 1 && self.clusters[0].len() == num_records)
    }

    /// Maps every row to its cluster id, or [`UNIQUE`] if the row isn't in any cluster.
    pub fn invert(&self, num_records: usize) -> Vec<ClusterId> {
        let mut inverted = vec![UNIQUE; num_records];
        for (cluster_id, cluster) in self.clusters.iter().enumerate() {
            for &row in cluster {
                inverted[row as usize] = cluster_id as ClusterId;
            }
        }
        inverted
    }

    /// Computes the partition of the union of this partition's attributes with those of `others`.
    ///
    /// Each cluster is split according to which clusters its rows fall into in every other
    /// partition. Rows which are unique in any of them drop out.
    ///
    /// ```
    /// use fdhunter::StrippedPartition;
    ///
    /// let a = StrippedPartition::new(Some(0), vec![vec![0, 1, 2], vec![3, 4]]);
    /// let b = StrippedPartition::new(Some(1), vec![vec![0, 1, 3], vec![2, 4]]);
    ///
    /// let ab = a.intersect(&[&b], 5);
    /// assert_eq!(ab.attribute(), None);
    /// assert_eq!(ab.clusters(), &[vec![0, 1]]);
    /// ```
    pub fn intersect(&self, others: &[&StrippedPartition], num_records: usize) -> StrippedPartition {
        let inverted: Vec<Vec<ClusterId>> = others
            .iter()
            .map(|other| other.invert(num_records))
            .collect();

        let mut clusters = Vec::new();
        // Reused across clusters; the groups are drained into `clusters` in first-seen order so
        // the result doesn't depend on hash iteration order.
        let mut groups: HashMap<SmallVec<[ClusterId; 4]>, usize> = HashMap::new();
        let mut pending: Vec<Vec<RowId>> = Vec::new();
        for cluster in self.clusters.iter() {
            for &row in cluster {
                let key: SmallVec<[ClusterId; 4]> =
                    inverted.iter().map(|column| column[row as usize]).collect();
                if key.contains(&UNIQUE) {
                    continue;
                }
                let next = pending.len();
                let slot = *groups.entry(key).or_insert(next);
                if slot == next {
                    pending.push(Vec::new());
                }
                pending[slot].push(row);
            }
            clusters.extend(pending.drain(..).filter(|group| group.len() >= 2));
            groups.clear();
        }

        StrippedPartition {
            attribute: None,
            clusters,
        }
    }

    /// Returns `true` if every cluster lies entirely within one cluster of the right-hand
    /// partition, given in inverted form (see [`StrippedPartition::invert`]).
    ///
    /// That is exactly the condition for this partition's attributes to functionally determine
    /// the right-hand side.
    ///
    /// ```
    /// use fdhunter::StrippedPartition;
    ///
    /// let a = StrippedPartition::new(Some(0), vec![vec![0, 1], vec![2, 3]]);
    /// let b = StrippedPartition::new(Some(1), vec![vec![0, 1, 2, 3]]);
    /// let c = StrippedPartition::new(Some(2), vec![vec![0, 1]]);
    ///
    /// assert!(a.refines(&b.invert(4)));
    /// assert!(!a.refines(&c.invert(4)));
    /// assert!(c.refines(&a.invert(4)));
    /// ```
    pub fn refines(&self, rhs: &[ClusterId]) -> bool {
        self.clusters.iter().all(|cluster| {
            let target = rhs[cluster[0] as usize];
            target != UNIQUE && cluster[1..].iter().all(|&row| rhs[row as usize] == target)
        })
    }
}

/// The outcome of scanning a relation: one partition per column, plus what the scan saw.
#[derive(Clone, Debug)]
pub struct Partitioning {
    /// One partition per column, in the relation's column order.
    pub partitions: Vec<StrippedPartition>,
    /// Number of rows that were scanned.
    pub num_records: usize,
    /// `true` if the row limit stopped the scan before the relation ran out of rows.
    pub row_bounded: bool,
}

/// Scans a relation once and builds a [`StrippedPartition`] for every column.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartitionBuilder {
    null_equals_null: bool,
    row_limit: Option<usize>,
}

impl PartitionBuilder {
    /// Creates a builder.
    ///
    /// If `null_equals_null` is false, null cells never agree with anything, including other
    /// nulls. If `row_limit` is set, only that many rows are scanned.
    pub fn new(null_equals_null: bool, row_limit: Option<usize>) -> Self {
        PartitionBuilder {
            null_equals_null,
            row_limit,
        }
    }

    /// Reads every remaining row of `relation` and partitions each column by value.
    pub fn build<R: Relation + ?Sized>(&self, relation: &mut R) -> Result<Partitioning> {
        let width = relation.columns().len();

        // Each distinct value is hashed once into the interner, and after that the per-column
        // maps only hash small integer keys. The interner lives exactly as long as the scan.
        let mut values: Rodeo<Spur> = Rodeo::new();
        let mut groups: Vec<HashMap<Spur, Vec<RowId>>> = vec![HashMap::new(); width];
        let mut nulls: Vec<Vec<RowId>> = vec![Vec::new(); width];

        let mut num_records = 0;
        let mut row_bounded = false;
        loop {
            if self.row_limit == Some(num_records) {
                row_bounded = relation.next_row()?.is_some();
                break;
            }
            let row = match relation.next_row()? {
                Some(row) => row,
                None => break,
            };
            check_row_count(num_records + 1)?;
            if row.len() != width {
                return Err(Error::RowWidth {
                    row: num_records,
                    expected: width,
                    found: row.len(),
                });
            }

            let row_id = num_records as RowId;
            for (column, cell) in row.iter().enumerate() {
                match cell {
                    Some(value) => {
                        let key = values.get_or_intern(value.as_str());
                        groups[column].entry(key).or_insert_with(Vec::new).push(row_id);
                    }
                    None => nulls[column].push(row_id),
                }
            }
            num_records += 1;
        }

        let partitions = groups
            .into_iter()
            .zip(nulls)
            .enumerate()
            .map(|(column, (groups, nulls))| {
                let mut clusters: Vec<Vec<RowId>> = groups.into_iter().map(|(_, rows)| rows).collect();
                if self.null_equals_null {
                    clusters.push(nulls);
                }
                // Rows were appended in scan order, so each cluster is already sorted and its
                // first row identifies it. Sorting on that makes cluster ids reproducible.
                clusters.retain(|cluster| cluster.len() >= 2);
                clusters.sort_unstable_by_key(|cluster| cluster[0]);
                StrippedPartition::new(Some(column), clusters)
            })
            .collect();

        debug!(
            num_records,
            distinct_values = values.len(),
            row_bounded,
            "partitioned relation"
        );

        Ok(Partitioning {
            partitions,
            num_records,
            row_bounded,
        })
    }
}

/// Fails if a relation with `num_records` rows can't be addressed with [`RowId`]s.
pub fn check_row_count(num_records: usize) -> Result<()> {
    if num_records > MAX_RECORDS {
        Err(Error::TooManyRows { limit: MAX_RECORDS })
    } else {
        Ok(())
    }
}
