#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate discovers the functional dependencies of a relation: every minimal `X → A` such
//! that any two rows agreeing on all the columns in `X` also agree on column `A`.
//!
//! It follows the hybrid approach described in:
//!
//! - Papenbrock and Naumann, [A Hybrid Approach to Functional Dependency Discovery][hyfd], 2016
//!
//! [hyfd]: https://dl.acm.org/doi/10.1145/2882903.2915203
//!
//! Two kinds of evidence feed each other. Comparing pairs of rows is cheap and proves
//! *non*-dependencies: if two rows agree on `X` but not on `A`, then `X ↛ A`. Those go into a
//! [`NegativeCover`], which is inverted into a [`PositiveCover`] of candidate dependencies.
//! Checking a candidate against the whole relation is expensive but exact, and every failed
//! check names another pair of rows worth comparing. [`Discovery`] alternates between the two
//! until the positive cover has been validated level by level.
//!
//! ```
//! use fdhunter::{Discovery, DiscoveryConfig, TsvOptions, TsvRelation};
//!
//! let data = "zip\tcity\tstreet\n\
//!             10115\tBerlin\tInvalidenstr\n\
//!             10117\tBerlin\tFriedrichstr\n\
//!             20095\tHamburg\tFriedrichstr\n";
//! let mut relation = TsvRelation::new(data.as_bytes(), TsvOptions::default()).unwrap();
//! let outcome = Discovery::new(DiscoveryConfig::default()).run(&mut relation).unwrap();
//! let found: Vec<String> = outcome.dependencies.iter().map(|fd| fd.to_string()).collect();
//! assert_eq!(
//!     found,
//!     vec!["[zip] --> city", "[zip] --> street", "[city, street] --> zip"]
//! );
//! ```

mod attribute_set;
mod driver;
mod error;
mod matrix;
mod negative;
mod output;
mod partition;
mod positive;
mod relation;
mod sampling;
mod trie;
mod validation;
mod witness;

pub use attribute_set::AttributeSet;
pub use driver::{
    Completeness, Discovery, DiscoveryConfig, DiscoveryOutcome, Statistics, Summary,
};
pub use error::{Error, Result};
pub use matrix::CompressedRowMatrix;
pub use negative::NegativeCover;
pub use output::{ColumnIdentifier, FunctionalDependency, ResultReceiver, TextWriter};
pub use partition::{
    check_row_count, ClusterId, PartitionBuilder, Partitioning, RowId, StrippedPartition,
    MAX_RECORDS, UNIQUE,
};
pub use positive::{PositiveCover, Specialization};
pub use relation::{InMemoryRelation, Relation, Row, TsvOptions, TsvRelation};
pub use sampling::{AgreeSetTrie, Sampler, SamplingRound};
pub use trie::{AttributeTrie, CoverKind, Invalid, Valid};
pub use validation::{RelationIndex, Validation};
pub use witness::{EqualityWitnessIndex, Witness};
