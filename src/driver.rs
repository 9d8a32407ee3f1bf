//! The discovery run: sampling, cover inversion and validation, alternating until the positive
//! cover is closed.

use crate::attribute_set::AttributeSet;
use crate::error::{Error, Result};
use crate::negative::NegativeCover;
use crate::output::{ColumnIdentifier, FunctionalDependency, ResultReceiver};
use crate::partition::{PartitionBuilder, RowId, StrippedPartition};
use crate::positive::{PositiveCover, Specialization};
use crate::relation::Relation;
use crate::sampling::{AgreeSetTrie, Sampler};
use crate::validation::{RelationIndex, Validation};
use rayon::prelude::*;
use tracing::{debug, info, info_span};

/// Settings for one discovery run.
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Whether two null cells count as equal. If not, a null agrees with nothing.
    pub null_equals_null: bool,
    /// Scan at most this many rows.
    pub row_limit: Option<usize>,
    /// Don't report dependencies with more than this many columns on the left.
    pub max_lhs_size: Option<usize>,
    /// Sampling keeps widening an attribute's comparison window while at least this fraction of
    /// comparisons produce new agree sets. Halved after every sampling round.
    pub efficiency_threshold: f64,
    /// Return to sampling after a level if more than this fraction of its candidates failed.
    pub invalid_ratio_threshold: f64,
    /// Search the relation for maximal non-dependencies up front, instead of relying on
    /// sampling alone. Exact, but can be very expensive on wide tables.
    pub exhaustive_negative_cover: bool,
    /// Validate the candidates of a level on the rayon thread pool.
    pub parallel_validation: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            null_equals_null: false,
            row_limit: None,
            max_lhs_size: None,
            efficiency_threshold: 0.01,
            invalid_ratio_threshold: 0.01,
            exhaustive_negative_cover: false,
            parallel_validation: true,
        }
    }
}

impl DiscoveryConfig {
    /// Sets whether nulls are equal to each other.
    pub fn with_null_equals_null(mut self, null_equals_null: bool) -> Self {
        self.null_equals_null = null_equals_null;
        self
    }

    /// Limits the scan to `limit` rows. Zero or less means no limit.
    pub fn with_row_limit(mut self, limit: i64) -> Self {
        self.row_limit = positive(limit);
        self
    }

    /// Limits left-hand sides to `size` columns. Zero or less means no limit.
    pub fn with_max_lhs_size(mut self, size: i64) -> Self {
        self.max_lhs_size = positive(size);
        self
    }

    /// Sets the initial sampling efficiency threshold.
    pub fn with_efficiency_threshold(mut self, threshold: f64) -> Self {
        self.efficiency_threshold = threshold;
        self
    }

    /// Sets the failure ratio that sends a run back to sampling.
    pub fn with_invalid_ratio_threshold(mut self, threshold: f64) -> Self {
        self.invalid_ratio_threshold = threshold;
        self
    }

    /// Enables or disables the up-front search for maximal non-dependencies.
    pub fn with_exhaustive_negative_cover(mut self, exhaustive: bool) -> Self {
        self.exhaustive_negative_cover = exhaustive;
        self
    }

    /// Enables or disables parallel validation.
    pub fn with_parallel_validation(mut self, parallel: bool) -> Self {
        self.parallel_validation = parallel;
        self
    }
}

fn positive(limit: i64) -> Option<usize> {
    if limit > 0 {
        Some(limit as usize)
    } else {
        None
    }
}

/// Whether a run saw everything there was to see.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Completeness {
    /// The row limit cut the scan short. Dependencies hold on the scanned prefix only.
    pub row_bounded: bool,
    /// The left-hand side limit kept some candidates from being explored, so minimal
    /// dependencies with larger left-hand sides may be missing.
    pub depth_bounded: bool,
}

impl Completeness {
    /// Returns `true` if neither limit took effect.
    pub fn is_complete(&self) -> bool {
        !self.row_bounded && !self.depth_bounded
    }
}

/// Counters describing how a run went.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    /// Rows scanned.
    pub records: usize,
    /// Row pairs compared while sampling.
    pub comparisons: usize,
    /// Distinct agree sets observed.
    pub agree_sets: usize,
    /// Entries in the negative cover when the run finished.
    pub non_dependencies: usize,
    /// Left-hand sides checked against partitions.
    pub validations: usize,
    /// Candidates rejected by validation or by recorded non-dependencies.
    pub rejected: usize,
    /// Levels of the positive cover that were validated.
    pub levels: usize,
    /// Sampling rounds, including the first.
    pub sampling_rounds: usize,
    /// Dependencies reported.
    pub dependencies: usize,
}

/// What [`Discovery::run_with`] reports besides the dependencies themselves.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    /// Whether the result is exhaustive.
    pub completeness: Completeness,
    /// Run counters.
    pub statistics: Statistics,
}

/// The dependencies found by [`Discovery::run`], sorted, along with the run's summary.
#[derive(Clone, Debug)]
pub struct DiscoveryOutcome {
    /// Every minimal dependency, ordered by left-hand side then right-hand side.
    pub dependencies: Vec<FunctionalDependency>,
    /// Whether the result is exhaustive.
    pub completeness: Completeness,
    /// Run counters.
    pub statistics: Statistics,
}

/// Finds the minimal functional dependencies of a relation.
///
/// ```
/// use fdhunter::{Discovery, DiscoveryConfig, InMemoryRelation};
///
/// let mut relation = InMemoryRelation::from_strs(
///     "r",
///     &["A", "B", "C"],
///     &[&["1", "2", "5"], &["2", "2", "4"], &["3", "3", "4"], &["4", "3", "4"]],
///     None,
/// );
/// let outcome = Discovery::new(DiscoveryConfig::default()).run(&mut relation).unwrap();
/// let found: Vec<String> = outcome.dependencies.iter().map(|fd| fd.to_string()).collect();
/// assert_eq!(found, vec!["[A] --> B", "[A] --> C"]);
/// assert!(outcome.completeness.is_complete());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    /// Creates a discovery engine with the given settings.
    pub fn new(config: DiscoveryConfig) -> Self {
        Discovery { config }
    }

    /// Scans `relation` and returns every minimal dependency, sorted.
    pub fn run<R: Relation + ?Sized>(&self, relation: &mut R) -> Result<DiscoveryOutcome> {
        let mut dependencies = Vec::new();
        let summary = self.run_with(relation, &mut dependencies)?;
        dependencies.sort_by_cached_key(|fd| {
            (
                fd.lhs.len(),
                fd.lhs.iter().map(|column| column.index).collect::<Vec<_>>(),
                fd.rhs.index,
            )
        });
        Ok(DiscoveryOutcome {
            dependencies,
            completeness: summary.completeness,
            statistics: summary.statistics,
        })
    }

    /// Scans `relation` and hands every minimal dependency to `receiver`, in no particular
    /// order.
    ///
    /// Nothing reaches the receiver until the run has finished, so an aborted run reports
    /// nothing.
    pub fn run_with<R, X>(&self, relation: &mut R, receiver: &mut X) -> Result<Summary>
    where
        R: Relation + ?Sized,
        X: ResultReceiver + ?Sized,
    {
        let span = info_span!("discovery", relation = relation.name());
        let _entered = span.enter();

        let relation_name = relation.name().to_string();
        let columns = relation.columns().to_vec();
        let partitioning =
            PartitionBuilder::new(self.config.null_equals_null, self.config.row_limit)
                .build(relation)?;

        // Columns with fewer clusters come first. Everything inside the run works on these
        // positions; `order` maps them back to the relation's columns.
        let mut order: Vec<usize> = (0..columns.len()).collect();
        order.sort_by_key(|&column| (partitioning.partitions[column].num_clusters(), column));
        let mut partitions = partitioning.partitions;
        let mut reordered = Vec::with_capacity(partitions.len());
        for &column in order.iter() {
            reordered.push(std::mem::replace(
                &mut partitions[column],
                StrippedPartition::new(None, Vec::new()),
            ));
        }

        let index = RelationIndex::new(reordered, partitioning.num_records);
        let mut run = Run::new(&self.config, &index);
        run.statistics.records = partitioning.num_records;
        run.execute()?;

        let identify = |attribute: usize| {
            let column = order[attribute];
            ColumnIdentifier {
                relation: relation_name.clone(),
                column: columns[column].clone(),
                index: column,
            }
        };
        for (lhs, rhs) in run.positive.entries() {
            let mut lhs: Vec<ColumnIdentifier> = lhs.iter().map(identify).collect();
            lhs.sort_by_key(|column| column.index);
            for r in rhs.iter() {
                receiver.receive(FunctionalDependency {
                    lhs: lhs.clone(),
                    rhs: identify(r),
                })?;
                run.statistics.dependencies += 1;
            }
        }

        let summary = Summary {
            completeness: Completeness {
                row_bounded: partitioning.row_bounded,
                depth_bounded: run.depth_bounded,
            },
            statistics: run.statistics,
        };
        info!(
            dependencies = summary.statistics.dependencies,
            complete = summary.completeness.is_complete(),
            "discovery finished"
        );
        Ok(summary)
    }
}

/// The fraction of validated right-hand sides that failed.
fn invalid_ratio(results: &[Validation]) -> f64 {
    let failed: usize = results.iter().map(|r| r.invalid.cardinality()).sum();
    let checked: usize = results
        .iter()
        .map(|r| r.valid.cardinality() + r.invalid.cardinality())
        .sum();
    if checked == 0 {
        0.0
    } else {
        failed as f64 / checked as f64
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Sampling,
    NegativeCoverBuild,
    CandidateDerivation,
    Validation,
    Minimize,
    Done,
}

struct Run<'a> {
    config: &'a DiscoveryConfig,
    index: &'a RelationIndex,
    sampler: Sampler,
    agree_sets: AgreeSetTrie,
    negative: NegativeCover,
    positive: PositiveCover,
    /// Levels below this one have been validated.
    level: usize,
    /// Whether the next sampling phase runs the sampler, not just the suggested pairs.
    resample: bool,
    /// Whether the covers have been built yet.
    seeded: bool,
    suggestions: Vec<(RowId, RowId)>,
    fresh_agree_sets: Vec<AttributeSet>,
    fresh_non_dependencies: Vec<(AttributeSet, AttributeSet)>,
    depth_bounded: bool,
    statistics: Statistics,
}

impl<'a> Run<'a> {
    fn new(config: &'a DiscoveryConfig, index: &'a RelationIndex) -> Self {
        let universe = index.num_attributes();
        Run {
            config,
            index,
            sampler: Sampler::new(index, config.efficiency_threshold),
            agree_sets: AgreeSetTrie::new(universe),
            negative: NegativeCover::new(universe),
            positive: PositiveCover::seeded(universe),
            level: 0,
            resample: true,
            seeded: false,
            suggestions: Vec::new(),
            fresh_agree_sets: Vec::new(),
            fresh_non_dependencies: Vec::new(),
            depth_bounded: false,
            statistics: Statistics::default(),
        }
    }

    fn execute(&mut self) -> Result<()> {
        let mut phase = Phase::Sampling;
        while phase != Phase::Done {
            phase = match phase {
                Phase::Sampling => self.sample(),
                Phase::NegativeCoverBuild => self.build_negative_cover(),
                Phase::CandidateDerivation => self.derive_candidates()?,
                Phase::Validation => self.validate_level()?,
                Phase::Minimize => self.minimize()?,
                Phase::Done => Phase::Done,
            };
        }
        Ok(())
    }

    fn sample(&mut self) -> Phase {
        let suggested = Sampler::compare(self.index, &self.suggestions, &mut self.agree_sets);
        self.suggestions.clear();
        self.fresh_agree_sets.extend(suggested);

        if self.resample {
            let (found, round) = self.sampler.sample(self.index, &mut self.agree_sets);
            self.fresh_agree_sets.extend(found);
            self.statistics.comparisons += round.comparisons;
            self.statistics.sampling_rounds += 1;
            self.resample = false;
        }
        self.statistics.agree_sets = self.agree_sets.len();
        Phase::NegativeCoverBuild
    }

    fn build_negative_cover(&mut self) -> Phase {
        let agree_sets = std::mem::take(&mut self.fresh_agree_sets);
        if !self.seeded {
            // Everything at once, then one pass to drop whatever isn't maximal.
            for agree_set in agree_sets.iter() {
                let rhs = agree_set.complement();
                if !rhs.is_empty() {
                    self.negative.add(agree_set, &rhs);
                }
            }
            self.negative.maximize();
            if self.config.exhaustive_negative_cover {
                let found = self.negative.grow_negative(self.index, self.config.max_lhs_size);
                let deepened = self
                    .negative
                    .maximize_negative(self.index, self.config.max_lhs_size);
                debug!(found, deepened, "searched for non-dependencies");
            }
            if let Some(max) = self.config.max_lhs_size {
                self.negative.trim(max);
            }
        } else {
            for agree_set in agree_sets.iter() {
                let added = self.negative.add_agree_set(agree_set);
                if !added.is_empty() {
                    self.fresh_non_dependencies.push((agree_set.clone(), added));
                }
            }
        }
        debug!(fresh = self.fresh_non_dependencies.len(), "negative cover updated");
        Phase::CandidateDerivation
    }

    fn derive_candidates(&mut self) -> Result<Phase> {
        let mut outcome = Specialization::default();
        if !self.seeded {
            outcome = self
                .positive
                .grow(&self.negative, self.config.max_lhs_size, self.level)?;
            self.seeded = true;
        } else {
            let mut fresh = std::mem::take(&mut self.fresh_non_dependencies);
            fresh.sort_by(|(a, _), (b, _)| b.cardinality().cmp(&a.cardinality()));
            for (lhs, rhs) in fresh.iter() {
                for r in rhs.iter() {
                    outcome.absorb(self.positive.specialize(
                        lhs,
                        r,
                        self.config.max_lhs_size,
                        self.level,
                    )?);
                }
            }
        }
        self.depth_bounded |= outcome.depth_bounded;
        debug!(
            removed = outcome.removed,
            added = outcome.added,
            "derived candidates"
        );
        Ok(Phase::Validation)
    }

    fn validate_level(&mut self) -> Result<Phase> {
        let level = self.level;
        if level > self.positive.depth() || self.config.max_lhs_size.map_or(false, |m| level > m)
        {
            return Ok(Phase::Minimize);
        }

        let mut candidates = Vec::new();
        let mut rejected = Vec::new();
        for (lhs, rhs) in self.positive.level(level) {
            let mut unknown = AttributeSet::new(rhs.universe());
            for r in rhs.iter() {
                if self.positive.contains_strict_generalization(&lhs, r) {
                    self.positive.remove(&lhs, r);
                } else if self.negative.contains_or_specialization(&lhs, r) {
                    rejected.push((lhs.clone(), r));
                } else {
                    unknown.insert(r);
                }
            }
            if !unknown.is_empty() {
                candidates.push((lhs, unknown));
            }
        }

        let index = self.index;
        let results: Vec<Validation> = if self.config.parallel_validation {
            candidates
                .par_iter()
                .map(|(lhs, rhs)| index.validate(lhs, rhs))
                .collect()
        } else {
            candidates
                .iter()
                .map(|(lhs, rhs)| index.validate(lhs, rhs))
                .collect()
        };

        let known = rejected.len();
        for result in results.iter() {
            self.check_witnesses(result)?;
            rejected.extend(result.invalid.iter().map(|r| (result.lhs.clone(), r)));
            self.suggestions.extend(result.violations.iter().copied());
        }
        let failed = rejected.len();

        let mut outcome = Specialization::default();
        for (lhs, r) in rejected.iter() {
            outcome.absorb(
                self.positive
                    .specialize(lhs, *r, self.config.max_lhs_size, level)?,
            );
        }
        self.depth_bounded |= outcome.depth_bounded;

        self.statistics.validations += candidates.len();
        self.statistics.rejected += failed;
        self.statistics.levels += 1;
        self.level += 1;

        // Rejections by recorded non-dependencies cost nothing, so only validated candidates
        // say anything about how well sampling is doing.
        let ratio = invalid_ratio(&results);
        debug!(
            level,
            candidates = candidates.len(),
            known,
            ratio,
            failed,
            added = outcome.added,
            "validated level"
        );

        if ratio > self.config.invalid_ratio_threshold {
            self.resample = true;
        }
        if self.resample || !self.suggestions.is_empty() {
            Ok(Phase::Sampling)
        } else {
            Ok(Phase::Validation)
        }
    }

    /// Every reported violation has to be a real one: the rows agree on the left-hand side and
    /// disagree on one of the rejected right-hand sides. Anything else means validation itself
    /// is broken and its verdicts can't be trusted.
    fn check_witnesses(&self, result: &Validation) -> Result<()> {
        let matrix = self.index.matrix();
        for &(a, b) in result.violations.iter() {
            let agrees_on_lhs = result.lhs.iter().all(|attribute| matrix.agrees(a, b, attribute));
            let disagrees = result
                .invalid
                .iter()
                .any(|attribute| !matrix.agrees(a, b, attribute));
            if !agrees_on_lhs || !disagrees {
                return Err(Error::invariant(format!(
                    "rows {} and {} don't witness a violation of {:?} -> {:?}",
                    a, b, result.lhs, result.invalid
                )));
            }
        }
        Ok(())
    }

    fn minimize(&mut self) -> Result<Phase> {
        // Validation already dropped every candidate with a generalization at its level, and
        // nothing is ever added below the validated frontier, so there must be nothing left to
        // remove.
        let removed = self.positive.minimize();
        self.statistics.non_dependencies = self.negative.len();
        if removed > 0 {
            return Err(Error::invariant(format!(
                "{} validated dependencies turned out not to be minimal",
                removed
            )));
        }
        Ok(Phase::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::InMemoryRelation;

    fn discover(config: DiscoveryConfig, columns: &[&str], rows: &[&[&str]]) -> DiscoveryOutcome {
        let mut relation = InMemoryRelation::from_strs("r", columns, rows, Some("NULL"));
        Discovery::new(config).run(&mut relation).unwrap()
    }

    fn rendered(outcome: &DiscoveryOutcome) -> Vec<String> {
        outcome.dependencies.iter().map(|fd| fd.to_string()).collect()
    }

    #[test]
    fn config_limits() {
        let config = DiscoveryConfig::default()
            .with_row_limit(0)
            .with_max_lhs_size(-3);
        assert_eq!(config.row_limit, None);
        assert_eq!(config.max_lhs_size, None);
        let config = config.with_row_limit(10).with_max_lhs_size(2);
        assert_eq!(config.row_limit, Some(10));
        assert_eq!(config.max_lhs_size, Some(2));
    }

    #[test]
    fn keys_determine_everything() {
        let outcome = discover(
            DiscoveryConfig::default().with_parallel_validation(false),
            &["A", "B", "C"],
            &[
                &["1", "a", "x"],
                &["2", "b", "y"],
                &["3", "c", "z"],
                &["4", "d", "w"],
                &["5", "e", "v"],
            ],
        );
        assert_eq!(
            rendered(&outcome),
            vec![
                "[A] --> B",
                "[A] --> C",
                "[B] --> A",
                "[B] --> C",
                "[C] --> A",
                "[C] --> B",
            ]
        );
        assert_eq!(outcome.statistics.records, 5);
        assert_eq!(outcome.statistics.dependencies, 6);
        // Counted once after the search: no column is constant.
        assert_eq!(outcome.statistics.non_dependencies, 3);
    }

    #[test]
    fn constants_have_empty_lhs() {
        let outcome = discover(
            DiscoveryConfig::default(),
            &["A", "B"],
            &[&["1", "k"], &["2", "k"], &["2", "k"]],
        );
        assert_eq!(rendered(&outcome), vec!["[] --> B"]);
    }

    #[test]
    fn composite_lhs() {
        // C = A xor B.
        let outcome = discover(
            DiscoveryConfig::default(),
            &["A", "B", "C"],
            &[
                &["0", "0", "0"],
                &["0", "1", "1"],
                &["1", "0", "1"],
                &["1", "1", "0"],
            ],
        );
        assert_eq!(
            rendered(&outcome),
            vec!["[A, B] --> C", "[A, C] --> B", "[B, C] --> A"]
        );
    }

    #[test]
    fn exhaustive_negative_cover_agrees_with_sampling() {
        let rows: &[&[&str]] = &[
            &["1", "2", "5", "a"],
            &["2", "2", "4", "a"],
            &["3", "3", "4", "b"],
            &["4", "3", "4", "b"],
            &["4", "3", "5", "b"],
        ];
        let columns = &["A", "B", "C", "D"];
        let sampled = discover(DiscoveryConfig::default(), columns, rows);
        let exhaustive = discover(
            DiscoveryConfig::default().with_exhaustive_negative_cover(true),
            columns,
            rows,
        );
        assert_eq!(sampled.dependencies, exhaustive.dependencies);
    }

    #[test]
    fn lhs_limit_marks_result_incomplete() {
        let rows: &[&[&str]] = &[
            &["0", "0", "0"],
            &["0", "1", "1"],
            &["1", "0", "1"],
            &["1", "1", "0"],
        ];
        let outcome = discover(
            DiscoveryConfig::default().with_max_lhs_size(1),
            &["A", "B", "C"],
            rows,
        );
        assert!(outcome.dependencies.is_empty());
        assert!(outcome.completeness.depth_bounded);
        assert!(!outcome.completeness.row_bounded);
    }

    #[test]
    fn nulls_are_distinct_unless_configured() {
        let rows: &[&[&str]] = &[&["NULL", "1"], &["NULL", "2"]];
        let distinct = discover(DiscoveryConfig::default(), &["A", "B"], rows);
        assert_eq!(rendered(&distinct), vec!["[A] --> B", "[B] --> A"]);

        let equal = discover(
            DiscoveryConfig::default().with_null_equals_null(true),
            &["A", "B"],
            rows,
        );
        assert_eq!(rendered(&equal), vec!["[] --> A"]);
    }

    #[test]
    fn receivers_see_every_dependency() {
        let mut relation = InMemoryRelation::from_strs(
            "r",
            &["A", "B"],
            &[&["1", "x"], &["2", "x"]],
            None,
        );
        let mut count = 0;
        let summary = Discovery::default()
            .run_with(&mut relation, &mut |_: FunctionalDependency| count += 1)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(summary.statistics.dependencies, 1);
        assert!(summary.completeness.is_complete());
    }

    #[test]
    fn failure_ratio_counts_validated_candidates_only() {
        let set =
            |attributes: &[usize]| AttributeSet::from_attributes(4, attributes.iter().copied());
        let validation = |valid: &[usize], invalid: &[usize]| Validation {
            lhs: set(&[0]),
            valid: set(valid),
            invalid: set(invalid),
            violations: Vec::new(),
        };

        // A level decided entirely by recorded non-dependencies validates nothing.
        assert_eq!(invalid_ratio(&[]), 0.0);
        assert_eq!(invalid_ratio(&[validation(&[1, 2], &[])]), 0.0);
        assert_eq!(
            invalid_ratio(&[validation(&[1], &[2]), validation(&[], &[3])]),
            2.0 / 3.0
        );
    }
}
