// Shared by several test binaries; each uses a different subset.
#![allow(dead_code)]

use fdhunter::{
    Discovery, DiscoveryConfig, DiscoveryOutcome, FunctionalDependency, InMemoryRelation, Row,
};
use std::collections::BTreeSet;

/// A dependency as plain column positions: sorted left-hand side, right-hand side.
pub type Fd = (Vec<usize>, usize);

pub fn relation(width: usize, rows: &[Vec<Option<u8>>]) -> InMemoryRelation {
    let columns = (0..width).map(|i| format!("c{}", i)).collect();
    let rows: Vec<Row> = rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.map(|v| v.to_string())).collect())
        .collect();
    InMemoryRelation::new("t", columns, rows)
}

pub fn plain(fd: &FunctionalDependency) -> Fd {
    let mut lhs: Vec<usize> = fd.lhs.iter().map(|column| column.index).collect();
    lhs.sort_unstable();
    (lhs, fd.rhs.index)
}

pub fn discover(
    config: DiscoveryConfig,
    width: usize,
    rows: &[Vec<Option<u8>>],
) -> (BTreeSet<Fd>, DiscoveryOutcome) {
    let mut relation = relation(width, rows);
    let outcome = Discovery::new(config).run(&mut relation).unwrap();
    (outcome.dependencies.iter().map(plain).collect(), outcome)
}

fn agrees(a: Option<u8>, b: Option<u8>, null_equals_null: bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (None, None) => null_equals_null,
        _ => false,
    }
}

fn holds(rows: &[Vec<Option<u8>>], lhs: u32, rhs: usize, null_equals_null: bool) -> bool {
    for (i, a) in rows.iter().enumerate() {
        for b in rows[i + 1..].iter() {
            let same_lhs = (0..a.len())
                .filter(|&c| lhs & (1 << c) != 0)
                .all(|c| agrees(a[c], b[c], null_equals_null));
            if same_lhs && !agrees(a[rhs], b[rhs], null_equals_null) {
                return false;
            }
        }
    }
    true
}

/// Every minimal dependency, found by checking every left-hand side against every pair of rows.
pub fn brute_force(
    width: usize,
    rows: &[Vec<Option<u8>>],
    null_equals_null: bool,
) -> BTreeSet<Fd> {
    let mut found = BTreeSet::new();
    for rhs in 0..width {
        for lhs in 0u32..(1 << width) {
            if lhs & (1 << rhs) != 0 || !holds(rows, lhs, rhs, null_equals_null) {
                continue;
            }
            // Validity is monotone, so checking the subsets one column smaller is enough.
            let minimal = (0..width)
                .filter(|&c| lhs & (1 << c) != 0)
                .all(|c| !holds(rows, lhs & !(1 << c), rhs, null_equals_null));
            if minimal {
                let columns = (0..width).filter(|&c| lhs & (1 << c) != 0).collect();
                found.insert((columns, rhs));
            }
        }
    }
    found
}

/// Deterministic pseudo-random tables for the scenario grids.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next(&mut self, bound: u8) -> u8 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) % u64::from(bound)) as u8
    }

    pub fn rows(&mut self, width: usize, height: usize, values: u8) -> Vec<Vec<Option<u8>>> {
        (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| match self.next(values + 1) {
                        0 => None,
                        v => Some(v),
                    })
                    .collect()
            })
            .collect()
    }
}
