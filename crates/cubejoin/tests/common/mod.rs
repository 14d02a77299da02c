//! Shared fixtures for the join integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ops::RangeInclusive;

use cubejoin::{CubeJoin, JoinConfig, ResultPair};
use cubejoin_index::{MemRTree, RTreeConfig, SpatialIndex};
use cubejoin_types::{Cube, TupleId};
use rand::Rng;
use rand::rngs::StdRng;

pub type Row = (Option<Cube>, TupleId);

pub fn cube(lo: &[f64], hi: &[f64]) -> Option<Cube> {
    Some(Cube::new(lo, hi).unwrap())
}

pub fn tid(block: u32) -> TupleId {
    TupleId::new(block, 1)
}

/// `count` random boxes inside `[0, extent)^dim` with blocks starting at
/// `first_block`. Dimensionality is drawn per row from `dims`; roughly one
/// row in `null_every` gets a null key (0 disables nulls).
pub fn random_rows(
    rng: &mut StdRng,
    count: usize,
    first_block: u32,
    dims: RangeInclusive<usize>,
    extent: f64,
    null_every: u32,
) -> Vec<Row> {
    (0..count)
        .map(|i| {
            let block = first_block + u32::try_from(i).unwrap();
            if null_every > 0 && rng.gen_range(0..null_every) == 0 {
                return (None, tid(block));
            }
            let dim = rng.gen_range(dims.clone());
            let lo: Vec<f64> = (0..dim).map(|_| rng.gen_range(0.0..extent)).collect();
            let hi: Vec<f64> = lo
                .iter()
                .map(|l| l + rng.gen_range(0.0..extent / 20.0))
                .collect();
            (cube(&lo, &hi), tid(block))
        })
        .collect()
}

pub fn build(name: &str, fanout: usize, rows: &[Row]) -> MemRTree {
    MemRTree::build(name, RTreeConfig::with_max_fanout(fanout), rows.iter().cloned()).unwrap()
}

/// Every overlapping pair, by nested loops.
pub fn brute_force(first: &[Row], second: &[Row]) -> HashMap<ResultPair, usize> {
    let mut expected = HashMap::new();
    for (a, ta) in first {
        for (b, tb) in second {
            if let (Some(a), Some(b)) = (a, b) {
                if a.overlaps(b) {
                    *expected.entry(ResultPair::new(*ta, *tb)).or_insert(0) += 1;
                }
            }
        }
    }
    expected
}

pub fn counts(pairs: &[ResultPair]) -> HashMap<ResultPair, usize> {
    let mut counts = HashMap::new();
    for pair in pairs {
        *counts.entry(*pair).or_insert(0) += 1;
    }
    counts
}

pub fn drain<I: SpatialIndex>(join: &mut CubeJoin<I>) -> Vec<ResultPair> {
    let mut out = Vec::new();
    while let Some(pair) = join.next_pair().unwrap() {
        out.push(pair);
    }
    out
}

pub fn join_all(first: &MemRTree, second: &MemRTree) -> Vec<ResultPair> {
    let mut join = CubeJoin::setup(first, second, JoinConfig::default()).unwrap();
    drain(&mut join)
}

/// Assert that no pair was produced twice.
pub fn assert_no_duplicates(pairs: &[ResultPair]) {
    for (pair, n) in counts(pairs) {
        assert_eq!(n, 1, "pair {pair} produced {n} times");
    }
}
