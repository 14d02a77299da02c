//! Property tests: the join reports exactly the overlapping pairs.

mod common;

use common::{Row, brute_force, build, counts, drain, tid};
use cubejoin::{CubeJoin, JoinConfig};
use cubejoin_types::Cube;
use proptest::prelude::*;

fn arb_key() -> impl Strategy<Value = Option<Cube>> {
    prop_oneof![
        1 => Just(None),
        10 => (1_usize..=3).prop_flat_map(|dim| {
            (
                prop::collection::vec(-20.0_f64..20.0, dim),
                prop::collection::vec(0.0_f64..6.0, dim),
            )
                .prop_map(|(lo, ext)| {
                    let hi: Vec<f64> = lo.iter().zip(&ext).map(|(l, e)| l + e).collect();
                    Some(Cube::new(&lo, &hi).unwrap())
                })
        }),
    ]
}

fn arb_rows(first_block: u32) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(arb_key(), 0..120).prop_map(move |keys| {
        keys.into_iter()
            .enumerate()
            .map(|(i, key)| (key, tid(first_block + i as u32)))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn join_matches_brute_force(
        rows1 in arb_rows(0),
        rows2 in arb_rows(100_000),
        fanout1 in 2_usize..8,
        fanout2 in 2_usize..8,
        segment_capacity in 1_usize..64,
    ) {
        let first = build("first", fanout1, &rows1);
        let second = build("second", fanout2, &rows2);
        let config = JoinConfig::default().with_segment_capacity(segment_capacity);
        let mut join = CubeJoin::setup(&first, &second, config).unwrap();
        let pairs = drain(&mut join);

        prop_assert_eq!(counts(&pairs), brute_force(&rows1, &rows2));
        prop_assert!(join.next_pair().unwrap().is_none());

        let metrics = join.teardown();
        prop_assert_eq!(metrics.results_returned, pairs.len() as u64);
        prop_assert_eq!(metrics.results_enqueued, pairs.len() as u64);
    }

    #[test]
    fn join_is_symmetric(
        rows1 in arb_rows(0),
        rows2 in arb_rows(100_000),
        fanout in 2_usize..6,
    ) {
        let first = build("first", fanout, &rows1);
        let second = build("second", fanout, &rows2);
        let forward = counts(&common::join_all(&first, &second));
        let backward: std::collections::HashMap<_, _> = common::join_all(&second, &first)
            .into_iter()
            .map(|p| (cubejoin::ResultPair::new(p.second, p.first), 1))
            .collect();
        prop_assert_eq!(forward, backward);
    }
}
