use proptest::prelude::*;
use sadari_game::{
    LadderConfig, Rung, check_rungs, compute_mapping, generate_ladder, is_permutation,
};
use std::collections::BTreeSet;

/// Any rung set with no duplicates and no side-by-side rungs in a row.
fn arb_valid_rungs() -> impl Strategy<Value = (usize, u32, Vec<Rung>)> {
    (1usize..=12, 0u32..=30).prop_flat_map(|(cols, rows)| {
        let gaps = u32::try_from(cols.saturating_sub(1)).unwrap_or(0);
        let candidates = if gaps == 0 || rows == 0 {
            Just(Vec::new()).boxed()
        } else {
            prop::collection::vec((0..rows, 0..gaps), 0..64).boxed()
        };
        candidates.prop_map(move |cells| {
            let mut kept: BTreeSet<Rung> = BTreeSet::new();
            for (row, col) in cells {
                let left = col.checked_sub(1).map(|left| Rung::new(row, left));
                let right = Rung::new(row, col + 1);
                let clashes =
                    left.is_some_and(|left| kept.contains(&left)) || kept.contains(&right);
                if !clashes {
                    kept.insert(Rung::new(row, col));
                }
            }
            (cols, rows, kept.into_iter().collect())
        })
    })
}

proptest! {
    #[test]
    fn generated_ladders_are_valid_bijections(
        cols in 0usize..=12,
        rows in 0u32..=40,
        density in 0.0f64..=1.0,
        seed in any::<i64>(),
    ) {
        let rungs = generate_ladder(cols, rows, density, Some(seed));
        prop_assert!(check_rungs(cols, rows, &rungs).is_empty());
        let mapping = compute_mapping(cols, rows, &rungs);
        prop_assert_eq!(mapping.len(), cols);
        prop_assert!(is_permutation(&mapping));
    }

    #[test]
    fn seeded_generation_replays(
        cols in 2usize..=10,
        rows in 6u32..=60,
        density in 0.06f64..=0.6,
        seed in any::<i64>(),
    ) {
        prop_assert_eq!(
            generate_ladder(cols, rows, density, Some(seed)),
            generate_ladder(cols, rows, density, Some(seed))
        );
    }

    #[test]
    fn seeds_congruent_mod_2_32_draw_the_same_ladder(seed in 0i64..=i64::from(u32::MAX)) {
        prop_assert_eq!(
            generate_ladder(6, 18, 0.28, Some(seed)),
            generate_ladder(6, 18, 0.28, Some(seed + (1_i64 << 32)))
        );
    }

    #[test]
    fn any_valid_rung_set_maps_bijectively((cols, rows, rungs) in arb_valid_rungs()) {
        prop_assert!(check_rungs(cols, rows, &rungs).is_empty());
        prop_assert!(is_permutation(&compute_mapping(cols, rows, &rungs)));
    }

    #[test]
    fn rung_order_does_not_change_the_mapping((cols, rows, rungs) in arb_valid_rungs()) {
        let mut reversed = rungs.clone();
        reversed.reverse();
        prop_assert_eq!(
            compute_mapping(cols, rows, &rungs),
            compute_mapping(cols, rows, &reversed)
        );
    }

    #[test]
    fn stored_configs_survive_the_codec(
        lanes in 2usize..=10,
        rows in 6u32..=60,
        seed in any::<i64>(),
    ) {
        let names: Vec<String> = (0..lanes).map(|i| format!("P{i}")).collect();
        let results: Vec<String> = (0..lanes).map(|i| format!("R{i}")).collect();
        let params = sadari_game::DrawParams::new(lanes, rows, 0.28);
        let config = LadderConfig::draw(names, results, params, Some(seed), 1_700_000_000_000);
        let json = config.to_json().expect("serialize");
        let back = LadderConfig::from_json(&json).expect("decode");
        prop_assert_eq!(back.mapping(), config.mapping());
        prop_assert_eq!(back, config);
    }
}

#[test]
fn full_density_alternates_gaps() {
    let rungs = generate_ladder(5, 2, 1.0, Some(3));
    assert_eq!(
        rungs,
        vec![Rung::new(0, 0), Rung::new(0, 2), Rung::new(1, 0), Rung::new(1, 2)]
    );
}
