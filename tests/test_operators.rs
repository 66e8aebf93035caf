use std::collections::HashSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use shade_search::core::codec::DesignCodec;
use shade_search::core::domain::{ParamValue, ParameterSpec};
use shade_search::engine::operators::{breed, crossover, tournament, Mutator};

mod common;

fn codec() -> DesignCodec {
    DesignCodec::new(vec![
        ParameterSpec::continuous("depth", 0.1, 2.0, 0.1),
        ParameterSpec::continuous("angle", -45.0, 45.0, 2.5),
        ParameterSpec::discrete("slats", [2.0, 4.0, 8.0]),
        ParameterSpec::discrete("material", ["wood", "metal", "glass"]),
    ])
    .unwrap()
}

#[test]
fn test_offspring_stay_in_the_design_space() {
    let codec = codec();
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let mutator = Mutator::new(0.5).span(4);

    for _ in 0..500 {
        let a = codec.random_design(&mut rng);
        let b = codec.random_design(&mut rng);
        let child = breed(&a, &b, codec.specs(), 0.9, &mutator, &mut rng);
        assert_eq!(codec.validate(&child), Ok(()), "{:?}", child);
    }
}

#[test]
fn test_crossover_discrete_values_come_from_parents() {
    let codec = codec();
    let mut rng = ChaCha8Rng::seed_from_u64(4);

    for _ in 0..200 {
        let a = codec.random_design(&mut rng);
        let b = codec.random_design(&mut rng);
        let child = crossover(&a, &b, codec.specs(), &mut rng);
        for name in ["slats", "material"] {
            assert!(child[name] == a[name] || child[name] == b[name]);
        }
    }
}

#[test]
fn test_mutation_rate_zero_is_identity() {
    let codec = codec();
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let d = codec.random_design(&mut rng);
    let same = Mutator::new(0.0).apply(&d, codec.specs(), &mut rng);
    assert_eq!(same, d);
}

#[test]
fn test_mutation_reverses_at_bounds() {
    let spec = ParameterSpec::continuous("depth", 0.1, 2.0, 0.1);
    let mutator = Mutator::new(1.0).span(1);
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    for _ in 0..50 {
        let up = mutator.mutate_value(&spec, &ParamValue::Number(0.1), &mut rng);
        assert_eq!(up, ParamValue::Number(0.2));
        let down = mutator.mutate_value(&spec, &ParamValue::Number(2.0), &mut rng);
        assert_eq!(down, ParamValue::Number(1.9));
    }
}

#[test]
fn test_tournament_samples_without_replacement() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    for _ in 0..200 {
        let mut seen = HashSet::new();
        tournament(5, 3, &mut rng, |a, b| {
            seen.insert(a);
            seen.insert(b);
            false
        });
        assert_eq!(seen.len(), 3);
    }
}

#[test]
fn test_tournament_size_one_is_uniform_pick() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let picks: HashSet<usize> = (0..300)
        .map(|_| tournament(4, 1, &mut rng, |_, _| panic!("nothing to compare")))
        .collect();
    assert_eq!(picks.len(), 4);
}
