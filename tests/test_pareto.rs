use shade_search::analysis::pareto::{
    crowding_distance, individual_dominates, non_dominated_sort, objective_scores, select_survivors,
    ParetoFront,
};
use shade_search::core::domain::Design;
use shade_search::core::objective::{is_feasible, Constraint, Objective};
use shade_search::core::population::{EvaluationResult, Individual};

use crate::common::metrics;

mod common;

fn evaluated(id: usize, sda: f64, ase: f64) -> Individual {
    let mut design = Design::new();
    design.insert("id".into(), (id as f64).into());
    let mut ind = Individual::new(design, 1);
    ind.result = Some(EvaluationResult::from_metrics(metrics(&[("sda", sda), ("ase", ase)])));
    ind
}

fn objectives() -> Vec<Objective> {
    vec![Objective::maximize("sda"), Objective::minimize("ase")]
}

fn sda_ase(ind: &Individual) -> (f64, f64) {
    let m = ind.metrics().unwrap();
    (m["sda"], m["ase"])
}

#[test]
fn test_rank_zero_front_of_four_designs() {
    let pool = vec![
        evaluated(0, 70.0, 5.0),
        evaluated(1, 80.0, 5.0),
        evaluated(2, 80.0, 15.0),
        evaluated(3, 60.0, 2.0),
    ];
    let objs = objectives();

    assert!(individual_dominates(&pool[1], &pool[2], &objs));
    assert!(individual_dominates(&pool[1], &pool[0], &objs));
    assert!(!individual_dominates(&pool[1], &pool[3], &objs));
    assert!(!individual_dominates(&pool[3], &pool[1], &objs));

    let front = ParetoFront::from_individuals(&pool, &objs);
    let mut points: Vec<(f64, f64)> = front.iter().map(|m| sda_ase(&m.individual)).collect();
    points.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(points, vec![(60.0, 2.0), (80.0, 5.0)]);
    assert!(front.iter().all(|m| m.rank == 0 && m.crowding_distance.is_infinite()));
}

#[test]
fn test_identical_designs_share_a_front() {
    let pool = vec![evaluated(0, 70.0, 5.0), evaluated(1, 70.0, 5.0), evaluated(2, 50.0, 9.0)];
    let scores: Vec<_> = pool.iter().map(|i| objective_scores(i, &objectives())).collect();
    assert_eq!(non_dominated_sort(&scores), vec![vec![0, 1], vec![2]]);
}

#[test]
fn test_failed_and_pending_individuals() {
    let objs = objectives();
    let mut failed = evaluated(9, 0.0, 0.0);
    failed.result = Some(EvaluationResult::failure("timeout"));
    let pending = Individual::new(Design::new(), 2);

    assert!(objective_scores(&failed, &objs).iter().all(|s| *s == f64::NEG_INFINITY));

    let pool = vec![evaluated(0, 10.0, 50.0), failed, pending];
    let front = ParetoFront::from_individuals(&pool, &objs);
    assert_eq!(front.len(), 1);
    assert_eq!(sda_ase(&front.members[0].individual), (10.0, 50.0));
}

#[test]
fn test_constraint_flags_front_members() {
    let limit = vec![Constraint::parse("ase < 10").unwrap()];
    let mut pool = vec![evaluated(0, 80.0, 15.0), evaluated(1, 60.0, 2.0)];
    for ind in &mut pool {
        if let Some(r) = ind.result.as_mut() {
            r.feasible = is_feasible(&limit, &r.metrics);
        }
    }

    let front = ParetoFront::from_individuals(&pool, &objectives());
    assert_eq!(front.len(), 2);
    let feasible: Vec<_> = front.feasible().map(|m| sda_ase(&m.individual)).collect();
    assert_eq!(feasible, vec![(60.0, 2.0)]);
}

#[test]
fn test_survivors_fill_by_front_then_crowding() {
    // Front 0: a five-point trade-off curve. Front 1: two dominated points.
    let scores = vec![
        vec![0.0, 10.0],
        vec![1.0, 9.0],
        vec![2.0, 5.0],
        vec![9.0, 1.0],
        vec![10.0, 0.0],
        vec![0.0, 0.0],
        vec![-1.0, -1.0],
    ];
    let fronts = non_dominated_sort(&scores);
    assert_eq!(fronts[0], vec![0, 1, 2, 3, 4]);

    let d = crowding_distance(&fronts[0], &scores);
    assert!(d[0].is_infinite() && d[4].is_infinite());
    // 1 sits closest to its neighbours.
    assert!(d[1] < d[2] && d[1] < d[3]);

    let keep = select_survivors(&scores, 4);
    assert_eq!(keep.len(), 4);
    assert!(!keep.contains(&1));
    assert!(keep.iter().all(|&i| i < 5));

    let keep = select_survivors(&scores, 6);
    assert_eq!(keep, vec![0, 1, 2, 3, 4, 5]);
}
