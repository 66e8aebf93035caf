use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::float_serde;
use crate::core::objective::Objective;
use crate::core::population::Individual;

/// Direction-adjusted objective scores of an individual (larger is better on every axis).
///
/// Pending or failed evaluations score negative infinity on every objective,
/// the least favourable extreme.
pub fn objective_scores(individual: &Individual, objectives: &[Objective]) -> Vec<f64> {
    match &individual.result {
        Some(r) if !r.is_failure() => objectives.iter().map(|o| o.score(&r.metrics)).collect(),
        _ => vec![f64::NEG_INFINITY; objectives.len()],
    }
}

/// `a` dominates `b` iff it is no worse on every objective and strictly better on one.
/// Equal score vectors do not dominate each other.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x < y {
            return false;
        }
        if x > y {
            strictly_better = true;
        }
    }
    strictly_better
}

pub fn individual_dominates(a: &Individual, b: &Individual, objectives: &[Objective]) -> bool {
    dominates(&objective_scores(a, objectives), &objective_scores(b, objectives))
}

/// Partitions `scores` into fronts `F0, F1, ...` of indices (fast non-dominated sort).
/// Indices within a front are ascending.
pub fn non_dominated_sort(scores: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = scores.len();
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for p in 0..n {
        for q in (p + 1)..n {
            if dominates(&scores[p], &scores[q]) {
                dominated[p].push(q);
                domination_count[q] += 1;
            } else if dominates(&scores[q], &scores[p]) {
                dominated[q].push(p);
                domination_count[p] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(std::mem::replace(&mut current, next));
    }
    fronts
}

/// Crowding distance of each member of `front` (result is aligned with `front`).
///
/// Per objective, members are sorted by score; boundary members get infinite distance and
/// interior members accumulate the neighbour gap normalised by the objective's range.
pub fn crowding_distance(front: &[usize], scores: &[Vec<f64>]) -> Vec<f64> {
    let len = front.len();
    if len <= 2 {
        return vec![f64::INFINITY; len];
    }

    let mut distance = vec![0.0; len];
    let n_obj = scores[front[0]].len();

    for m in 0..n_obj {
        let mut order: Vec<usize> = (0..len).collect();
        order.sort_by(|&a, &b| scores[front[a]][m].total_cmp(&scores[front[b]][m]));

        let lo = scores[front[order[0]]][m];
        let hi = scores[front[order[len - 1]]][m];
        distance[order[0]] = f64::INFINITY;
        distance[order[len - 1]] = f64::INFINITY;

        let range = hi - lo;
        if !range.is_finite() || range <= 0.0 {
            continue;
        }
        for w in 1..len - 1 {
            let gap = scores[front[order[w + 1]]][m] - scores[front[order[w - 1]]][m];
            if gap.is_finite() {
                distance[order[w]] += gap / range;
            }
        }
    }
    distance
}

/// Rank and crowding distance of one individual within its pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    pub rank: usize,
    pub crowding: f64,
}

impl Standing {
    /// Crowded-comparison: lower rank wins, then larger crowding distance.
    pub fn beats(&self, other: &Standing) -> bool {
        self.rank < other.rank || (self.rank == other.rank && self.crowding > other.crowding)
    }
}

/// Non-dominated rank and crowding distance for every entry of `scores`.
pub fn rank_and_crowd(scores: &[Vec<f64>]) -> Vec<Standing> {
    let mut standings = vec![Standing { rank: 0, crowding: 0.0 }; scores.len()];
    for (rank, front) in non_dominated_sort(scores).iter().enumerate() {
        for (&i, d) in front.iter().zip(crowding_distance(front, scores)) {
            standings[i] = Standing { rank, crowding: d };
        }
    }
    standings
}

/// Picks `n` survivors: whole fronts in order, then the overflowing front by descending
/// crowding distance. Returned indices are in selection order.
pub fn select_survivors(scores: &[Vec<f64>], n: usize) -> Vec<usize> {
    let mut chosen = Vec::with_capacity(n);
    for front in non_dominated_sort(scores) {
        if chosen.len() + front.len() <= n {
            chosen.extend_from_slice(&front);
            if chosen.len() == n {
                break;
            }
            continue;
        }

        let distance = crowding_distance(&front, scores);
        let mut order: Vec<usize> = (0..front.len()).collect();
        // Stable: equal distances keep index order.
        order.sort_by(|&a, &b| distance[b].partial_cmp(&distance[a]).unwrap_or(Ordering::Equal));
        let room = n - chosen.len();
        chosen.extend(order.into_iter().take(room).map(|k| front[k]));
        break;
    }
    chosen
}

/// One member of a Pareto front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMember {
    pub individual: Individual,
    pub rank: usize,
    #[serde(with = "float_serde::value")]
    pub crowding_distance: f64,
    /// False when a constraint was violated. Exclusion is left to the caller.
    pub feasible: bool,
}

/// Read-only view of the non-dominated (rank 0) members of a population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParetoFront {
    pub objectives: Vec<Objective>,
    pub members: Vec<FrontMember>,
}

impl ParetoFront {
    /// Ranks the evaluated individuals and keeps rank 0. Pending individuals are ignored.
    pub fn from_individuals(individuals: &[Individual], objectives: &[Objective]) -> Self {
        let evaluated: Vec<&Individual> = individuals.iter().filter(|i| i.is_evaluated()).collect();
        let scores: Vec<Vec<f64>> = evaluated
            .iter()
            .map(|i| objective_scores(i, objectives))
            .collect();

        let members = match non_dominated_sort(&scores).into_iter().next() {
            Some(front) => {
                let distance = crowding_distance(&front, &scores);
                front
                    .iter()
                    .zip(distance)
                    .map(|(&i, d)| FrontMember {
                        individual: evaluated[i].clone(),
                        rank: 0,
                        crowding_distance: d,
                        feasible: evaluated[i].result.as_ref().is_some_and(|r| r.feasible),
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        Self { objectives: objectives.to_vec(), members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrontMember> {
        self.members.iter()
    }

    /// Members that satisfy every checked constraint.
    pub fn feasible(&self) -> impl Iterator<Item = &FrontMember> {
        self.members.iter().filter(|m| m.feasible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_points_do_not_dominate() {
        assert!(!dominates(&[1.0, 2.0], &[1.0, 2.0]));
        assert!(dominates(&[1.0, 2.0], &[1.0, 1.0]));
        assert!(!dominates(&[2.0, 0.0], &[1.0, 1.0]));
    }

    #[test]
    fn sorts_into_layers() {
        let scores = vec![
            vec![1.0, 1.0], // dominated by 2
            vec![3.0, 0.0],
            vec![2.0, 2.0],
            vec![0.0, 0.0], // dominated by everything
        ];
        let fronts = non_dominated_sort(&scores);
        assert_eq!(fronts, vec![vec![1, 2], vec![0], vec![3]]);
    }

    #[test]
    fn boundary_points_are_infinitely_crowded() {
        let scores = vec![vec![0.0, 4.0], vec![1.0, 3.0], vec![2.0, 1.0], vec![4.0, 0.0]];
        let front = vec![0, 1, 2, 3];
        let d = crowding_distance(&front, &scores);
        assert!(d[0].is_infinite() && d[3].is_infinite());
        // (2 - 0)/4 + (4 - 1)/4
        assert!((d[1] - 1.25).abs() < 1e-12);
        // (4 - 1)/4 + (3 - 0)/4
        assert!((d[2] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn survivors_truncate_by_crowding() {
        let scores = vec![
            vec![0.0, 4.0],
            vec![1.0, 3.0],
            vec![2.0, 1.0],
            vec![4.0, 0.0],
            vec![-1.0, -1.0],
        ];
        let chosen = select_survivors(&scores, 3);
        assert_eq!(chosen.len(), 3);
        // Both extremes plus the less crowded interior point.
        assert!(chosen.contains(&0) && chosen.contains(&3) && chosen.contains(&2));
    }
}
