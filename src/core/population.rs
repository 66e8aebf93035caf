use std::collections::HashSet;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::core::codec::DesignCodec;
use crate::core::domain::{Design, Metrics};
use crate::core::float_serde;

/// Outcome of evaluating one design.
///
/// `metrics` always carries the raw values returned by the fitness function so callers can
/// display unscored outputs. `fitness` is only set by the single-objective search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(with = "float_serde::map")]
    pub metrics: Metrics,
    #[serde(default, with = "float_serde::option", skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
    /// False when a present constraint metric violates its bound.
    pub feasible: bool,
    /// Error message when the evaluation itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl EvaluationResult {
    pub fn from_metrics(metrics: Metrics) -> Self {
        Self { metrics, fitness: None, feasible: true, failure: None }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            metrics: Metrics::new(),
            fitness: None,
            feasible: true,
            failure: Some(reason.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Fitness used for selection; unscored results count as negative infinity.
    pub fn usable_fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

/// A design plus its (possibly pending) evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub design: Design,
    #[serde(default)]
    pub result: Option<EvaluationResult>,
    /// Generation in which the design was proposed.
    #[serde(default)]
    pub generation: usize,
}

impl Individual {
    pub fn new(design: Design, generation: usize) -> Self {
        Self { design, result: None, generation }
    }

    pub fn is_evaluated(&self) -> bool {
        self.result.is_some()
    }

    pub fn fitness(&self) -> f64 {
        self.result
            .as_ref()
            .map(EvaluationResult::usable_fitness)
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.result.as_ref().map(|r| &r.metrics)
    }
}

/// The current generation, in order. Owned by one optimizer for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Population {
    members: Vec<Individual>,
}

impl Population {
    pub fn new(members: Vec<Individual>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Individual> {
        self.members.iter()
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Individual] {
        &mut self.members
    }

    /// Swaps in a whole new generation, returning the old one.
    pub fn replace(&mut self, next: Vec<Individual>) -> Vec<Individual> {
        std::mem::replace(&mut self.members, next)
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn into_inner(self) -> Vec<Individual> {
        self.members
    }

    pub fn pending(&self) -> usize {
        self.members.iter().filter(|i| !i.is_evaluated()).count()
    }

    /// Index of the highest usable fitness; earliest wins ties.
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, ind) in self.members.iter().enumerate() {
            let f = ind.fitness();
            match best {
                Some((_, bf)) if f <= bf => {}
                _ => best = Some((i, f)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Distinct design signatures divided by population size (0.0 to 1.0).
    pub fn diversity(&self, codec: &DesignCodec) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        let unique: HashSet<_> = self.members.iter().map(|i| codec.signature(&i.design)).collect();
        unique.len() as f64 / self.members.len() as f64
    }
}

impl Index<usize> for Population {
    type Output = Individual;

    fn index(&self, i: usize) -> &Individual {
        &self.members[i]
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a Individual;
    type IntoIter = std::slice::Iter<'a, Individual>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl From<Vec<Individual>> for Population {
    fn from(members: Vec<Individual>) -> Self {
        Self::new(members)
    }
}
