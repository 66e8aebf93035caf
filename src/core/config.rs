use serde::{Deserialize, Serialize};

use crate::core::domain::{validate_specs, ParameterSpec};
use crate::core::errors::ConfigurationError;
use crate::core::objective::{validate_objectives, Constraint, Goal, Objective};

/// Search settings shared by both optimizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Seed for the run's random stream. Equal seeds replay equal searches.
    pub seed: u64,
    pub population_size: usize,
    /// Per-parameter probability of mutating an offspring value.
    pub mutation_rate: f64,
    /// Probability that an offspring is bred by crossover rather than cloned from one parent.
    pub crossover_rate: f64,
    pub tournament_size: usize,
    /// Largest number of steps a continuous mutation moves a value.
    pub mutation_span: u32,

    // GA Specific
    pub max_evaluations: usize,
    /// Stop once this many consecutive generations evaluated no unseen design.
    pub max_stalled_generations: Option<usize>,

    // MOGA Specific
    pub max_generations: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            seed: 0,
            population_size: 24,
            mutation_rate: 0.2,
            crossover_rate: 0.9,
            tournament_size: 2,
            mutation_span: 3,
            max_evaluations: 200,
            max_stalled_generations: None,
            max_generations: 20,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field: &'static str, reason: &str| ConfigurationError::InvalidSetting {
            field,
            reason: reason.to_string(),
        };

        if self.population_size < 2 {
            return Err(invalid("population_size", "needs at least 2 individuals"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(invalid("mutation_rate", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(invalid("crossover_rate", "must be within [0, 1]"));
        }
        if self.tournament_size == 0 {
            return Err(invalid("tournament_size", "must be at least 1"));
        }
        if self.mutation_span == 0 {
            return Err(invalid("mutation_span", "must be at least 1"));
        }
        if self.max_evaluations == 0 {
            return Err(invalid("max_evaluations", "must be at least 1"));
        }
        if self.max_generations == 0 {
            return Err(invalid("max_generations", "must be at least 1"));
        }
        if self.max_stalled_generations == Some(0) {
            return Err(invalid("max_stalled_generations", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveSpec {
    /// One scalar fitness (genetic algorithm).
    Single(Goal),
    /// Two or more named objectives (Pareto search).
    Multi(Vec<Objective>),
}

/// A full search definition, typically loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub parameters: Vec<ParameterSpec>,
    pub objective: ObjectiveSpec,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub params: Params,
}

impl Problem {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_specs(&self.parameters)?;
        match &self.objective {
            ObjectiveSpec::Single(goal) => goal.validate()?,
            ObjectiveSpec::Multi(objectives) => validate_objectives(objectives)?,
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_from_json() {
        let json = r#"{
            "parameters": [
                {"name": "depth", "kind": "continuous", "min": 0.1, "max": 2.0, "step": 0.1},
                {"name": "material", "kind": "discrete", "options": ["wood", "metal"]}
            ],
            "objective": {"multi": [
                {"name": "sda", "direction": "maximize"},
                {"name": "ase", "direction": "minimize"}
            ]},
            "constraints": ["ase < 10"],
            "params": {"population_size": 8, "seed": 7}
        }"#;

        let problem: Problem = serde_json::from_str(json).unwrap();
        assert_eq!(problem.parameters.len(), 2);
        assert_eq!(problem.constraints[0].metric, "ase");
        assert_eq!(problem.params.population_size, 8);
        assert_eq!(problem.params.mutation_rate, Params::default().mutation_rate);
        assert_eq!(problem.validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_rates() {
        let params = Params { mutation_rate: 1.5, ..Default::default() };
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::InvalidSetting { field: "mutation_rate", .. })
        ));
    }
}
