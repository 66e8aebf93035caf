use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::pareto::ParetoFront;
use crate::core::codec::{DesignCodec, Signature};
use crate::core::config::ObjectiveSpec;
use crate::core::domain::ParameterSpec;
use crate::core::errors::CheckpointError;
use crate::core::objective::Constraint;
use crate::core::population::{EvaluationResult, Individual, Population};
use crate::solvers::controller::Counters;
use crate::solvers::Phase;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const CHECKPOINT_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Single,
    Multi,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Single => f.write_str("single-objective"),
            OptimizerKind::Multi => f.write_str("multi-objective"),
        }
    }
}

/// A JSON-serializable snapshot of an optimizer between two evaluations.
///
/// Carries everything needed to continue the run bit-for-bit: population (and pending MOGA
/// offspring), counters, the fitness cache and the random stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Stable across resumes of the same search.
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub kind: OptimizerKind,
    pub parameters: Vec<ParameterSpec>,
    /// Goal or objectives the stored fitness values were scored under.
    pub objective: ObjectiveSpec,
    /// Constraints behind the stored `feasible` flags.
    #[serde(default)]
    pub constraints: Vec<Constraint>,

    pub phase: Phase,
    pub generation: usize,
    pub evaluations: usize,
    pub external_evaluations: usize,
    pub cache_hits: usize,
    #[serde(default)]
    pub stalled_generations: usize,

    pub population: Population,
    #[serde(default)]
    pub offspring: Population,

    /// GA best-so-far.
    #[serde(default)]
    pub best: Option<Individual>,
    /// MOGA front of the last completed generation.
    #[serde(default)]
    pub front: Option<ParetoFront>,

    #[serde(default)]
    pub cache: BTreeMap<Signature, EvaluationResult>,
    pub rng: ChaCha8Rng,
}

impl Checkpoint {
    pub fn counters(&self) -> Counters {
        Counters {
            evaluations: self.evaluations,
            external_evaluations: self.external_evaluations,
            cache_hits: self.cache_hits,
        }
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the checkpoint next to `path` and renames it into place, so a crash mid-write
    /// never leaves a truncated file behind.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let json = self.to_json()?;
        let tmp = temp_path(path);
        fs::write(&tmp, json).map_err(|source| CheckpointError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let json = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Checks that this checkpoint can be loaded into a live optimizer of `kind` configured
    /// with `codec`, `objective`, `constraints` and `population_size`.
    pub fn validate(
        &self,
        kind: OptimizerKind,
        codec: &DesignCodec,
        objective: &ObjectiveSpec,
        constraints: &[Constraint],
        population_size: usize,
    ) -> Result<(), CheckpointError> {
        if self.version > CHECKPOINT_VERSION {
            return Err(CheckpointError::Malformed(format!(
                "format version {} is newer than supported version {}",
                self.version, CHECKPOINT_VERSION
            )));
        }
        if self.kind != kind {
            return Err(CheckpointError::KindMismatch {
                expected: kind.to_string(),
                found: self.kind.to_string(),
            });
        }
        if self.parameters.as_slice() != codec.specs() {
            return Err(CheckpointError::ParameterMismatch);
        }
        if &self.objective != objective || self.constraints.as_slice() != constraints {
            return Err(CheckpointError::ObjectiveMismatch);
        }

        let expected = match self.phase {
            Phase::Seeding => 0,
            _ => population_size,
        };
        if self.population.len() != expected {
            return Err(CheckpointError::Malformed(format!(
                "population holds {} individuals, expected {}",
                self.population.len(),
                expected
            )));
        }
        if !self.offspring.is_empty() && self.offspring.len() != population_size {
            return Err(CheckpointError::Malformed(format!(
                "offspring holds {} individuals, expected {}",
                self.offspring.len(),
                population_size
            )));
        }
        if self.phase == Phase::Reproducing && self.population.pending() > 0 {
            return Err(CheckpointError::Malformed(
                "completed generation has unevaluated individuals".into(),
            ));
        }

        for ind in self.population.iter().chain(self.offspring.iter()).chain(self.best.iter()) {
            codec
                .validate(&ind.design)
                .map_err(|e| CheckpointError::Malformed(format!("invalid design: {}", e)))?;
        }
        Ok(())
    }

    /// Cache entries plus every result held by the population, offspring and best.
    pub fn known_results(&self, codec: &DesignCodec) -> Vec<(Signature, EvaluationResult)> {
        let held = self
            .population
            .iter()
            .chain(self.offspring.iter())
            .chain(self.best.iter())
            .filter_map(|i| i.result.clone().map(|r| (codec.signature(&i.design), r)));

        self.cache
            .iter()
            .map(|(s, r)| (s.clone(), r.clone()))
            .chain(held)
            .collect()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
