use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::analysis::pareto::ParetoFront;
use crate::core::codec::Signature;
use crate::core::config::{ObjectiveSpec, Problem};
use crate::core::domain::ParameterSpec;
use crate::core::errors::{CheckpointError, ConfigurationError};
use crate::core::population::Individual;
use crate::engine::evaluator::Evaluator;
use crate::interface::checkpoint::{Checkpoint, OptimizerKind};

pub mod controller;
pub mod ga;
pub mod moga;

pub use controller::CancelHandle;
pub use ga::{GaOutcome, GeneticAlgorithm};
pub use moga::{MogaOutcome, ParetoSearch};

/// Where a run is inside its generational loop. Persisted in checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No population yet.
    Seeding,
    /// Some individuals may still lack a result.
    Evaluating,
    /// The current generation is complete; next step is breeding.
    Reproducing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BudgetExhausted,
    GenerationLimit,
    Cancelled,
    Stalled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::BudgetExhausted => "evaluation budget exhausted",
            StopReason::GenerationLimit => "generation limit reached",
            StopReason::Cancelled => "cancelled",
            StopReason::Stalled => "no new designs",
        };
        f.write_str(s)
    }
}

/// Detailed statistics for a single completed generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenStats {
    pub generation: usize,
    pub evaluations: usize,          // Requests, cache hits included
    pub external_evaluations: usize, // Calls that reached the fitness function
    pub cache_hits: usize,

    // GA only: usable fitness over evaluated, feasible members
    pub best_fitness: Option<f64>,
    pub avg_fitness: Option<f64>,
    pub worst_fitness: Option<f64>,

    /// MOGA only: size of the rank-0 front.
    pub front_size: usize,
    pub feasible_count: usize,
    pub failed_count: usize,
    pub diversity: f64, // 0.0 to 1.0 (Unique signatures / Population size)
    pub pop_size: usize,
}

/// What a progress consumer sees of the search after a generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Best individual seen so far (None until something feasible was evaluated).
    Best(Option<Individual>),
    /// Rank-0 front of the current population.
    Front(ParetoFront),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub stats: GenStats,
    pub snapshot: Snapshot,
}

/// Events emitted by the optimizers to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Diagnostic log message.
    Log(String),

    /// An individual passed through the evaluation step.
    /// `index` is the 0-based evaluation request number of the run.
    Evaluated { index: usize, signature: Signature, cached: bool },

    /// The fitness function failed for one design; the run continues.
    EvaluationFailed { signature: Signature, reason: String },

    /// A completed generation.
    Generation(Progress),

    /// GA best-so-far improved.
    NewBest(Individual),

    /// The run has stopped.
    Finished(StopReason),
}

/// Receives run events. Sinks that ask for checkpoints get a fresh snapshot after every
/// completed generation.
pub trait ProgressSink {
    fn emit(&mut self, event: RunEvent);

    fn wants_checkpoints(&self) -> bool {
        false
    }

    fn checkpoint(&mut self, _state: Checkpoint) {}
}

/// Discards everything.
impl ProgressSink for () {
    fn emit(&mut self, _event: RunEvent) {}
}

/// Collects events, mostly for tests.
impl ProgressSink for Vec<RunEvent> {
    fn emit(&mut self, event: RunEvent) {
        self.push(event);
    }
}

/// Forwards events to another thread (e.g. the CLI's printer).
impl ProgressSink for Sender<RunEvent> {
    fn emit(&mut self, event: RunEvent) {
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink.
pub struct Callback<F>(pub F);

impl<F: FnMut(RunEvent)> ProgressSink for Callback<F> {
    fn emit(&mut self, event: RunEvent) {
        (self.0)(event)
    }
}

/// Either optimizer, built from a validated [`Problem`].
pub enum Optimizer {
    Single(GeneticAlgorithm),
    Multi(ParetoSearch),
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Single(GaOutcome),
    Multi(MogaOutcome),
}

impl RunOutcome {
    pub fn stop_reason(&self) -> StopReason {
        match self {
            RunOutcome::Single(o) => o.stop_reason,
            RunOutcome::Multi(o) => o.stop_reason,
        }
    }

    pub fn evaluations(&self) -> usize {
        match self {
            RunOutcome::Single(o) => o.evaluations,
            RunOutcome::Multi(o) => o.evaluations,
        }
    }
}

impl Optimizer {
    pub fn from_problem(problem: &Problem) -> Result<Self, ConfigurationError> {
        problem.validate()?;
        let optimizer = match &problem.objective {
            ObjectiveSpec::Single(goal) => Optimizer::Single(GeneticAlgorithm::new(
                problem.parameters.clone(),
                goal.clone(),
                problem.constraints.clone(),
                problem.params.clone(),
            )?),
            ObjectiveSpec::Multi(objectives) => Optimizer::Multi(ParetoSearch::new(
                problem.parameters.clone(),
                objectives.clone(),
                problem.constraints.clone(),
                problem.params.clone(),
            )?),
        };
        Ok(optimizer)
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::Single(_) => OptimizerKind::Single,
            Optimizer::Multi(_) => OptimizerKind::Multi,
        }
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        match self {
            Optimizer::Single(ga) => ga.specs(),
            Optimizer::Multi(moga) => moga.specs(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        match self {
            Optimizer::Single(ga) => ga.cancel_handle(),
            Optimizer::Multi(moga) => moga.cancel_handle(),
        }
    }

    pub async fn run<E, S>(&mut self, evaluator: &E, sink: &mut S) -> RunOutcome
    where
        E: Evaluator,
        S: ProgressSink + ?Sized,
    {
        match self {
            Optimizer::Single(ga) => RunOutcome::Single(ga.run(evaluator, sink).await),
            Optimizer::Multi(moga) => RunOutcome::Multi(moga.run(evaluator, sink).await),
        }
    }

    pub fn get_state(&self) -> Checkpoint {
        match self {
            Optimizer::Single(ga) => ga.get_state(),
            Optimizer::Multi(moga) => moga.get_state(),
        }
    }

    pub fn load_state(&mut self, state: Checkpoint) -> Result<(), CheckpointError> {
        match self {
            Optimizer::Single(ga) => ga.load_state(state),
            Optimizer::Multi(moga) => moga.load_state(state),
        }
    }
}
