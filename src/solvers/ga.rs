use chrono::Utc;
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::core::codec::DesignCodec;
use crate::core::config::{ObjectiveSpec, Params};
use crate::core::domain::ParameterSpec;
use crate::core::errors::{CheckpointError, ConfigurationError};
use crate::core::objective::{Constraint, Goal};
use crate::core::population::{Individual, Population};
use crate::engine::evaluator::Evaluator;
use crate::engine::operators::{breed, tournament, Mutator};
use crate::interface::checkpoint::{Checkpoint, OptimizerKind, CHECKPOINT_VERSION};
use crate::solvers::controller::{CancelHandle, EvalStep, RunController, Scorer};
use crate::solvers::{GenStats, Phase, Progress, ProgressSink, RunEvent, Snapshot, StopReason};

/// Result of a single-objective run.
#[derive(Debug, Clone)]
pub struct GaOutcome {
    /// Best feasible individual seen across the whole run.
    pub best: Option<Individual>,
    pub stop_reason: StopReason,
    pub generations: usize,
    pub evaluations: usize,
    pub external_evaluations: usize,
}

/// Generational GA toward one scalar fitness, with elitism of size 1.
pub struct GeneticAlgorithm {
    codec: DesignCodec,
    goal: Goal,
    constraints: Vec<Constraint>,
    params: Params,
    controller: RunController,

    population: Population,
    phase: Phase,
    generation: usize,
    best: Option<Individual>,
    stalled: usize,
    rng: ChaCha8Rng,
    run_id: Uuid,
}

impl GeneticAlgorithm {
    pub fn new(
        parameters: Vec<ParameterSpec>,
        goal: Goal,
        constraints: Vec<Constraint>,
        params: Params,
    ) -> Result<Self, ConfigurationError> {
        let codec = DesignCodec::new(parameters)?;
        goal.validate()?;
        params.validate()?;

        Ok(Self {
            codec,
            goal,
            constraints,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            params,
            controller: RunController::new(),
            population: Population::default(),
            phase: Phase::Seeding,
            generation: 0,
            best: None,
            stalled: 0,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        self.codec.specs()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.controller.cancel_handle()
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Runs until the evaluation budget is spent, the stall guard trips, or cancellation.
    /// May be called again after [`load_state`](Self::load_state) or with a larger budget.
    pub async fn run<E, S>(&mut self, evaluator: &E, sink: &mut S) -> GaOutcome
    where
        E: Evaluator,
        S: ProgressSink + ?Sized,
    {
        info!(
            "GA run {} started: N={}, budget={} evaluations",
            self.run_id, self.params.population_size, self.params.max_evaluations
        );
        sink.emit(RunEvent::Log(format!(
            "Optimizing '{}' over {} parameters",
            self.goal.metric(),
            self.codec.specs().len()
        )));

        loop {
            match self.phase {
                Phase::Seeding => {
                    self.seed_population();
                    self.phase = Phase::Evaluating;
                }
                Phase::Evaluating => {
                    let external_before = self.controller.external_evaluations();
                    let scorer = Scorer::single(&self.goal, &self.constraints);
                    let step = self
                        .controller
                        .evaluate_pending(
                            self.population.members_mut(),
                            &self.codec,
                            &scorer,
                            Some(self.params.max_evaluations),
                            evaluator,
                            sink,
                        )
                        .await;

                    self.update_best(sink);
                    if let EvalStep::Stopped(reason) = step {
                        return self.finish(reason, sink);
                    }

                    let fresh = self.controller.external_evaluations() - external_before;
                    self.complete_generation(fresh, sink);
                }
                Phase::Reproducing => {
                    if let Some(reason) = self.stop_reason() {
                        return self.finish(reason, sink);
                    }
                    self.reproduce();
                    self.phase = Phase::Evaluating;
                }
            }
        }
    }

    fn seed_population(&mut self) {
        let n = self.params.population_size;
        let members = (0..n)
            .map(|_| Individual::new(self.codec.random_design(&mut self.rng), 1))
            .collect::<Vec<_>>();
        self.population.replace(members);
        debug!("Seeded {} random designs", n);
    }

    /// Best is replaced only by a strictly better, finite, feasible fitness.
    fn update_best<S: ProgressSink + ?Sized>(&mut self, sink: &mut S) {
        let mut improved = false;
        for ind in self.population.iter() {
            let Some(result) = &ind.result else { continue };
            let fitness = result.usable_fitness();
            if result.is_failure() || !result.feasible || !fitness.is_finite() {
                continue;
            }
            if self.best.as_ref().map_or(true, |b| fitness > b.fitness()) {
                self.best = Some(ind.clone());
                improved = true;
            }
        }

        if improved {
            if let Some(best) = &self.best {
                info!("New best fitness {:.6}", best.fitness());
                sink.emit(RunEvent::NewBest(best.clone()));
            }
        }
    }

    fn complete_generation<S: ProgressSink + ?Sized>(&mut self, fresh: usize, sink: &mut S) {
        self.generation += 1;
        self.stalled = if fresh == 0 { self.stalled + 1 } else { 0 };
        self.phase = Phase::Reproducing;

        let stats = self.stats();
        info!(
            "Gen {}: best={:?} evals={} (external {}) diversity={:.2}",
            stats.generation,
            stats.best_fitness,
            stats.evaluations,
            stats.external_evaluations,
            stats.diversity
        );
        sink.emit(RunEvent::Generation(Progress {
            stats,
            snapshot: Snapshot::Best(self.best.clone()),
        }));
        if sink.wants_checkpoints() {
            sink.checkpoint(self.get_state());
        }
    }

    fn stop_reason(&self) -> Option<StopReason> {
        if self.controller.evaluations() >= self.params.max_evaluations {
            return Some(StopReason::BudgetExhausted);
        }
        if let Some(limit) = self.params.max_stalled_generations {
            if self.stalled >= limit {
                return Some(StopReason::Stalled);
            }
        }
        if self.controller.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        None
    }

    /// Elite of the current population carried over unchanged, the rest bred by
    /// tournament selection, crossover and mutation.
    fn reproduce(&mut self) {
        let n = self.params.population_size;
        let k = self.params.tournament_size;
        let mutator = Mutator::new(self.params.mutation_rate).span(self.params.mutation_span);
        let parents = self.population.members();

        let mut next = Vec::with_capacity(n);
        if let Some(elite) = self.population.best_index() {
            next.push(parents[elite].clone());
        }

        while next.len() < n {
            let better = |a: usize, b: usize| parents[a].fitness() > parents[b].fitness();
            let a = tournament(parents.len(), k, &mut self.rng, better);
            let b = tournament(parents.len(), k, &mut self.rng, better);
            let design = breed(
                &parents[a].design,
                &parents[b].design,
                self.codec.specs(),
                self.params.crossover_rate,
                &mutator,
                &mut self.rng,
            );
            next.push(Individual::new(design, self.generation + 1));
        }

        self.population.replace(next);
    }

    fn stats(&self) -> GenStats {
        let counters = self.controller.counters();
        let mut stats = GenStats {
            generation: self.generation,
            evaluations: counters.evaluations,
            external_evaluations: counters.external_evaluations,
            cache_hits: counters.cache_hits,
            diversity: self.population.diversity(&self.codec),
            pop_size: self.population.len(),
            ..Default::default()
        };

        let mut usable = Vec::new();
        for result in self.population.iter().filter_map(|i| i.result.as_ref()) {
            if result.is_failure() {
                stats.failed_count += 1;
            } else if result.feasible {
                stats.feasible_count += 1;
                usable.push(result.usable_fitness());
            }
        }
        let usable: Vec<f64> = usable.into_iter().filter(|f| f.is_finite()).collect();

        if !usable.is_empty() {
            stats.best_fitness = usable.iter().copied().reduce(f64::max);
            stats.worst_fitness = usable.iter().copied().reduce(f64::min);
            stats.avg_fitness = Some(usable.iter().sum::<f64>() / usable.len() as f64);
        }
        stats
    }

    fn finish<S: ProgressSink + ?Sized>(&mut self, reason: StopReason, sink: &mut S) -> GaOutcome {
        let counters = self.controller.counters();
        info!(
            "GA run {} stopped ({}): {} generations, {} evaluations, {} external",
            self.run_id, reason, self.generation, counters.evaluations, counters.external_evaluations
        );
        sink.emit(RunEvent::Log(format!(
            "GA finished ({}). Total evals: {}",
            reason, counters.evaluations
        )));
        sink.emit(RunEvent::Finished(reason));

        GaOutcome {
            best: self.best.clone(),
            stop_reason: reason,
            generations: self.generation,
            evaluations: counters.evaluations,
            external_evaluations: counters.external_evaluations,
        }
    }

    fn objective_spec(&self) -> ObjectiveSpec {
        ObjectiveSpec::Single(self.goal.clone())
    }

    /// Pure snapshot of the run.
    pub fn get_state(&self) -> Checkpoint {
        let counters = self.controller.counters();
        Checkpoint {
            version: CHECKPOINT_VERSION,
            run_id: self.run_id,
            saved_at: Utc::now(),
            kind: OptimizerKind::Single,
            parameters: self.codec.specs().to_vec(),
            objective: self.objective_spec(),
            constraints: self.constraints.clone(),
            phase: self.phase,
            generation: self.generation,
            evaluations: counters.evaluations,
            external_evaluations: counters.external_evaluations,
            cache_hits: counters.cache_hits,
            stalled_generations: self.stalled,
            population: self.population.clone(),
            offspring: Population::default(),
            best: self.best.clone(),
            front: None,
            cache: self
                .controller
                .cache()
                .iter()
                .map(|(s, r)| (s.clone(), r.clone()))
                .collect(),
            rng: self.rng.clone(),
        }
    }

    /// Replaces population, counters, cache and random stream. The checkpoint must have been
    /// scored under the same goal and constraints; the budget stays as configured, so a
    /// resumed run may be given a larger one.
    pub fn load_state(&mut self, state: Checkpoint) -> Result<(), CheckpointError> {
        state.validate(
            OptimizerKind::Single,
            &self.codec,
            &self.objective_spec(),
            &self.constraints,
            self.params.population_size,
        )?;
        if !state.offspring.is_empty() {
            return Err(CheckpointError::Malformed(
                "single-objective checkpoint carries offspring".into(),
            ));
        }

        self.controller.restore(state.counters(), state.known_results(&self.codec));
        self.run_id = state.run_id;
        self.phase = state.phase;
        self.generation = state.generation;
        self.stalled = state.stalled_generations;
        self.population = state.population;
        self.best = state.best;
        self.rng = state.rng;

        info!(
            "Restored GA run {} at generation {} ({} evaluations)",
            self.run_id, self.generation, self.controller.evaluations()
        );
        Ok(())
    }
}
