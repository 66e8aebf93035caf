use chrono::Utc;
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::analysis::pareto::{objective_scores, rank_and_crowd, select_survivors, ParetoFront};
use crate::core::codec::DesignCodec;
use crate::core::config::{ObjectiveSpec, Params};
use crate::core::domain::ParameterSpec;
use crate::core::errors::{CheckpointError, ConfigurationError};
use crate::core::objective::{validate_objectives, Constraint, Objective};
use crate::core::population::{Individual, Population};
use crate::engine::evaluator::Evaluator;
use crate::engine::operators::{breed, tournament, Mutator};
use crate::interface::checkpoint::{Checkpoint, OptimizerKind, CHECKPOINT_VERSION};
use crate::solvers::controller::{CancelHandle, EvalStep, RunController, Scorer};
use crate::solvers::{GenStats, Phase, Progress, ProgressSink, RunEvent, Snapshot, StopReason};

/// Result of a multi-objective run.
#[derive(Debug, Clone)]
pub struct MogaOutcome {
    /// Rank-0 front of the last completed generation. Infeasible members are flagged,
    /// not removed.
    pub front: ParetoFront,
    pub stop_reason: StopReason,
    pub generations: usize,
    pub evaluations: usize,
    pub external_evaluations: usize,
}

/// NSGA-style search: parents and offspring are merged (2N), sorted into non-dominated
/// fronts and truncated back to N by crowding distance.
pub struct ParetoSearch {
    codec: DesignCodec,
    objectives: Vec<Objective>,
    constraints: Vec<Constraint>,
    params: Params,
    controller: RunController,

    population: Population,
    offspring: Population,
    front: ParetoFront,
    phase: Phase,
    generation: usize,
    rng: ChaCha8Rng,
    run_id: Uuid,
}

impl ParetoSearch {
    pub fn new(
        parameters: Vec<ParameterSpec>,
        objectives: Vec<Objective>,
        constraints: Vec<Constraint>,
        params: Params,
    ) -> Result<Self, ConfigurationError> {
        let codec = DesignCodec::new(parameters)?;
        validate_objectives(&objectives)?;
        params.validate()?;

        Ok(Self {
            codec,
            front: ParetoFront { objectives: objectives.clone(), members: Vec::new() },
            objectives,
            constraints,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            params,
            controller: RunController::new(),
            population: Population::default(),
            offspring: Population::default(),
            phase: Phase::Seeding,
            generation: 0,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        self.codec.specs()
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.controller.cancel_handle()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn front(&self) -> &ParetoFront {
        &self.front
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Runs until `max_generations` generations are complete or cancellation.
    pub async fn run<E, S>(&mut self, evaluator: &E, sink: &mut S) -> MogaOutcome
    where
        E: Evaluator,
        S: ProgressSink + ?Sized,
    {
        info!(
            "MOGA run {} started: N={}, {} objectives, {} generations",
            self.run_id,
            self.params.population_size,
            self.objectives.len(),
            self.params.max_generations
        );

        loop {
            match self.phase {
                Phase::Seeding => {
                    let n = self.params.population_size;
                    let members = (0..n)
                        .map(|_| Individual::new(self.codec.random_design(&mut self.rng), 1))
                        .collect::<Vec<_>>();
                    self.population.replace(members);
                    self.phase = Phase::Evaluating;
                }
                Phase::Evaluating => {
                    if let EvalStep::Stopped(reason) = self.evaluate(evaluator, sink).await {
                        return self.finish(reason, sink);
                    }
                    if !self.offspring.is_empty() {
                        self.select_survivors();
                    }
                    self.complete_generation(sink);
                }
                Phase::Reproducing => {
                    if self.generation >= self.params.max_generations {
                        return self.finish(StopReason::GenerationLimit, sink);
                    }
                    if self.controller.is_cancelled() {
                        return self.finish(StopReason::Cancelled, sink);
                    }
                    self.make_offspring();
                    self.phase = Phase::Evaluating;
                }
            }
        }
    }

    /// Pending parents first (seed generation), then pending offspring.
    async fn evaluate<E, S>(&mut self, evaluator: &E, sink: &mut S) -> EvalStep
    where
        E: Evaluator,
        S: ProgressSink + ?Sized,
    {
        let scorer = Scorer::multi(&self.constraints);
        for batch in [&mut self.population, &mut self.offspring] {
            let step = self
                .controller
                .evaluate_pending(batch.members_mut(), &self.codec, &scorer, None, evaluator, sink)
                .await;
            if step != EvalStep::Complete {
                return step;
            }
        }
        EvalStep::Complete
    }

    fn select_survivors(&mut self) {
        let n = self.params.population_size;
        let mut pool = self.population.replace(Vec::new());
        pool.extend(self.offspring.replace(Vec::new()));

        let scores: Vec<Vec<f64>> = pool
            .iter()
            .map(|i| objective_scores(i, &self.objectives))
            .collect();
        let chosen = select_survivors(&scores, n);
        debug!("Kept {} of {} (parents + offspring)", chosen.len(), pool.len());

        let next = chosen.into_iter().map(|i| pool[i].clone()).collect();
        self.population.replace(next);
    }

    fn complete_generation<S: ProgressSink + ?Sized>(&mut self, sink: &mut S) {
        self.generation += 1;
        self.front = ParetoFront::from_individuals(self.population.members(), &self.objectives);
        self.phase = Phase::Reproducing;

        let stats = self.stats();
        info!(
            "Gen {}: front={} feasible={} evals={} (external {})",
            stats.generation,
            stats.front_size,
            stats.feasible_count,
            stats.evaluations,
            stats.external_evaluations
        );
        sink.emit(RunEvent::Generation(Progress {
            stats,
            snapshot: Snapshot::Front(self.front.clone()),
        }));
        if sink.wants_checkpoints() {
            sink.checkpoint(self.get_state());
        }
    }

    /// Binary tournaments on (rank, crowding distance), then crossover and mutation.
    fn make_offspring(&mut self) {
        let n = self.params.population_size;
        let k = self.params.tournament_size;
        let mutator = Mutator::new(self.params.mutation_rate).span(self.params.mutation_span);
        let parents = self.population.members();

        let scores: Vec<Vec<f64>> = parents
            .iter()
            .map(|i| objective_scores(i, &self.objectives))
            .collect();
        let standings = rank_and_crowd(&scores);
        let better = |a: usize, b: usize| standings[a].beats(&standings[b]);

        let mut children = Vec::with_capacity(n);
        while children.len() < n {
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
            children.push(Individual::new(design, self.generation + 1));
        }
        self.offspring.replace(children);
    }

    fn stats(&self) -> GenStats {
        let counters = self.controller.counters();
        let results = self.population.iter().filter_map(|i| i.result.as_ref());
        let (failed, ok): (Vec<_>, Vec<_>) = results.partition(|r| r.is_failure());

        GenStats {
            generation: self.generation,
            evaluations: counters.evaluations,
            external_evaluations: counters.external_evaluations,
            cache_hits: counters.cache_hits,
            front_size: self.front.len(),
            feasible_count: ok.iter().filter(|r| r.feasible).count(),
            failed_count: failed.len(),
            diversity: self.population.diversity(&self.codec),
            pop_size: self.population.len(),
            ..Default::default()
        }
    }

    fn finish<S: ProgressSink + ?Sized>(&mut self, reason: StopReason, sink: &mut S) -> MogaOutcome {
        let counters = self.controller.counters();
        info!(
            "MOGA run {} stopped ({}): {} generations, front of {}",
            self.run_id,
            reason,
            self.generation,
            self.front.len()
        );
        sink.emit(RunEvent::Log(format!(
            "MOGA finished ({}). Front size: {}",
            reason,
            self.front.len()
        )));
        sink.emit(RunEvent::Finished(reason));

        MogaOutcome {
            front: self.front.clone(),
            stop_reason: reason,
            generations: self.generation,
            evaluations: counters.evaluations,
            external_evaluations: counters.external_evaluations,
        }
    }

    fn objective_spec(&self) -> ObjectiveSpec {
        ObjectiveSpec::Multi(self.objectives.clone())
    }

    pub fn get_state(&self) -> Checkpoint {
        let counters = self.controller.counters();
        Checkpoint {
            version: CHECKPOINT_VERSION,
            run_id: self.run_id,
            saved_at: Utc::now(),
            kind: OptimizerKind::Multi,
            parameters: self.codec.specs().to_vec(),
            objective: self.objective_spec(),
            constraints: self.constraints.clone(),
            phase: self.phase,
            generation: self.generation,
            evaluations: counters.evaluations,
            external_evaluations: counters.external_evaluations,
            cache_hits: counters.cache_hits,
            stalled_generations: 0,
            population: self.population.clone(),
            offspring: self.offspring.clone(),
            best: None,
            front: Some(self.front.clone()),
            cache: self
                .controller
                .cache()
                .iter()
                .map(|(s, r)| (s.clone(), r.clone()))
                .collect(),
            rng: self.rng.clone(),
        }
    }

    /// Replaces parents, pending offspring, counters, cache and random stream.
    /// The front is recomputed from the restored parents under the live objectives.
    pub fn load_state(&mut self, state: Checkpoint) -> Result<(), CheckpointError> {
        state.validate(
            OptimizerKind::Multi,
            &self.codec,
            &self.objective_spec(),
            &self.constraints,
            self.params.population_size,
        )?;
        if state.phase == Phase::Reproducing && !state.offspring.is_empty() {
            return Err(CheckpointError::Malformed(
                "completed generation still carries offspring".into(),
            ));
        }

        self.controller.restore(state.counters(), state.known_results(&self.codec));
        self.run_id = state.run_id;
        self.phase = state.phase;
        self.generation = state.generation;
        self.population = state.population;
        self.offspring = state.offspring;
        self.rng = state.rng;
        self.front = if self.generation > 0 {
            ParetoFront::from_individuals(self.population.members(), &self.objectives)
        } else {
            ParetoFront { objectives: self.objectives.clone(), members: Vec::new() }
        };

        info!(
            "Restored MOGA run {} at generation {} ({} evaluations)",
            self.run_id, self.generation, self.controller.evaluations()
        );
        Ok(())
    }
}
