use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::core::codec::{DesignCodec, Signature};
use crate::core::domain::Metrics;
use crate::core::errors::EvaluationError;
use crate::core::objective::{is_feasible, Constraint, Goal};
use crate::core::population::{EvaluationResult, Individual};
use crate::engine::cache::FitnessCache;
use crate::engine::evaluator::Evaluator;
use crate::solvers::{ProgressSink, RunEvent, StopReason};

/// Shared cooperative cancellation flag.
///
/// Checked before every evaluation; an evaluation already in flight is never interrupted.
/// The flag stays set until [`CancelHandle::reset`] is called.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Turns raw metrics into an [`EvaluationResult`].
pub struct Scorer<'a> {
    /// Set for the single-objective search only.
    goal: Option<&'a Goal>,
    constraints: &'a [Constraint],
}

impl<'a> Scorer<'a> {
    pub fn single(goal: &'a Goal, constraints: &'a [Constraint]) -> Self {
        Self { goal: Some(goal), constraints }
    }

    pub fn multi(constraints: &'a [Constraint]) -> Self {
        Self { goal: None, constraints }
    }

    pub fn score(&self, metrics: Metrics) -> EvaluationResult {
        let feasible = is_feasible(self.constraints, &metrics);
        let fitness = self.goal.map(|goal| match goal.fitness(&metrics) {
            Some(f) if feasible => f,
            _ => f64::NEG_INFINITY,
        });
        EvaluationResult { metrics, fitness, feasible, failure: None }
    }

    pub fn failed(&self, reason: String) -> EvaluationResult {
        EvaluationResult {
            fitness: self.goal.map(|_| f64::NEG_INFINITY),
            ..EvaluationResult::failure(reason)
        }
    }
}

/// Outcome of one pass over the pending individuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStep {
    Complete,
    Stopped(StopReason),
}

/// Counters restored from, and written to, checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub evaluations: usize,
    pub external_evaluations: usize,
    pub cache_hits: usize,
}

/// Owns the cancellation flag and the fitness cache, and drives the fitness function
/// one individual at a time.
#[derive(Debug, Default)]
pub struct RunController {
    cancel: CancelHandle,
    cache: FitnessCache,
    counters: Counters,
}

impl RunController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cache(&self) -> &FitnessCache {
        &self.cache
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn evaluations(&self) -> usize {
        self.counters.evaluations
    }

    pub fn external_evaluations(&self) -> usize {
        self.counters.external_evaluations
    }

    /// Replaces counters and cache with restored state. The cancel flag is left alone.
    pub fn restore<I>(&mut self, counters: Counters, results: I)
    where
        I: IntoIterator<Item = (Signature, EvaluationResult)>,
    {
        self.counters = counters;
        self.cache.clear();
        self.cache.seed_from(results);
    }

    /// Evaluates every individual without a result, in order.
    ///
    /// Before each one: stop if cancelled, stop if `budget` requests were already made.
    /// Cache hits count against the budget but never reach the fitness function.
    /// A failed evaluation gets a worst-case result and the pass continues.
    pub async fn evaluate_pending<E, S>(
        &mut self,
        members: &mut [Individual],
        codec: &DesignCodec,
        scorer: &Scorer<'_>,
        budget: Option<usize>,
        evaluator: &E,
        sink: &mut S,
    ) -> EvalStep
    where
        E: Evaluator,
        S: ProgressSink + ?Sized,
    {
        for individual in members.iter_mut().filter(|i| !i.is_evaluated()) {
            if self.cancel.is_cancelled() {
                return EvalStep::Stopped(StopReason::Cancelled);
            }
            if budget.is_some_and(|max| self.counters.evaluations >= max) {
                return EvalStep::Stopped(StopReason::BudgetExhausted);
            }

            let index = self.counters.evaluations;
            let signature = codec.signature(&individual.design);

            if let Some(hit) = self.cache.get(&signature) {
                debug!("Cache hit #{}: {}", index, signature);
                individual.result = Some(hit.clone());
                self.counters.evaluations += 1;
                self.counters.cache_hits += 1;
                sink.emit(RunEvent::Evaluated { index, signature, cached: true });
                continue;
            }

            debug!("Evaluating #{} with {}: {}", index, evaluator.name(), signature);
            let result = match evaluator.evaluate(&individual.design).await {
                Ok(metrics) => scorer.score(metrics),
                Err(EvaluationError::Cancelled) => {
                    self.cancel.cancel();
                    return EvalStep::Stopped(StopReason::Cancelled);
                }
                Err(e @ EvaluationError::Failed(_)) => {
                    let reason = e.to_string();
                    warn!("Design {} failed: {}", signature, reason);
                    sink.emit(RunEvent::Log(format!("Evaluation of {} failed: {}", signature, reason)));
                    sink.emit(RunEvent::EvaluationFailed {
                        signature: signature.clone(),
                        reason: reason.clone(),
                    });
                    scorer.failed(reason)
                }
            };

            self.cache.put(signature.clone(), result.clone());
            individual.result = Some(result);
            self.counters.evaluations += 1;
            self.counters.external_evaluations += 1;
            sink.emit(RunEvent::Evaluated { index, signature, cached: false });
        }
        EvalStep::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Design, ParameterSpec};
    use std::cell::Cell;

    fn codec() -> DesignCodec {
        DesignCodec::new(vec![ParameterSpec::discrete("material", ["wood", "metal", "glass"])])
            .unwrap()
    }

    fn individual(material: &str) -> Individual {
        let mut d = Design::new();
        d.insert("material".into(), material.into());
        Individual::new(d, 1)
    }

    #[tokio::test]
    async fn duplicates_hit_the_cache_and_count_against_budget() {
        let calls = Cell::new(0);
        let eval = |_d: Design| {
            calls.set(calls.get() + 1);
            async { Ok::<_, EvaluationError>(Metrics::from([("sda".to_string(), 50.0)])) }
        };
        let goal = Goal::maximize("sda");
        let scorer = Scorer::single(&goal, &[]);
        let mut members = vec![individual("wood"), individual("wood"), individual("metal")];

        let mut ctl = RunController::new();
        let mut events = Vec::new();
        let step = ctl
            .evaluate_pending(&mut members, &codec(), &scorer, Some(2), &eval, &mut events)
            .await;

        assert_eq!(step, EvalStep::Stopped(StopReason::BudgetExhausted));
        assert_eq!(calls.get(), 1);
        assert_eq!(ctl.counters(), Counters { evaluations: 2, external_evaluations: 1, cache_hits: 1 });
        assert!(members[1].is_evaluated() && !members[2].is_evaluated());
    }

    #[tokio::test]
    async fn cancelled_flag_stops_before_calling() {
        let eval = |_d: Design| async { Ok::<_, EvaluationError>(Metrics::new()) };
        let scorer = Scorer::multi(&[]);
        let mut members = vec![individual("wood")];

        let mut ctl = RunController::new();
        ctl.cancel_handle().cancel();
        let step = ctl.evaluate_pending(&mut members, &codec(), &scorer, None, &eval, &mut ()).await;

        assert_eq!(step, EvalStep::Stopped(StopReason::Cancelled));
        assert_eq!(ctl.evaluations(), 0);
        assert!(!members[0].is_evaluated());
    }

    #[test]
    fn violated_constraint_forces_worst_fitness() {
        let goal = Goal::maximize("sda");
        let constraints = vec![Constraint::parse("ase < 10").unwrap()];
        let scorer = Scorer::single(&goal, &constraints);

        let r = scorer.score(Metrics::from([("sda".to_string(), 90.0), ("ase".to_string(), 15.0)]));
        assert!(!r.feasible);
        assert_eq!(r.fitness, Some(f64::NEG_INFINITY));

        let r = Scorer::multi(&constraints).score(Metrics::from([("ase".to_string(), 15.0)]));
        assert!(!r.feasible);
        assert_eq!(r.fitness, None);
    }
}
