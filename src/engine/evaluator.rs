use std::future::Future;

use crate::core::domain::{Design, Metrics};
use crate::core::errors::EvaluationError;

/// A generic interface for the external fitness function (e.g. a daylight simulation).
///
/// The engine awaits one evaluation at a time, so implementations may own a single
/// non-reentrant resource such as a working directory or a simulation process.
/// Identical designs should produce near-identical metrics; results are cached by design.
pub trait Evaluator {
    /// Evaluates one design and returns its raw metrics.
    fn evaluate(&self, design: &Design) -> impl Future<Output = Result<Metrics, EvaluationError>>;

    /// Returns the name of the engine (e.g., "radiance (pipe)").
    fn name(&self) -> &str {
        "fitness function"
    }
}

/// Any `Fn(Design) -> impl Future<Output = Result<Metrics, EvaluationError>>` is an evaluator.
impl<F, Fut> Evaluator for F
where
    F: Fn(Design) -> Fut,
    Fut: Future<Output = Result<Metrics, EvaluationError>>,
{
    fn evaluate(&self, design: &Design) -> impl Future<Output = Result<Metrics, EvaluationError>> {
        self(design.clone())
    }
}
