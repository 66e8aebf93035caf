//! Design-space evolutionary search.
//!
//! A single-objective genetic algorithm and an NSGA-style multi-objective search over
//! continuous and discrete design parameters, driven by an async external fitness function.
//! Results are cached per design, runs are cancellable between evaluations, and every run
//! can be checkpointed and resumed.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod interface;
pub mod solvers;

pub use crate::core::config::{ObjectiveSpec, Params, Problem};
pub use crate::core::domain::{Design, Metrics, ParamValue, ParameterSpec};
pub use crate::core::errors::{CheckpointError, ConfigurationError, EngineError, EvaluationError};
pub use crate::engine::evaluator::Evaluator;
pub use crate::solvers::{Optimizer, ProgressSink, RunEvent, RunOutcome};
