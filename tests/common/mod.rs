#![allow(dead_code)]

use std::future::Future;
use std::sync::Mutex;

use shade_search::core::domain::{Design, Metrics, ParameterSpec};
use shade_search::core::errors::EvaluationError;
use shade_search::engine::evaluator::Evaluator;
use shade_search::solvers::RunEvent;

type Model = Box<dyn Fn(&Design) -> Result<Metrics, EvaluationError> + Send + Sync>;

/// Deterministic stand-in for the simulator. Records every design it is asked to evaluate.
pub struct StubEvaluator {
    calls: Mutex<Vec<Design>>,
    model: Model,
}

impl StubEvaluator {
    pub fn new<F>(model: F) -> Self
    where
        F: Fn(&Design) -> Result<Metrics, EvaluationError> + Send + Sync + 'static,
    {
        Self { calls: Mutex::new(Vec::new()), model: Box::new(model) }
    }

    pub fn calls(&self) -> Vec<Design> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Evaluator for StubEvaluator {
    fn evaluate(&self, design: &Design) -> impl Future<Output = Result<Metrics, EvaluationError>> {
        self.calls.lock().unwrap().push(design.clone());
        let result = (self.model)(design);
        async move { result }
    }

    fn name(&self) -> &str {
        "Stub Evaluator"
    }
}

pub fn metrics(pairs: &[(&str, f64)]) -> Metrics {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn num(design: &Design, name: &str) -> f64 {
    design[name].as_f64().unwrap()
}

pub fn text(design: &Design, name: &str) -> String {
    design[name].to_string()
}

/// Two-parameter shading device: louvre depth and a discrete glazing material.
pub fn shading_specs() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::continuous("depth", 0.1, 2.0, 0.1),
        ParameterSpec::discrete("material", ["clear", "frosted", "tinted"]),
    ]
}

/// Deeper louvres cut glare (ase) but also daylight (sda); frosted glass diffuses.
pub fn daylight_model(design: &Design) -> Result<Metrics, EvaluationError> {
    let depth = num(design, "depth");
    let (sda_bonus, ase_factor) = match text(design, "material").as_str() {
        "frosted" => (-5.0, 0.5),
        "tinted" => (-15.0, 0.3),
        _ => (0.0, 1.0),
    };
    Ok(metrics(&[
        ("sda", 90.0 - 20.0 * depth + sda_bonus),
        ("ase", (20.0 - 8.0 * depth) * ase_factor),
    ]))
}

/// `(index, signature, cached)` for every evaluation request, in order.
pub fn trace(events: &[RunEvent]) -> Vec<(usize, String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Evaluated { index, signature, cached } => {
                Some((*index, signature.to_string(), *cached))
            }
            _ => None,
        })
        .collect()
}
