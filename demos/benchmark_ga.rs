use std::time::Instant;

use crossbeam_channel::unbounded;
use shade_search::core::config::Params;
use shade_search::core::domain::{Design, Metrics, ParameterSpec};
use shade_search::core::errors::EvaluationError;
use shade_search::core::objective::Goal;
use shade_search::solvers::ga::GeneticAlgorithm;
use shade_search::solvers::RunEvent;

/// Smooth synthetic "daylight" response: peaks at depth 1.2, angle 30, frosted glass.
async fn mock_daylight(design: Design) -> Result<Metrics, EvaluationError> {
    let depth = design.get("depth").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let angle = design.get("angle").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let bonus = match design.get("material").map(|v| v.to_string()).as_deref() {
        Some("frosted") => 5.0,
        Some("clear") => 2.0,
        _ => 0.0,
    };

    let sda = 80.0 - 10.0 * (depth - 1.2).powi(2) - 0.01 * (angle - 30.0).powi(2) + bonus;
    Ok(Metrics::from([("sda".to_string(), sda)]))
}

#[tokio::main]
async fn main() {
    let parameters = vec![
        ParameterSpec::continuous("depth", 0.1, 2.0, 0.05),
        ParameterSpec::continuous("angle", 0.0, 90.0, 1.0),
        ParameterSpec::discrete("material", ["wood", "clear", "frosted"]),
    ];
    let params = Params {
        population_size: 100,
        max_evaluations: 10_000,
        seed: 42,
        ..Default::default()
    };

    let mut ga = match GeneticAlgorithm::new(parameters, Goal::maximize("sda"), Vec::new(), params) {
        Ok(ga) => ga,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    let (mut tx, rx) = unbounded::<RunEvent>();

    let start = Instant::now();
    let outcome = ga.run(&mock_daylight, &mut tx).await;
    let duration = start.elapsed();
    drop(tx);

    let generations = rx
        .iter()
        .filter(|e| matches!(e, RunEvent::Generation(_)))
        .count();

    println!("GA took: {:?}", duration);
    println!(
        "{} generations, {} evaluations ({} external)",
        generations, outcome.evaluations, outcome.external_evaluations
    );
    if let Some(best) = outcome.best {
        println!("Best sDA {:.3} at {:?}", best.fitness(), best.design);
    }
}
