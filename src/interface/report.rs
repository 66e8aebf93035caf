use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};

use crate::analysis::pareto::ParetoFront;
use crate::core::domain::ParameterSpec;
use crate::core::population::{Individual, Population};

/// Metric columns: every metric name seen in `individuals`, sorted.
fn metric_columns<'a>(individuals: impl Iterator<Item = &'a Individual>) -> Vec<String> {
    individuals
        .filter_map(Individual::metrics)
        .flat_map(|m| m.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn design_and_metrics(ind: &Individual, specs: &[ParameterSpec], metrics: &[String]) -> Vec<String> {
    let mut row: Vec<String> = specs
        .iter()
        .map(|s| ind.design.get(&s.name).map(|v| v.to_string()).unwrap_or_default())
        .collect();
    row.extend(metrics.iter().map(|name| {
        ind.metrics()
            .and_then(|m| m.get(name))
            .map(|v| v.to_string())
            .unwrap_or_default()
    }));
    row
}

/// One row per front member: rank, crowding distance, feasibility, parameters, metrics.
pub fn write_front<W: io::Write>(writer: W, front: &ParetoFront, specs: &[ParameterSpec]) -> Result<()> {
    let metrics = metric_columns(front.iter().map(|m| &m.individual));
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["rank".to_string(), "crowding_distance".into(), "feasible".into()];
    header.extend(specs.iter().map(|s| s.name.clone()));
    header.extend(metrics.iter().cloned());
    csv.write_record(&header)?;

    for member in front.iter() {
        let mut row = vec![
            member.rank.to_string(),
            member.crowding_distance.to_string(),
            member.feasible.to_string(),
        ];
        row.extend(design_and_metrics(&member.individual, specs, &metrics));
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

/// One row per individual: generation, fitness, feasibility, failure, parameters, metrics.
pub fn write_population<W: io::Write>(
    writer: W,
    population: &Population,
    specs: &[ParameterSpec],
) -> Result<()> {
    let metrics = metric_columns(population.iter());
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![
        "generation".to_string(),
        "fitness".into(),
        "feasible".into(),
        "failure".into(),
    ];
    header.extend(specs.iter().map(|s| s.name.clone()));
    header.extend(metrics.iter().cloned());
    csv.write_record(&header)?;

    for ind in population {
        let result = ind.result.as_ref();
        let mut row = vec![
            ind.generation.to_string(),
            result.and_then(|r| r.fitness).map(|f| f.to_string()).unwrap_or_default(),
            result.map(|r| r.feasible.to_string()).unwrap_or_default(),
            result.and_then(|r| r.failure.clone()).unwrap_or_default(),
        ];
        row.extend(design_and_metrics(ind, specs, &metrics));
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn save_front(path: &Path, front: &ParetoFront, specs: &[ParameterSpec]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_front(file, front, specs)
}

pub fn save_population(path: &Path, population: &Population, specs: &[ParameterSpec]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_population(file, population, specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Design, Metrics};
    use crate::core::objective::Objective;
    use crate::core::population::EvaluationResult;

    #[test]
    fn front_csv_has_parameter_and_metric_columns() {
        let specs = vec![
            ParameterSpec::continuous("depth", 0.1, 2.0, 0.1),
            ParameterSpec::discrete("material", ["wood", "metal"]),
        ];
        let mut design = Design::new();
        design.insert("depth".into(), 0.5.into());
        design.insert("material".into(), "wood".into());
        let mut ind = Individual::new(design, 1);
        ind.result = Some(EvaluationResult::from_metrics(Metrics::from([
            ("sda".to_string(), 70.0),
            ("ase".to_string(), 5.0),
        ])));

        let objectives = vec![Objective::maximize("sda"), Objective::minimize("ase")];
        let front = ParetoFront::from_individuals(&[ind], &objectives);

        let mut buf = Vec::new();
        write_front(&mut buf, &front, &specs).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "rank,crowding_distance,feasible,depth,material,ase,sda");
        assert_eq!(lines[1], "0,inf,true,0.5,wood,5,70");
    }
}
