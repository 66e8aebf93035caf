use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Sender};
use log::{debug, info, warn};

use shade_search::core::config::Problem;
use shade_search::core::domain::Design;
use shade_search::engine::external::command::CommandEvaluator;
use shade_search::interface::checkpoint::Checkpoint;
use shade_search::interface::report;
use shade_search::solvers::{Optimizer, ProgressSink, RunEvent, RunOutcome, Snapshot};

// --- CLI Definitions ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Evolutionary design-space search over an external simulator", long_about = None)]
struct Args {
    /// Problem definition (JSON): parameters, objective(s), constraints, params
    problem: PathBuf,

    /// Program evaluating one design (design JSON on stdin, metrics JSON on stdout)
    #[arg(short, long)]
    command: String,

    /// Extra argument passed to the program (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Working directory of the program
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Kill evaluations running longer than this and count them as failed
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Save a checkpoint here after every generation
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Resume from this checkpoint (an unusable checkpoint is discarded)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Write the final front (multi) or population (single) as CSV
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long)]
    population: Option<usize>,

    #[arg(long)]
    max_evaluations: Option<usize>,

    #[arg(long)]
    max_generations: Option<usize>,

    #[arg(long)]
    mutation_rate: Option<f64>,
}

// --- Progress Sink ---

/// Forwards events to the main thread and saves per-generation checkpoints.
struct CliSink {
    tx: Sender<RunEvent>,
    checkpoint_path: Option<PathBuf>,
}

impl ProgressSink for CliSink {
    fn emit(&mut self, event: RunEvent) {
        let _ = self.tx.send(event);
    }

    fn wants_checkpoints(&self) -> bool {
        self.checkpoint_path.is_some()
    }

    fn checkpoint(&mut self, state: Checkpoint) {
        if let Some(path) = &self.checkpoint_path {
            if let Err(e) = state.save(path) {
                warn!("Checkpoint not saved: {}", e);
            }
        }
    }
}

// --- Initialization Helpers ---

fn load_problem(args: &Args) -> Result<Problem> {
    let text = fs::read_to_string(&args.problem)
        .with_context(|| format!("Failed to read {}", args.problem.display()))?;
    let mut problem: Problem =
        serde_json::from_str(&text).context("Failed to parse problem definition")?;

    let params = &mut problem.params;
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    if let Some(n) = args.population {
        params.population_size = n;
    }
    if let Some(n) = args.max_evaluations {
        params.max_evaluations = n;
    }
    if let Some(n) = args.max_generations {
        params.max_generations = n;
    }
    if let Some(rate) = args.mutation_rate {
        params.mutation_rate = rate;
    }
    Ok(problem)
}

fn build_evaluator(args: &Args) -> CommandEvaluator {
    let mut evaluator = CommandEvaluator::new(&args.command).args(args.args.iter().cloned());
    if let Some(dir) = &args.workdir {
        evaluator = evaluator.working_dir(dir);
    }
    if let Some(secs) = args.timeout_secs {
        evaluator = evaluator.timeout(Duration::from_secs(secs));
    }
    evaluator
}

fn try_resume(optimizer: &mut Optimizer, path: &Path) {
    match Checkpoint::load(path).and_then(|state| optimizer.load_state(state)) {
        Ok(()) => info!("Resumed from {}", path.display()),
        Err(e) => warn!("Discarding checkpoint {}: {}. Starting fresh.", path.display(), e),
    }
}

fn describe(design: &Design) -> String {
    design
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_event(event: RunEvent) {
    match event {
        RunEvent::Log(msg) => info!("{}", msg),
        RunEvent::Evaluated { index, signature, cached } => {
            debug!("#{} {}{}", index, signature, if cached { " (cached)" } else { "" })
        }
        RunEvent::EvaluationFailed { signature, reason } => {
            eprintln!("  failed: {} ({})", signature, reason)
        }
        RunEvent::Generation(progress) => {
            let s = &progress.stats;
            let summary = match &progress.snapshot {
                Snapshot::Best(_) => match s.best_fitness {
                    Some(f) => format!("best {:.4}", f),
                    None => "best -".to_string(),
                },
                Snapshot::Front(front) => format!("front {}", front.len()),
            };
            println!(
                "gen {:>4} | evals {:>5} ({} new) | {} | feasible {}/{} | diversity {:.2}",
                s.generation,
                s.evaluations,
                s.external_evaluations,
                summary,
                s.feasible_count,
                s.pop_size,
                s.diversity
            );
        }
        RunEvent::NewBest(ind) => println!("  new best {:.4}: {}", ind.fitness(), describe(&ind.design)),
        RunEvent::Finished(reason) => println!("stopped: {}", reason),
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Single(o) => match &o.best {
            Some(best) => println!("Best fitness {:.6}: {}", best.fitness(), describe(&best.design)),
            None => println!("No feasible design found."),
        },
        RunOutcome::Multi(o) => {
            println!("Pareto front ({} designs):", o.front.len());
            for member in o.front.iter() {
                let metrics = member
                    .individual
                    .metrics()
                    .map(|m| {
                        m.iter()
                            .map(|(k, v)| format!("{}={}", k, v))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                let flag = if member.feasible { "" } else { " [infeasible]" };
                println!("  {} -> {}{}", describe(&member.individual.design), metrics, flag);
            }
        }
    }
}

// --- Main ---

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // 1. Configuration
    let problem = load_problem(&args)?;
    let mut optimizer = Optimizer::from_problem(&problem).context("Invalid problem definition")?;
    if let Some(path) = &args.resume {
        try_resume(&mut optimizer, path);
    }
    let evaluator = build_evaluator(&args);

    // 2. Spawn Solver Thread
    let (tx, rx) = unbounded();
    let mut sink = CliSink { tx, checkpoint_path: args.checkpoint.clone() };
    let cancel = optimizer.cancel_handle();
    let start = Instant::now();

    let worker = thread::Builder::new()
        .name("Solver-Worker".to_string())
        .spawn(move || -> Result<(Optimizer, RunOutcome)> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;

            let outcome = runtime.block_on(async {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Ctrl-C: finishing the current evaluation, then stopping");
                        cancel.cancel();
                    }
                });
                optimizer.run(&evaluator, &mut sink).await
            });
            Ok((optimizer, outcome))
        })?;

    // 3. Event Loop (ends when the worker drops its sender)
    for event in rx.iter() {
        print_event(event);
    }

    let (optimizer, outcome) = worker
        .join()
        .map_err(|_| anyhow!("Solver thread panicked"))??;

    // 4. Results
    if let Some(path) = &args.checkpoint {
        optimizer
            .get_state()
            .save(path)
            .with_context(|| format!("Failed to save checkpoint {}", path.display()))?;
    }
    if let Some(path) = &args.report {
        match &optimizer {
            Optimizer::Single(ga) => report::save_population(path, ga.population(), ga.specs())?,
            Optimizer::Multi(moga) => report::save_front(path, moga.front(), moga.specs())?,
        }
        info!("Report written to {}", path.display());
    }

    print_outcome(&outcome);
    println!(
        "{} evaluations in {:.1}s ({})",
        outcome.evaluations(),
        start.elapsed().as_secs_f64(),
        outcome.stop_reason()
    );
    Ok(())
}
