use rand::seq::index;
use rand::Rng;

use crate::core::codec::{quantize, random_value};
use crate::core::domain::{Design, ParamValue, ParameterKind, ParameterSpec};

/// Tournament selection: samples `size` distinct indices out of `len` and returns the winner.
///
/// `better(a, b)` must return true when candidate `a` beats the current winner `b`.
/// Ties keep the earlier sampled candidate.
pub fn tournament<R, F>(len: usize, size: usize, rng: &mut R, mut better: F) -> usize
where
    R: Rng + ?Sized,
    F: FnMut(usize, usize) -> bool,
{
    assert!(len > 0, "Tournament selection called on empty population");

    let mut sample = index::sample(rng, len, size.clamp(1, len)).into_iter();
    let mut best = sample.next().unwrap_or(0);
    for candidate in sample {
        if better(candidate, best) {
            best = candidate;
        }
    }
    best
}

/// Uniform per-parameter crossover.
///
/// Continuous values are blended, `quantize(a + u * (b - a))`; discrete values are taken
/// from either parent with equal probability.
pub fn crossover<R: Rng + ?Sized>(
    a: &Design,
    b: &Design,
    specs: &[ParameterSpec],
    rng: &mut R,
) -> Design {
    let mut child = Design::new();

    for spec in specs {
        let value = match (a.get(&spec.name), b.get(&spec.name)) {
            (Some(va), Some(vb)) => match (&spec.kind, va, vb) {
                (
                    ParameterKind::Continuous { min, max, step },
                    ParamValue::Number(x),
                    ParamValue::Number(y),
                ) => {
                    let u: f64 = rng.gen();
                    ParamValue::Number(quantize(*min, *max, *step, x + u * (y - x)))
                }
                _ => {
                    if rng.gen_bool(0.5) {
                        va.clone()
                    } else {
                        vb.clone()
                    }
                }
            },
            (Some(v), None) | (None, Some(v)) => v.clone(),
            (None, None) => random_value(spec, rng),
        };
        child.insert(spec.name.clone(), value);
    }
    child
}

/// A per-parameter mutation operator.
#[derive(Clone, Debug)]
pub struct Mutator {
    rate: f64,      // Probability per parameter
    span: u32,      // Max steps for continuous moves
}

impl Mutator {
    pub fn new(rate: f64) -> Self {
        Self { rate, span: 3 }
    }

    pub fn span(mut self, steps: u32) -> Self {
        self.span = steps.max(1);
        self
    }

    /// Returns a copy of `design` where each parameter mutated with probability `rate`.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        design: &Design,
        specs: &[ParameterSpec],
        rng: &mut R,
    ) -> Design {
        let mut out = design.clone();
        for spec in specs {
            if rng.gen::<f64>() >= self.rate {
                continue;
            }
            let mutated = match out.get(&spec.name) {
                Some(current) => self.mutate_value(spec, current, rng),
                None => random_value(spec, rng),
            };
            out.insert(spec.name.clone(), mutated);
        }
        out
    }

    /// Continuous: moves by 1..=span steps in a random direction (reversed at a bound).
    /// Discrete: picks a uniformly random different option.
    pub fn mutate_value<R: Rng + ?Sized>(
        &self,
        spec: &ParameterSpec,
        current: &ParamValue,
        rng: &mut R,
    ) -> ParamValue {
        match &spec.kind {
            ParameterKind::Continuous { min, max, step } => {
                let x = match current.as_f64() {
                    Some(x) => quantize(*min, *max, *step, x),
                    None => return random_value(spec, rng),
                };
                let delta = rng.gen_range(1..=self.span) as f64 * step;
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

                let moved = quantize(*min, *max, *step, x + sign * delta);
                let value = if moved == x {
                    quantize(*min, *max, *step, x - sign * delta)
                } else {
                    moved
                };
                ParamValue::Number(value)
            }
            ParameterKind::Discrete { options } => {
                if options.len() < 2 {
                    return current.clone();
                }
                match options.iter().position(|o| o == current) {
                    Some(pos) => {
                        let mut idx = rng.gen_range(0..options.len() - 1);
                        if idx >= pos {
                            idx += 1;
                        }
                        options[idx].clone()
                    }
                    None => random_value(spec, rng),
                }
            }
        }
    }
}

/// Breeds one offspring design from two parents: crossover with probability
/// `crossover_rate` (otherwise a clone of `a`), then mutation.
pub fn breed<R: Rng + ?Sized>(
    a: &Design,
    b: &Design,
    specs: &[ParameterSpec],
    crossover_rate: f64,
    mutator: &Mutator,
    rng: &mut R,
) -> Design {
    let child = if rng.gen::<f64>() < crossover_rate {
        crossover(a, b, specs, rng)
    } else {
        a.clone()
    };
    mutator.apply(&child, specs, rng)
}
