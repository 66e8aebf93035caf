use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::domain::{validate_specs, Design, ParamValue, ParameterKind, ParameterSpec};
use crate::core::errors::ConfigurationError;

/// Upper bound on the fixed decimal precision used for continuous values.
const MAX_DECIMALS: usize = 10;

/// Canonical, order-independent encoding of a design. Used as the fitness cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of decimals needed to represent every `min + k * step` exactly, or `None` when
/// the grid needs more than `MAX_DECIMALS`.
///
/// At the chosen precision the step is a whole number of units (at least one), so distinct
/// grid points never format alike.
pub fn decimals_for(min: f64, step: f64) -> Option<usize> {
    let is_whole = |x: f64| (x - x.round()).abs() <= 1e-6;
    (0..=MAX_DECIMALS).find(|&d| {
        let scale = 10f64.powi(d as i32);
        let units = step * scale;
        units.round() >= 1.0 && is_whole(units) && is_whole(min * scale)
    })
}

/// The `k`-th grid point, rounded to the grid's precision when it has one.
fn grid_point(min: f64, step: f64, k: f64) -> f64 {
    let v = min + k * step;
    match decimals_for(min, step) {
        Some(d) => round_to(v, d),
        None => v,
    }
}

fn round_to(x: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let v = (x * scale).round() / scale;
    // Normalise -0.0 so it formats like 0.0.
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Highest step index `k` such that `min + k * step <= max`.
fn max_steps(min: f64, max: f64, step: f64) -> u64 {
    ((max - min) / step + 1e-9).floor().max(0.0) as u64
}

/// Clamps `raw` to `[min, max]` and snaps it to the nearest `min + k * step`.
///
/// Idempotent: `quantize(quantize(x)) == quantize(x)`. NaN maps to `min`.
pub fn quantize(min: f64, max: f64, step: f64, raw: f64) -> f64 {
    let raw = if raw.is_nan() { min } else { raw.clamp(min, max) };
    let top = max_steps(min, max, step) as f64;
    let k = ((raw - min) / step).round().clamp(0.0, top);
    grid_point(min, step, k)
}

/// Draws a uniformly random legal value for `spec`.
pub fn random_value<R: Rng + ?Sized>(spec: &ParameterSpec, rng: &mut R) -> ParamValue {
    match &spec.kind {
        ParameterKind::Continuous { min, max, step } => {
            let k = rng.gen_range(0..=max_steps(*min, *max, *step));
            ParamValue::Number(grid_point(*min, *step, k as f64))
        }
        ParameterKind::Discrete { options } => options[rng.gen_range(0..options.len())].clone(),
    }
}

/// Converts designs to canonical signatures and checks them against the parameter specs.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignCodec {
    specs: Vec<ParameterSpec>,
}

impl DesignCodec {
    /// Validates the parameter set once; the codec is immutable afterwards.
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self, ConfigurationError> {
        validate_specs(&specs)?;
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// A fresh design with every parameter drawn uniformly at random.
    pub fn random_design<R: Rng + ?Sized>(&self, rng: &mut R) -> Design {
        self.specs
            .iter()
            .map(|spec| (spec.name.clone(), random_value(spec, rng)))
            .collect()
    }

    /// `name=value` pairs in lexicographic name order, joined by `;`.
    /// Continuous values use a fixed precision derived from the parameter's step, so designs that
    /// differ only by floating-point noise share a signature.
    pub fn signature(&self, design: &Design) -> Signature {
        let parts: Vec<String> = design
            .iter()
            .map(|(name, value)| format!("{}={}", name, self.encode(name, value)))
            .collect();
        Signature(parts.join(";"))
    }

    fn encode(&self, name: &str, value: &ParamValue) -> String {
        match (self.spec(name).map(|s| &s.kind), value) {
            (Some(ParameterKind::Continuous { min, max, step }), ParamValue::Number(v)) => {
                let q = quantize(*min, *max, *step, *v);
                match decimals_for(*min, *step) {
                    Some(decimals) => format!("{:.*}", decimals, q),
                    None => format!("{:e}", q),
                }
            }
            (_, ParamValue::Number(v)) => format!("{}", if *v == 0.0 { 0.0 } else { *v }),
            (_, ParamValue::Text(s)) => {
                serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
            }
        }
    }

    /// Checks that `design` assigns exactly the configured parameters, with quantized
    /// continuous values and discrete values drawn from their options.
    pub fn validate(&self, design: &Design) -> Result<(), String> {
        if design.len() != self.specs.len() {
            return Err(format!(
                "design has {} values, expected {}",
                design.len(),
                self.specs.len()
            ));
        }

        for spec in &self.specs {
            let value = design
                .get(&spec.name)
                .ok_or_else(|| format!("missing value for '{}'", spec.name))?;

            match (&spec.kind, value) {
                (ParameterKind::Continuous { min, max, step }, ParamValue::Number(v)) => {
                    let q = quantize(*min, *max, *step, *v);
                    if (q - v).abs() > 1e-9 * v.abs().max(1.0) {
                        return Err(format!("'{}' = {} is not on the step grid", spec.name, v));
                    }
                }
                (ParameterKind::Continuous { .. }, ParamValue::Text(t)) => {
                    return Err(format!("'{}' expects a number, got '{}'", spec.name, t));
                }
                (ParameterKind::Discrete { options }, v) => {
                    if !options.contains(v) {
                        return Err(format!("'{}' = {} is not an option", spec.name, v));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn codec() -> DesignCodec {
        DesignCodec::new(vec![
            ParameterSpec::continuous("depth", 0.1, 2.0, 0.1),
            ParameterSpec::continuous("angle", -45.0, 45.0, 2.5),
            ParameterSpec::discrete("material", ["wood", "aluminium", "glass"]),
        ])
        .unwrap()
    }

    #[test]
    fn quantize_snaps_clamps_and_is_idempotent() {
        let cases = [
            (0.1, 2.0, 0.1),
            (-45.0, 45.0, 2.5),
            (0.0, 1.0, 0.4),
            (0.05, 0.95, 0.15),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for (min, max, step) in cases {
            for _ in 0..500 {
                let raw: f64 = rng.gen_range(min - 5.0..max + 5.0);
                let q = quantize(min, max, step, raw);
                assert!(q >= min - 1e-12 && q <= max + 1e-12, "{} out of range", q);

                let k = (q - min) / step;
                assert!((k - k.round()).abs() < 1e-6, "{} not on grid", q);
                assert_eq!(quantize(min, max, step, q), q);
            }
        }
    }

    #[test]
    fn quantize_never_exceeds_max_when_range_is_not_a_step_multiple() {
        assert_eq!(quantize(0.0, 1.0, 0.4, 1.0), 0.8);
        assert_eq!(quantize(0.0, 1.0, 0.4, 0.61), 0.8);
        assert_eq!(quantize(0.1, 2.0, 0.1, f64::NAN), 0.1);
    }

    #[test]
    fn signature_ignores_float_noise_and_insertion_order() {
        let codec = codec();

        let mut a = Design::new();
        a.insert("material".into(), "glass".into());
        a.insert("depth".into(), 1.0.into());
        a.insert("angle".into(), 12.5.into());

        let mut b = Design::new();
        b.insert("angle".into(), (12.5 + 1e-12).into());
        b.insert("depth".into(), (0.1 + 0.9 - 1e-13).into());
        b.insert("material".into(), "glass".into());

        assert_eq!(codec.signature(&a), codec.signature(&b));
        assert_eq!(
            codec.signature(&a).as_str(),
            "angle=12.5;depth=1.0;material=\"glass\""
        );
    }

    #[test]
    fn random_designs_are_valid() {
        let codec = codec();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let d = codec.random_design(&mut rng);
            assert_eq!(codec.validate(&d), Ok(()));
        }
    }

    #[test]
    fn validate_rejects_off_grid_and_unknown_options() {
        let codec = codec();
        let mut d = codec.random_design(&mut ChaCha8Rng::seed_from_u64(1));
        d.insert("depth".into(), 1.05.into());
        assert!(codec.validate(&d).is_err());

        let mut d = codec.random_design(&mut ChaCha8Rng::seed_from_u64(1));
        d.insert("material".into(), "concrete".into());
        assert!(codec.validate(&d).is_err());
    }

    #[test]
    fn tiny_steps_stay_on_their_grid() {
        assert_eq!(quantize(0.0, 1e-9, 1e-10, 3.4e-10), 3e-10);

        // Too fine for a fixed precision: still snapped to the grid, never to zero.
        let q = quantize(0.0, 1e-9, 3e-11, 6e-10);
        assert!((q - 6e-10).abs() < 1e-20, "{:e}", q);

        let codec = DesignCodec::new(vec![ParameterSpec::continuous("gap", 0.0, 1e-9, 1e-10)])
            .unwrap();
        let design = |v: f64| Design::from([("gap".to_string(), ParamValue::Number(v))]);
        assert_ne!(codec.signature(&design(3e-10)), codec.signature(&design(4e-10)));
    }

    #[test]
    fn decimals_follow_step_magnitude() {
        assert_eq!(decimals_for(0.1, 0.1), Some(1));
        assert_eq!(decimals_for(0.0, 0.25), Some(2));
        assert_eq!(decimals_for(-45.0, 2.5), Some(1));
        assert_eq!(decimals_for(0.0, 5.0), Some(0));
        assert_eq!(decimals_for(0.0, 1e-10), Some(10));
        assert_eq!(decimals_for(0.0, 3e-11), None);
    }
}
