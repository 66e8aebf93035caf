use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::codec::decimals_for;
use crate::core::errors::ConfigurationError;

// --- Constants ---
/// Largest number of parameters a single search may span.
pub const MAX_PARAMETERS: usize = 16;

// --- Values ---

/// A single parameter value. Continuous parameters always hold `Number`;
/// discrete options may be numeric (e.g. slat counts) or textual (e.g. material ids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// A complete assignment of values to all active parameters, keyed by parameter name.
/// `BTreeMap` keeps iteration in lexicographic name order.
pub type Design = BTreeMap<String, ParamValue>;

/// Raw numeric outputs of one evaluation, keyed by metric name (e.g. `sda`, `ase`).
pub type Metrics = BTreeMap<String, f64>;

// --- Parameter Specs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Values are `min + k * step`, clamped to `[min, max]`.
    Continuous { min: f64, max: f64, step: f64 },
    /// Values are members of an ordered option set.
    Discrete { options: Vec<ParamValue> },
}

/// Declares one dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl ParameterSpec {
    pub fn continuous(name: &str, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Continuous { min, max, step },
        }
    }

    pub fn discrete<V: Into<ParamValue>>(name: &str, options: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Discrete {
                options: options.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, ParameterKind::Continuous { .. })
    }

    /// Checks the parameter's own invariants (`min < max`, `step > 0` and representable,
    /// non-empty distinct options).
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyParameterName);
        }

        match &self.kind {
            ParameterKind::Continuous { min, max, step } => {
                let invalid = |reason: &str| ConfigurationError::InvalidContinuous {
                    name: self.name.clone(),
                    reason: reason.to_string(),
                };
                if !(min.is_finite() && max.is_finite() && step.is_finite()) {
                    return Err(invalid("bounds and step must be finite"));
                }
                if min >= max {
                    return Err(invalid("min must be smaller than max"));
                }
                if *step <= 0.0 {
                    return Err(invalid("step must be positive"));
                }
                if *step > max - min {
                    return Err(invalid("step is larger than the range"));
                }
                if decimals_for(*min, *step).is_none() {
                    return Err(invalid("step is too fine for a fixed-precision grid"));
                }
                Ok(())
            }
            ParameterKind::Discrete { options } => {
                if options.is_empty() {
                    return Err(ConfigurationError::EmptyOptions(self.name.clone()));
                }
                if let Some(dup) = options.iter().enumerate().find_map(|(i, o)| {
                    options[..i].contains(o).then_some(o)
                }) {
                    return Err(ConfigurationError::DuplicateOption {
                        name: self.name.clone(),
                        option: dup.to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Validates a full parameter set: count limits, per-spec invariants and unique names.
pub fn validate_specs(specs: &[ParameterSpec]) -> Result<(), ConfigurationError> {
    if specs.is_empty() {
        return Err(ConfigurationError::NoParameters);
    }
    if specs.len() > MAX_PARAMETERS {
        return Err(ConfigurationError::TooManyParameters {
            count: specs.len(),
            max: MAX_PARAMETERS,
        });
    }

    let mut seen = HashSet::new();
    for spec in specs {
        spec.validate()?;
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigurationError::DuplicateParameter(spec.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        let spec = ParameterSpec::continuous("depth", 2.0, 0.1, 0.1);
        assert!(matches!(
            spec.validate(),
            Err(ConfigurationError::InvalidContinuous { .. })
        ));
    }

    #[test]
    fn rejects_empty_options() {
        let spec = ParameterSpec::discrete::<&str>("material", []);
        assert_eq!(
            spec.validate(),
            Err(ConfigurationError::EmptyOptions("material".into()))
        );
    }

    #[test]
    fn rejects_unrepresentable_steps_and_repeated_options() {
        let spec = ParameterSpec::continuous("gap", 0.0, 1e-9, 3e-11);
        assert!(matches!(
            spec.validate(),
            Err(ConfigurationError::InvalidContinuous { .. })
        ));
        assert_eq!(ParameterSpec::continuous("gap", 0.0, 1e-9, 1e-10).validate(), Ok(()));

        let spec = ParameterSpec::discrete("material", ["wood", "metal", "wood"]);
        assert_eq!(
            spec.validate(),
            Err(ConfigurationError::DuplicateOption {
                name: "material".into(),
                option: "wood".into()
            })
        );
    }

    #[test]
    fn rejects_too_many_and_duplicates() {
        let many: Vec<_> = (0..=MAX_PARAMETERS)
            .map(|i| ParameterSpec::continuous(&format!("p{}", i), 0.0, 1.0, 0.1))
            .collect();
        assert!(matches!(
            validate_specs(&many),
            Err(ConfigurationError::TooManyParameters { .. })
        ));

        let dup = vec![
            ParameterSpec::continuous("depth", 0.0, 1.0, 0.1),
            ParameterSpec::discrete("depth", ["a", "b"]),
        ];
        assert_eq!(
            validate_specs(&dup),
            Err(ConfigurationError::DuplicateParameter("depth".into()))
        );
        assert_eq!(validate_specs(&[]), Err(ConfigurationError::NoParameters));
    }

    #[test]
    fn spec_json_shape() {
        let json = r#"{"name":"depth","kind":"continuous","min":0.1,"max":2.0,"step":0.1}"#;
        let spec: ParameterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec, ParameterSpec::continuous("depth", 0.1, 2.0, 0.1));

        let json = r#"{"name":"material","kind":"discrete","options":["wood",3.0]}"#;
        let spec: ParameterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            spec.kind,
            ParameterKind::Discrete {
                options: vec![ParamValue::Text("wood".into()), ParamValue::Number(3.0)]
            }
        );
    }
}
