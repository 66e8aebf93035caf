use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::domain::Metrics;
use crate::core::errors::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Maximize,
    Minimize,
}

/// How the single-objective search turns a metric into a scalar fitness.
/// Fitness is always "higher is better".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal", rename_all = "snake_case")]
pub enum Goal {
    Maximize { metric: String },
    Minimize { metric: String },
    /// Fitness is the negative absolute distance from `target`.
    Target { metric: String, target: f64 },
}

impl Goal {
    pub fn maximize(metric: &str) -> Self {
        Goal::Maximize { metric: metric.to_string() }
    }

    pub fn minimize(metric: &str) -> Self {
        Goal::Minimize { metric: metric.to_string() }
    }

    pub fn target(metric: &str, target: f64) -> Self {
        Goal::Target { metric: metric.to_string(), target }
    }

    pub fn metric(&self) -> &str {
        match self {
            Goal::Maximize { metric } | Goal::Minimize { metric } | Goal::Target { metric, .. } => {
                metric
            }
        }
    }

    /// Scalar fitness, or `None` when the metric is missing or not a number.
    pub fn fitness(&self, metrics: &Metrics) -> Option<f64> {
        let v = *metrics.get(self.metric())?;
        if v.is_nan() {
            return None;
        }
        Some(match self {
            Goal::Maximize { .. } => v,
            Goal::Minimize { .. } => -v,
            Goal::Target { target, .. } => -(v - target).abs(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.metric().trim().is_empty() {
            return Err(ConfigurationError::NoObjectives);
        }
        if let Goal::Target { metric, target } = self {
            if !target.is_finite() {
                return Err(ConfigurationError::InvalidTarget(metric.clone()));
            }
        }
        Ok(())
    }
}

/// One named objective of a multi-objective search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub direction: Direction,
}

impl Objective {
    pub fn maximize(name: &str) -> Self {
        Self { name: name.to_string(), direction: Direction::Maximize }
    }

    pub fn minimize(name: &str) -> Self {
        Self { name: name.to_string(), direction: Direction::Minimize }
    }

    /// Direction-adjusted value where larger is always better.
    /// A missing or NaN metric scores as the least favourable extreme.
    pub fn score(&self, metrics: &Metrics) -> f64 {
        match metrics.get(&self.name) {
            Some(v) if !v.is_nan() => match self.direction {
                Direction::Maximize => *v,
                Direction::Minimize => -*v,
            },
            _ => f64::NEG_INFINITY,
        }
    }
}

/// A Pareto search needs at least two distinct, named objectives.
pub fn validate_objectives(objectives: &[Objective]) -> Result<(), ConfigurationError> {
    match objectives.len() {
        0 => return Err(ConfigurationError::NoObjectives),
        1 => return Err(ConfigurationError::TooFewObjectives { count: 1 }),
        _ => {}
    }
    let mut seen = HashSet::new();
    for o in objectives {
        if o.name.trim().is_empty() {
            return Err(ConfigurationError::NoObjectives);
        }
        if !seen.insert(o.name.as_str()) {
            return Err(ConfigurationError::DuplicateObjective(o.name.clone()));
        }
    }
    Ok(())
}

// --- Constraints ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        const EPS: f64 = 1e-9;
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => (lhs - rhs).abs() <= EPS,
            Comparison::Ne => (lhs - rhs).abs() > EPS,
        }
    }
}

/// A relational bound on one metric, e.g. `ase < 10`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Constraint {
    pub metric: String,
    pub op: Comparison,
    pub bound: f64,
}

const CONSTRAINT_PATTERN: &str =
    r"^\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*(<=|>=|==|!=|<|>)\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*$";

/// Compiled once; `None` only if the pattern itself were invalid.
fn constraint_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(CONSTRAINT_PATTERN).ok()).as_ref()
}

impl Constraint {
    pub fn parse(expr: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidConstraint(expr.to_string());
        let caps = constraint_pattern()
            .and_then(|re| re.captures(expr))
            .ok_or_else(invalid)?;

        let op = match &caps[2] {
            "<" => Comparison::Lt,
            "<=" => Comparison::Le,
            ">" => Comparison::Gt,
            ">=" => Comparison::Ge,
            "==" => Comparison::Eq,
            "!=" => Comparison::Ne,
            _ => return Err(invalid()),
        };
        let bound: f64 = caps[3].parse().map_err(|_| invalid())?;

        Ok(Self { metric: caps[1].to_string(), op, bound })
    }

    /// `Some(true)` if satisfied, `Some(false)` if violated,
    /// `None` when the metric is absent (constraint not checked).
    pub fn check(&self, metrics: &Metrics) -> Option<bool> {
        let v = *metrics.get(&self.metric)?;
        Some(!v.is_nan() && self.op.holds(v, self.bound))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.op.symbol(), self.bound)
    }
}

impl FromStr for Constraint {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

impl TryFrom<String> for Constraint {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Constraint::parse(&s)
    }
}

impl From<Constraint> for String {
    fn from(c: Constraint) -> Self {
        c.to_string()
    }
}

/// True unless some constraint whose metric is present is violated.
pub fn is_feasible(constraints: &[Constraint], metrics: &Metrics) -> bool {
    constraints.iter().all(|c| c.check(metrics) != Some(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> Metrics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn constraint_pattern_compiles() {
        assert!(Regex::new(CONSTRAINT_PATTERN).is_ok());
        assert!(constraint_pattern().is_some());
    }

    #[test]
    fn parses_relational_expressions() {
        let c = Constraint::parse("ase < 10").unwrap();
        assert_eq!(c.metric, "ase");
        assert_eq!(c.op, Comparison::Lt);
        assert_eq!(c.bound, 10.0);

        let c: Constraint = "  sDA>=55.5 ".parse().unwrap();
        assert_eq!((c.op, c.bound), (Comparison::Ge, 55.5));

        let c = Constraint::parse("glare_index != -1e-3").unwrap();
        assert_eq!(c.bound, -0.001);

        assert!(Constraint::parse("ase <").is_err());
        assert!(Constraint::parse("< 10").is_err());
        assert!(Constraint::parse("ase ~ 10").is_err());
    }

    #[test]
    fn missing_metric_is_not_checked() {
        let c = Constraint::parse("ase < 10").unwrap();
        assert_eq!(c.check(&metrics(&[("ase", 5.0)])), Some(true));
        assert_eq!(c.check(&metrics(&[("ase", 15.0)])), Some(false));
        assert_eq!(c.check(&metrics(&[("sda", 15.0)])), None);
        assert!(is_feasible(&[c], &metrics(&[("sda", 1.0)])));
    }

    #[test]
    fn constraint_serializes_as_expression() {
        let c = Constraint::parse("ase <= 10").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"ase <= 10\"");
        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn goal_fitness_orientation() {
        let m = metrics(&[("depth", 1.3)]);
        assert_eq!(Goal::maximize("depth").fitness(&m), Some(1.3));
        assert_eq!(Goal::minimize("depth").fitness(&m), Some(-1.3));
        let t = Goal::target("depth", 1.0).fitness(&m).unwrap();
        assert!((t + 0.3).abs() < 1e-12);
        assert_eq!(Goal::maximize("sda").fitness(&m), None);
    }

    #[test]
    fn duplicate_objectives_rejected() {
        let objs = vec![Objective::maximize("sda"), Objective::minimize("sda")];
        assert_eq!(
            validate_objectives(&objs),
            Err(ConfigurationError::DuplicateObjective("sda".into()))
        );
        assert_eq!(validate_objectives(&[]), Err(ConfigurationError::NoObjectives));
        assert_eq!(
            validate_objectives(&[Objective::maximize("sda")]),
            Err(ConfigurationError::TooFewObjectives { count: 1 })
        );
    }
}
