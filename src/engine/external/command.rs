use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::domain::{Design, Metrics};
use crate::core::errors::EvaluationError;
use crate::engine::evaluator::Evaluator;

/// Runs an external program once per design.
/// The design is streamed as a JSON object on stdin; the program prints a flat JSON object
/// of numeric metrics (e.g. `{"sda": 71.2, "ase": 4.0}`) as its last stdout line.
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandEvaluator {
    /// # Arguments
    /// * `program` - Path to the simulation wrapper (e.g., "./simulate.sh").
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Evaluations running longer than `limit` are killed and count as failed.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Executes the program via stdin/stdout piping.
    async fn run_process(&self, input_data: &str) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input_data.as_bytes())
                .await
                .context("Failed to write design to stdin")?;
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| anyhow!("'{}' timed out after {:?}", self.program, limit))?,
            None => child.wait_with_output().await,
        }
        .context("Failed to read process output")?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            bail!("'{}' exited with {}: {}", self.program, output.status, err_msg.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn evaluate_design(&self, design: &Design) -> Result<Metrics, EvaluationError> {
        let input = serde_json::to_string(design).context("Failed to encode design")?;
        let output = self.run_process(&input).await?;
        Ok(parse_metrics(&output)?)
    }
}

/// Parses the last non-empty stdout line as a JSON object, keeping its numeric fields.
pub fn parse_metrics(output: &str) -> Result<Metrics> {
    let line = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| anyhow!("No metrics printed"))?;

    let value: Value = serde_json::from_str(line).context("Metrics line is not JSON")?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("Metrics must be a JSON object"))?;

    let metrics: Metrics = object
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
        .collect();

    if metrics.is_empty() {
        bail!("Metrics object has no numeric fields");
    }
    Ok(metrics)
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, design: &Design) -> impl Future<Output = Result<Metrics, EvaluationError>> {
        self.evaluate_design(design)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
