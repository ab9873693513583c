use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

/// How a single (scenario, QPS) cell of the sweep ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CellOutcome {
    /// The measured run completed and the load generator exited successfully.
    Succeeded,
    /// The measured run was started but did not complete successfully.
    Failed { reason: String },
    /// The measured run was never started, for example because the scenario tag is unknown or
    /// auxiliary data could not be generated.
    Skipped { reason: String },
}

impl CellOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CellOutcome::Succeeded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CellOutcome::Succeeded => "succeeded",
            CellOutcome::Failed { .. } => "failed",
            CellOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CellOutcome::Succeeded => None,
            CellOutcome::Failed { reason } | CellOutcome::Skipped { reason } => Some(reason),
        }
    }
}

/// Result of one cell of the sweep matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    /// The scenario tag as requested, which may not be a known scenario.
    pub scenario: String,
    /// Target request rate for the measured run.
    pub qps: f64,
    /// Where the load generator was asked to write its CSV.
    ///
    /// Set even when the run was skipped, so that the report can show which artifact is missing.
    pub output_path: PathBuf,
    pub outcome: CellOutcome,
    /// Wall-clock time spent on the cell, in milliseconds, excluding the drain interval.
    pub duration_ms: u64,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }
}

/// The run ledger for one invocation of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepSummary {
    /// Unique id chosen when the sweep starts.
    pub sweep_id: String,
    /// The prefix used to name artifacts.
    pub output_key: String,
    /// Unix timestamp in seconds.
    pub started_at: i64,
    /// One entry per scheduled cell, in execution order.
    pub results: Vec<RunResult>,
}

impl SweepSummary {
    pub fn new(sweep_id: String, output_key: String, started_at: i64) -> Self {
        Self {
            sweep_id,
            output_key,
            started_at,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, result: RunResult) {
        self.results.push(result);
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, CellOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, CellOutcome::Skipped { .. }))
            .count()
    }

    /// Scenario tags in the order they first appear in the ledger.
    pub fn scenarios(&self) -> Vec<&str> {
        self.results
            .iter()
            .map(|r| r.scenario.as_str())
            .unique()
            .collect()
    }
}

/// Append the sweep summary to a file as a single JSON line.
pub fn append_sweep_summary(summary: &SweepSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_sweep_summary(summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the sweep summary to a writer
pub fn store_sweep_summary<W: Write>(summary: &SweepSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, summary)?;
    Ok(())
}

/// Load a single sweep summary from a reader
pub fn load_sweep_summary<R: Read>(reader: R) -> anyhow::Result<SweepSummary> {
    let reader = std::io::BufReader::new(reader);
    let summary: SweepSummary = serde_json::from_reader(reader)?;
    Ok(summary)
}

/// Load every sweep summary from a file written by [append_sweep_summary].
pub fn load_sweep_summaries(path: &Path) -> anyhow::Result<Vec<SweepSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut summaries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summaries.push(serde_json::from_str(&line)?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(scenario: &str, qps: f64, outcome: CellOutcome) -> RunResult {
        RunResult {
            scenario: scenario.to_string(),
            qps,
            output_path: PathBuf::from(format!("K_{scenario}_qps{qps}.csv")),
            outcome,
            duration_ms: 10,
        }
    }

    fn sample_summary() -> SweepSummary {
        let mut summary = SweepSummary::new("abc".to_string(), "K".to_string(), 1_700_000_000);
        summary.record(result("short-input", 1.0, CellOutcome::Succeeded));
        summary.record(result(
            "short-input",
            2.0,
            CellOutcome::Failed {
                reason: "exit status 1".to_string(),
            },
        ));
        summary.record(result(
            "apps",
            1.0,
            CellOutcome::Skipped {
                reason: "generator failed".to_string(),
            },
        ));
        summary
    }

    #[test]
    fn counts_outcomes() {
        let summary = sample_summary();
        assert_eq!(summary.succeeded_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.scenarios(), vec!["short-input", "apps"]);
    }

    #[test]
    fn appended_summaries_can_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let first = sample_summary();
        let mut second = sample_summary();
        second.sweep_id = "def".to_string();

        append_sweep_summary(&first, &path).unwrap();
        append_sweep_summary(&second, &path).unwrap();

        let loaded = load_sweep_summaries(&path).unwrap();
        assert_eq!(loaded, vec![first, second]);
    }

    #[test]
    fn outcome_is_tagged_in_json() {
        let mut buf = Vec::new();
        store_sweep_summary(&sample_summary(), &mut buf).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["results"][1]["outcome"]["status"], "failed");
        assert_eq!(value["results"][1]["outcome"]["reason"], "exit status 1");

        let loaded = load_sweep_summary(buf.as_slice()).unwrap();
        assert_eq!(loaded, sample_summary());
    }
}
