use sweep_summary_model::SweepSummary;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct CellRow {
    scenario: String,
    qps: f64,
    outcome: &'static str,
    #[tabled(display = "float2")]
    duration_s: f64,
    artifact: String,
    reason: String,
}

fn float2(n: &f64) -> String {
    format!("{n:.2}")
}

/// Render the end-of-sweep table listing every cell and how it ended.
pub fn render_sweep_report(summary: &SweepSummary) -> String {
    let rows = summary
        .results
        .iter()
        .map(|result| CellRow {
            scenario: result.scenario.clone(),
            qps: result.qps,
            outcome: result.outcome.label(),
            duration_s: result.duration_ms as f64 / 1000.0,
            artifact: result.output_path.display().to_string(),
            reason: result.outcome.reason().unwrap_or_default().to_string(),
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(&rows);
    table.with(Style::modern());

    let executed = summary.succeeded_count() + summary.failed_count();
    format!(
        "Summary of sweep {}\n{}\nExecuted: {} ({} succeeded, {} failed), skipped: {}",
        summary.sweep_id,
        table,
        executed,
        summary.succeeded_count(),
        summary.failed_count(),
        summary.skipped_count()
    )
}

pub fn print_sweep_report(summary: &SweepSummary) {
    println!("\n{}", render_sweep_report(summary));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use sweep_summary_model::{CellOutcome, RunResult};

    #[test]
    fn report_lists_every_cell_and_counts() {
        let mut summary = SweepSummary::new("sweep-1".to_string(), "K".to_string(), 0);
        summary.record(RunResult {
            scenario: "short-input".to_string(),
            qps: 1.0,
            output_path: PathBuf::from("K_short-input_qps1.csv"),
            outcome: CellOutcome::Succeeded,
            duration_ms: 1500,
        });
        summary.record(RunResult {
            scenario: "medium".to_string(),
            qps: 1.0,
            output_path: PathBuf::from("K_medium_qps1.csv"),
            outcome: CellOutcome::Skipped {
                reason: "unknown scenario `medium`".to_string(),
            },
            duration_ms: 0,
        });

        let report = render_sweep_report(&summary);
        assert!(report.contains("K_short-input_qps1.csv"));
        assert!(report.contains("unknown scenario `medium`"));
        assert!(report.contains("1.50"));
        assert!(report.contains("Executed: 1 (1 succeeded, 0 failed), skipped: 1"));
    }
}
