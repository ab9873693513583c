use std::sync::Arc;

use anyhow::{bail, Context};
use sweep_runner::prelude::*;
use sweep_summary_model::append_sweep_summary;

fn main() -> anyhow::Result<()> {
    let cli = init();

    let config = resolve_config(&cli).context("Invalid sweep configuration")?;
    println!("{config}\n");

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let executor = Arc::new(Executor::new(ShutdownHandle::default())?);
    start_shutdown_listener(&executor);

    let exit_policy = config.exit_policy;
    let ledger_file = config.ledger_file.clone();

    let runner = ProcessRunner::new(executor.clone());
    let mut sweep = SweepExecutor::new(config, runner, executor.clone())?;
    let summary = sweep.run();

    print_sweep_report(&summary);

    if let Some(path) = ledger_file {
        if let Err(e) = append_sweep_summary(&summary, &path) {
            log::error!("Failed to write run ledger to {}: {e:?}", path.display());
        }
    }

    if executor.is_shutdown() {
        bail!("Sweep interrupted");
    }

    if exit_policy.should_fail(&summary) {
        bail!(
            "{} of {} cells did not succeed (exit policy: {:?})",
            summary.results.len() - summary.succeeded_count(),
            summary.results.len(),
            exit_policy
        );
    }

    Ok(())
}
