use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use itertools::Itertools;
use sweep_summary_model::{CellOutcome, RunResult, SweepSummary};

use crate::auxiliary;
use crate::config::SweepConfig;
use crate::executor::Executor;
use crate::partition::UserIdPartitioner;
use crate::progress::RunProgress;
use crate::scenario::{
    apps_manifest_path, artifact_path, RunRequest, ScenarioDescriptor, ScenarioRegistry,
};
use crate::tool::{Invocation, ToolRunner};
use crate::warmup::{WarmupController, WARMUP_USERS};

/// Lifecycle of one (scenario, QPS) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Pending,
    GeneratingAuxiliaryData,
    Warming,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellState::Pending => "pending",
            CellState::GeneratingAuxiliaryData => "generating auxiliary data",
            CellState::Warming => "warming",
            CellState::Running => "running",
            CellState::Completed => "completed",
            CellState::Failed => "failed",
            CellState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

struct CellTracker {
    name: String,
    state: CellState,
}

impl CellTracker {
    fn new(name: String) -> Self {
        log::debug!("{name}: {}", CellState::Pending);
        Self {
            name,
            state: CellState::Pending,
        }
    }

    fn enter(&mut self, next: CellState) {
        log::debug!("{}: {} -> {}", self.name, self.state, next);
        self.state = next;
    }
}

const INTERRUPTED: &str = "sweep interrupted";

/// Runs every (scenario, QPS) cell of the sweep in order, one at a time.
///
/// A failing cell never stops the sweep. Only a shutdown signal does, in which case every cell
/// that has not started yet is recorded as skipped.
pub struct SweepExecutor<R: ToolRunner> {
    config: SweepConfig,
    registry: ScenarioRegistry,
    partitioner: UserIdPartitioner,
    warmup: Option<WarmupController>,
    runner: R,
    executor: Arc<Executor>,
}

impl<R: ToolRunner> SweepExecutor<R> {
    pub fn new(config: SweepConfig, runner: R, executor: Arc<Executor>) -> anyhow::Result<Self> {
        let warmup = if config.warmup {
            Some(WarmupController::new()?)
        } else {
            None
        };

        Ok(Self {
            config,
            registry: ScenarioRegistry::builtin(),
            partitioner: UserIdPartitioner::new(),
            warmup,
            runner,
            executor,
        })
    }

    pub fn with_registry(mut self, registry: ScenarioRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn partitioner(&self) -> &UserIdPartitioner {
        &self.partitioner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Execute the full matrix and return the run ledger, with one entry per scheduled cell.
    pub fn run(&mut self) -> SweepSummary {
        let mut summary = SweepSummary::new(
            nanoid::nanoid!(),
            self.config.output_key.clone(),
            chrono::Utc::now().timestamp(),
        );

        let cells = self
            .config
            .scenarios
            .iter()
            .cloned()
            .cartesian_product(self.config.qps_values.iter().copied())
            .collect::<Vec<_>>();
        let total = cells.len();

        log::info!(
            "Starting sweep {} with {} cells ({} scenarios x {} QPS values)",
            summary.sweep_id,
            total,
            self.config.scenarios.len(),
            self.config.qps_values.len()
        );

        for (index, (tag, qps)) in cells.into_iter().enumerate() {
            let output_path =
                artifact_path(&self.config.output_dir, &self.config.output_key, &tag, qps);
            let started = Instant::now();

            let (outcome, measured) = if self.executor.is_shutdown() {
                (skipped(INTERRUPTED), false)
            } else {
                match self.registry.resolve(&tag) {
                    Ok(descriptor) => {
                        let descriptor = descriptor.clone();
                        self.run_cell(&descriptor, qps, &output_path)
                    }
                    Err(e) => {
                        log::error!("Skipping {tag}@qps{qps}: {e}");
                        (skipped(e.to_string()), false)
                    }
                }
            };

            summary.record(RunResult {
                scenario: tag,
                qps,
                output_path,
                outcome,
                duration_ms: started.elapsed().as_millis() as u64,
            });

            if measured && index + 1 < total && !self.executor.is_shutdown() {
                log::info!("Draining for {:?} before the next cell", self.config.drain);
                if self.executor.pause(self.config.drain).is_err() {
                    log::warn!("Drain interrupted by shutdown signal");
                }
            }
        }

        log::info!(
            "Sweep {} finished: {} succeeded, {} failed, {} skipped",
            summary.sweep_id,
            summary.succeeded_count(),
            summary.failed_count(),
            summary.skipped_count()
        );

        summary
    }

    /// Returns the outcome and whether a measured run was started.
    fn run_cell(
        &mut self,
        descriptor: &ScenarioDescriptor,
        qps: f64,
        output_path: &Path,
    ) -> (CellOutcome, bool) {
        let mut cell = CellTracker::new(format!("{}@qps{}", descriptor.name, qps));

        let user_ids = match self.partitioner.allocate(descriptor.users(&self.config)) {
            Ok(user_ids) => user_ids,
            Err(e) => {
                log::error!("{}: skipping measured run, {e}", cell.name);
                cell.enter(CellState::Skipped);
                return (skipped(e.to_string()), false);
            }
        };

        let apps_file = match descriptor.auxiliary {
            Some(data) => {
                cell.enter(CellState::GeneratingAuxiliaryData);
                let manifest =
                    apps_manifest_path(&self.config.output_dir, &self.config.output_key, qps);
                match auxiliary::generate(&mut self.runner, data, &self.config, manifest, &cell.name)
                {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::error!("{}: skipping measured run, {e}", cell.name);
                        cell.enter(CellState::Skipped);
                        return (skipped(e.to_string()), false);
                    }
                }
            }
            None => None,
        };

        if let Some(warmup) = self.warmup.as_ref().filter(|_| descriptor.warmup) {
            if self.executor.is_shutdown() {
                cell.enter(CellState::Skipped);
                return (skipped(INTERRUPTED), false);
            }

            cell.enter(CellState::Warming);
            let result = match self.partitioner.allocate(WARMUP_USERS) {
                Ok(warmup_ids) => warmup
                    .warmup(
                        &mut self.runner,
                        &self.config,
                        descriptor,
                        warmup_ids,
                        apps_file.as_deref(),
                    )
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = result {
                log::warn!("{}: {e}, continuing with the measured run", cell.name);
            }
        }

        if self.executor.is_shutdown() {
            cell.enter(CellState::Skipped);
            return (skipped(INTERRUPTED), false);
        }

        cell.enter(CellState::Running);
        let request = RunRequest {
            scenario: descriptor.name.to_string(),
            qps,
            user_ids,
        };
        let invocation = Invocation {
            label: format!("{} measured run", cell.name),
            command: self.config.load_generator.clone(),
            args: descriptor.measured_args(
                &self.config,
                &request,
                output_path,
                apps_file.as_deref(),
            ),
            timeout: self.config.run_timeout,
        };

        let progress = (!self.config.no_progress && self.config.duration_seconds > 0).then(|| {
            RunProgress::start(
                cell.name.clone(),
                Duration::from_secs(self.config.duration_seconds),
            )
        });
        let result = self.runner.run(&invocation);
        drop(progress);

        match result {
            Ok(()) => {
                cell.enter(CellState::Completed);
                if !output_path.exists() {
                    log::warn!(
                        "{}: load generator succeeded but {} is missing",
                        cell.name,
                        output_path.display()
                    );
                }
                (CellOutcome::Succeeded, true)
            }
            Err(e) => {
                log::error!("{}: measured run failed, {e}", cell.name);
                cell.enter(CellState::Failed);
                (
                    CellOutcome::Failed {
                        reason: e.to_string(),
                    },
                    true,
                )
            }
        }
    }
}

fn skipped(reason: impl Into<String>) -> CellOutcome {
    CellOutcome::Skipped {
        reason: reason.into(),
    }
}
