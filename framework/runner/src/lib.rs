mod auxiliary;
mod cli;
mod config;
mod error;
mod executor;
mod init;
mod partition;
mod progress;
mod report;
mod scenario;
mod shutdown;
mod sweep;
mod tool;
mod warmup;

pub mod prelude {
    pub use crate::cli::SweepCli;
    pub use crate::config::{resolve_config, ExitPolicy, SweepConfig};
    pub use crate::error::{
        AuxiliaryGenerationError, ConfigError, IdentitySpaceExhausted, RunInvocationError,
        UnknownScenarioError, WarmupError,
    };
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::partition::{UserIdPartitioner, UserIdRange, INITIAL_USER_ID};
    pub use crate::report::{print_sweep_report, render_sweep_report};
    pub use crate::scenario::{
        apps_manifest_path, artifact_path, expand_scenarios, is_known_tag, ArgSource,
        AuxiliaryData, ConfigField, RunRequest, ScenarioArg, ScenarioDescriptor,
        ScenarioRegistry, UserCount, ALL_SCENARIOS, ALL_TAG, SCENARIO_TAGS,
    };
    pub use crate::shutdown::start_shutdown_listener;
    pub use crate::sweep::{CellState, SweepExecutor};
    pub use crate::tool::{Invocation, ProcessRunner, ToolCommand, ToolRunner};
    pub use crate::warmup::{WarmupController, WarmupResult, WARMUP_USERS};
    pub use sweep_core::prelude::ShutdownHandle;
    pub use sweep_summary_model::{CellOutcome, RunResult, SweepSummary};
}
