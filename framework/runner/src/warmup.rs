use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::config::SweepConfig;
use crate::error::WarmupError;
use crate::partition::UserIdRange;
use crate::scenario::{ScenarioDescriptor, SHORT_HISTORY_LEN};
use crate::tool::{Invocation, ToolRunner};

pub const WARMUP_USERS: u64 = 2;
pub const WARMUP_ROUNDS: u64 = 2;
pub const WARMUP_QPS: f64 = 0.5;
pub const WARMUP_DURATION: Duration = Duration::from_secs(20);

pub type WarmupResult = Result<(), WarmupError>;

/// Issues a short, low intensity run before a measured run to prime server side caches.
///
/// Warmup output is written to a scratch directory that is removed with the controller.
pub struct WarmupController {
    scratch: tempfile::TempDir,
}

impl WarmupController {
    pub fn new() -> anyhow::Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("qa-sweep-warmup")
            .tempdir()
            .context("Failed to create warmup scratch directory")?;
        Ok(Self { scratch })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// The warmup call for a scenario. `user_ids` must not overlap the measured run's ids.
    pub fn invocation(
        &self,
        config: &SweepConfig,
        descriptor: &ScenarioDescriptor,
        user_ids: UserIdRange,
        apps_file: Option<&Path>,
    ) -> Invocation {
        let output: PathBuf = self
            .scratch
            .path()
            .join(format!("warmup_{}_{}.csv", descriptor.name, user_ids.start));

        let mut args = vec![
            "--model".to_string(),
            config.model.clone(),
            "--base-url".to_string(),
            config.base_url.clone(),
            "--num-users".to_string(),
            user_ids.len.to_string(),
            "--num-rounds".to_string(),
            WARMUP_ROUNDS.to_string(),
            "--qps".to_string(),
            WARMUP_QPS.to_string(),
            "--shared-system-prompt".to_string(),
            config.system_prompt_len.to_string(),
            "--user-history-prompt".to_string(),
            SHORT_HISTORY_LEN.to_string(),
            "--answer-len".to_string(),
            config.answer_len.to_string(),
            "--init-user-id".to_string(),
            user_ids.start.to_string(),
            "--time".to_string(),
            WARMUP_DURATION.as_secs().to_string(),
            "--output".to_string(),
            output.display().to_string(),
        ];

        if let Some(apps_file) = apps_file {
            args.extend([
                "--apps-file".to_string(),
                apps_file.display().to_string(),
                "--users-per-app".to_string(),
                config.users_per_app.to_string(),
            ]);
        }
        if config.request_with_user_id {
            args.push("--request-with-user-id".to_string());
        }

        Invocation {
            label: format!("{} warmup", descriptor.name),
            command: config.load_generator.clone(),
            args,
            timeout: config.run_timeout,
        }
    }

    pub fn warmup(
        &self,
        runner: &mut dyn ToolRunner,
        config: &SweepConfig,
        descriptor: &ScenarioDescriptor,
        user_ids: UserIdRange,
        apps_file: Option<&Path>,
    ) -> WarmupResult {
        log::info!(
            "Warming up for {} with user ids from {}",
            descriptor.name,
            user_ids.start
        );
        runner.run(&self.invocation(config, descriptor, user_ids, apps_file))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SweepCli;
    use crate::config::resolve_config;
    use crate::scenario::ScenarioRegistry;

    #[test]
    fn warmup_is_small_and_uses_its_own_ids() {
        let config = resolve_config(&SweepCli {
            model: Some("M".to_string()),
            base_url: Some("U".to_string()),
            save_file_key: Some("K".to_string()),
            ..Default::default()
        })
        .unwrap();
        let registry = ScenarioRegistry::builtin();
        let controller = WarmupController::new().unwrap();

        let invocation = controller.invocation(
            &config,
            registry.resolve("long-input").unwrap(),
            UserIdRange {
                start: 100,
                len: WARMUP_USERS,
            },
            None,
        );

        let value = |flag: &str| {
            let i = invocation.args.iter().position(|a| a == flag).unwrap();
            invocation.args[i + 1].clone()
        };
        assert_eq!(value("--num-users"), "2");
        assert_eq!(value("--qps"), "0.5");
        assert_eq!(value("--init-user-id"), "100");
        assert_eq!(value("--time"), "20");
        assert!(PathBuf::from(value("--output")).starts_with(controller.scratch_dir()));
    }
}
