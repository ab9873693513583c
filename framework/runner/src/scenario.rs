use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::config::SweepConfig;
use crate::error::UnknownScenarioError;
use crate::partition::UserIdRange;

/// Expands to [ALL_SCENARIOS]. Not a scenario itself.
pub const ALL_TAG: &str = "all";

/// What `all` expands to. `apps` is left out because it needs a generated manifest and a
/// different parameter shape, so it has to be asked for by name.
pub const ALL_SCENARIOS: &[&str] = &["sharegpt", "short-input", "long-input"];

/// Every tag recognised on the command line, including `all`.
pub const SCENARIO_TAGS: &[&str] = &[
    "sharegpt",
    "short-input",
    "long-input",
    "long-long",
    "apps",
    ALL_TAG,
];

/// User history length of the short-input scenario, in tokens.
pub const SHORT_HISTORY_LEN: &str = "256";

/// Answer length of the long-long scenario, in tokens.
pub const LONG_ANSWER_LEN: &str = "1000";

pub fn is_known_tag(tag: &str) -> bool {
    SCENARIO_TAGS.contains(&tag)
}

/// Expand `all` in place and drop repeated tags, keeping first occurrences in order.
pub fn expand_scenarios(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|tag| {
            if tag == ALL_TAG {
                ALL_SCENARIOS.iter().map(|s| s.to_string()).collect::<Vec<_>>()
            } else {
                vec![tag.clone()]
            }
        })
        .unique()
        .collect()
}

/// A [SweepConfig] value that a scenario forwards to the load generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Model,
    BaseUrl,
    NumRounds,
    SystemPromptLen,
    ChatHistoryLen,
    AnswerLen,
    DurationSeconds,
    UsersPerApp,
    LogInterval,
}

impl ConfigField {
    pub fn value(self, config: &SweepConfig) -> String {
        match self {
            ConfigField::Model => config.model.clone(),
            ConfigField::BaseUrl => config.base_url.clone(),
            ConfigField::NumRounds => config.num_rounds.to_string(),
            ConfigField::SystemPromptLen => config.system_prompt_len.to_string(),
            ConfigField::ChatHistoryLen => config.chat_history_len.to_string(),
            ConfigField::AnswerLen => config.answer_len.to_string(),
            ConfigField::DurationSeconds => config.duration_seconds.to_string(),
            ConfigField::UsersPerApp => config.users_per_app.to_string(),
            ConfigField::LogInterval => config.log_interval.to_string(),
        }
    }
}

/// Where the value of one load generator flag comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSource {
    Field(ConfigField),
    Fixed(&'static str),
    /// The scenario's user count, see [UserCount].
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioArg {
    pub flag: &'static str,
    pub source: ArgSource,
}

const fn field(flag: &'static str, field: ConfigField) -> ScenarioArg {
    ScenarioArg {
        flag,
        source: ArgSource::Field(field),
    }
}

const fn fixed(flag: &'static str, value: &'static str) -> ScenarioArg {
    ScenarioArg {
        flag,
        source: ArgSource::Fixed(value),
    }
}

const USERS: ScenarioArg = ScenarioArg {
    flag: "--num-users",
    source: ArgSource::Users,
};

/// How many distinct users a measured run of the scenario drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCount {
    NumUsers,
    /// `num_apps * users_per_app`
    PerApp,
}

/// Input that must be generated before a measured run can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxiliaryData {
    /// A JSON manifest of synthetic apps, each with a system prompt and RAG documents.
    AppsManifest,
}

/// An immutable description of how to invoke the load generator for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDescriptor {
    pub name: &'static str,
    /// Flags sourced from the config, in the order they are passed.
    pub args: &'static [ScenarioArg],
    /// Value-less flags passed after `args`.
    pub switches: &'static [&'static str],
    pub user_count: UserCount,
    pub auxiliary: Option<AuxiliaryData>,
    /// Whether a warmup pass makes sense for this scenario when warmup is enabled.
    pub warmup: bool,
}

/// One measured run: a scenario at a QPS with its own block of user ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub scenario: String,
    pub qps: f64,
    pub user_ids: UserIdRange,
}

impl ScenarioDescriptor {
    pub fn users(&self, config: &SweepConfig) -> u64 {
        match self.user_count {
            UserCount::NumUsers => config.num_users,
            UserCount::PerApp => config.num_apps.saturating_mul(config.users_per_app),
        }
    }

    /// Arguments for the measured run, in a fixed order: the scenario's own flags, the per-run
    /// flags, then switches.
    pub fn measured_args(
        &self,
        config: &SweepConfig,
        request: &RunRequest,
        output: &Path,
        apps_file: Option<&Path>,
    ) -> Vec<String> {
        let mut args = Vec::new();
        for arg in self.args {
            let value = match arg.source {
                ArgSource::Field(field) => field.value(config),
                ArgSource::Fixed(value) => value.to_string(),
                ArgSource::Users => self.users(config).to_string(),
            };
            args.push(arg.flag.to_string());
            args.push(value);
        }

        args.extend([
            "--qps".to_string(),
            request.qps.to_string(),
            "--init-user-id".to_string(),
            request.user_ids.start.to_string(),
            "--output".to_string(),
            output.display().to_string(),
        ]);

        if let Some(apps_file) = apps_file {
            args.push("--apps-file".to_string());
            args.push(apps_file.display().to_string());
        }
        if config.request_with_user_id {
            args.push("--request-with-user-id".to_string());
        }
        args.extend(self.switches.iter().map(|s| s.to_string()));

        args
    }
}

const COMMON_HEAD: [ScenarioArg; 3] = [
    field("--model", ConfigField::Model),
    field("--base-url", ConfigField::BaseUrl),
    USERS,
];

const COMMON_TAIL: [ScenarioArg; 3] = [
    field("--num-rounds", ConfigField::NumRounds),
    field("--time", ConfigField::DurationSeconds),
    field("--log-interval", ConfigField::LogInterval),
];

macro_rules! scenario_args {
    ($($arg:expr),* $(,)?) => {
        &[
            COMMON_HEAD[0],
            COMMON_HEAD[1],
            COMMON_HEAD[2],
            $($arg,)*
            COMMON_TAIL[0],
            COMMON_TAIL[1],
            COMMON_TAIL[2],
        ]
    };
}

const SHAREGPT: ScenarioDescriptor = ScenarioDescriptor {
    name: "sharegpt",
    args: scenario_args![
        field("--shared-system-prompt", ConfigField::SystemPromptLen),
        field("--user-history-prompt", ConfigField::ChatHistoryLen),
        field("--answer-len", ConfigField::AnswerLen),
    ],
    switches: &["--sharegpt"],
    user_count: UserCount::NumUsers,
    auxiliary: None,
    warmup: false,
};

const SHORT_INPUT: ScenarioDescriptor = ScenarioDescriptor {
    name: "short-input",
    args: scenario_args![
        field("--shared-system-prompt", ConfigField::SystemPromptLen),
        fixed("--user-history-prompt", SHORT_HISTORY_LEN),
        field("--answer-len", ConfigField::AnswerLen),
    ],
    switches: &[],
    user_count: UserCount::NumUsers,
    auxiliary: None,
    warmup: true,
};

const LONG_INPUT: ScenarioDescriptor = ScenarioDescriptor {
    name: "long-input",
    args: scenario_args![
        field("--shared-system-prompt", ConfigField::SystemPromptLen),
        field("--user-history-prompt", ConfigField::ChatHistoryLen),
        field("--answer-len", ConfigField::AnswerLen),
    ],
    switches: &[],
    user_count: UserCount::NumUsers,
    auxiliary: None,
    warmup: true,
};

const LONG_LONG: ScenarioDescriptor = ScenarioDescriptor {
    name: "long-long",
    args: scenario_args![
        field("--shared-system-prompt", ConfigField::SystemPromptLen),
        field("--user-history-prompt", ConfigField::ChatHistoryLen),
        fixed("--answer-len", LONG_ANSWER_LEN),
    ],
    switches: &[],
    user_count: UserCount::NumUsers,
    auxiliary: None,
    warmup: true,
};

const APPS: ScenarioDescriptor = ScenarioDescriptor {
    name: "apps",
    args: scenario_args![
        field("--shared-system-prompt", ConfigField::SystemPromptLen),
        fixed("--user-history-prompt", SHORT_HISTORY_LEN),
        field("--answer-len", ConfigField::AnswerLen),
        field("--users-per-app", ConfigField::UsersPerApp),
    ],
    switches: &[],
    user_count: UserCount::PerApp,
    auxiliary: Some(AuxiliaryData::AppsManifest),
    warmup: true,
};

/// Maps scenario tags to their descriptors. Built once at start-up and only read afterwards.
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    descriptors: Vec<ScenarioDescriptor>,
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioRegistry {
    pub fn builtin() -> Self {
        Self {
            descriptors: vec![SHAREGPT, SHORT_INPUT, LONG_INPUT, LONG_LONG, APPS],
        }
    }

    pub fn resolve(&self, tag: &str) -> Result<&ScenarioDescriptor, UnknownScenarioError> {
        self.descriptors
            .iter()
            .find(|d| d.name == tag)
            .ok_or_else(|| UnknownScenarioError(tag.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|d| d.name)
    }
}

/// `{output_key}_{scenario}_qps{qps}.csv` inside the output directory.
pub fn artifact_path(output_dir: &Path, output_key: &str, scenario: &str, qps: f64) -> PathBuf {
    output_dir.join(format!("{output_key}_{scenario}_qps{qps}.csv"))
}

/// Where the apps manifest for one cell is generated.
pub fn apps_manifest_path(output_dir: &Path, output_key: &str, qps: f64) -> PathBuf {
    output_dir.join(format!("{output_key}_apps_qps{qps}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SweepCli;
    use crate::config::resolve_config;
    use pretty_assertions::assert_eq;

    fn config() -> SweepConfig {
        resolve_config(&SweepCli {
            model: Some("M".to_string()),
            base_url: Some("http://localhost:8000".to_string()),
            save_file_key: Some("K".to_string()),
            num_apps: Some(3),
            users_per_app: Some(4),
            request_with_user_id: Some(false),
            ..Default::default()
        })
        .unwrap()
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn all_never_includes_apps() {
        let expanded = expand_scenarios(&["all".to_string()]);
        assert_eq!(expanded, vec!["sharegpt", "short-input", "long-input"]);
        assert!(!expanded.iter().any(|s| s == "apps"));
    }

    #[test]
    fn every_expanded_tag_resolves() {
        let registry = ScenarioRegistry::builtin();
        for tag in ALL_SCENARIOS {
            assert!(registry.resolve(tag).is_ok());
        }
        for tag in SCENARIO_TAGS.iter().filter(|t| **t != ALL_TAG) {
            assert!(registry.resolve(tag).is_ok(), "{tag} should resolve");
        }
    }

    #[test]
    fn unknown_and_all_tags_do_not_resolve() {
        let registry = ScenarioRegistry::builtin();
        assert_eq!(
            registry.resolve("medium-input").unwrap_err(),
            UnknownScenarioError("medium-input".to_string())
        );
        assert!(registry.resolve(ALL_TAG).is_err());
    }

    #[test]
    fn apps_users_scale_with_app_count() {
        let config = config();
        let registry = ScenarioRegistry::builtin();

        assert_eq!(registry.resolve("apps").unwrap().users(&config), 12);
        assert_eq!(
            registry.resolve("short-input").unwrap().users(&config),
            config.num_users
        );
    }

    #[test]
    fn measured_args_carry_request_and_config() {
        let config = config();
        let registry = ScenarioRegistry::builtin();
        let descriptor = registry.resolve("apps").unwrap();
        let request = RunRequest {
            scenario: "apps".to_string(),
            qps: 0.5,
            user_ids: UserIdRange { start: 41, len: 12 },
        };

        let args = descriptor.measured_args(
            &config,
            &request,
            Path::new("out/K_apps_qps0.5.csv"),
            Some(Path::new("out/K_apps_qps0.5.json")),
        );

        assert_eq!(&args[..4], &["--model", "M", "--base-url", "http://localhost:8000"]);
        assert_eq!(flag_value(&args, "--num-users"), Some("12"));
        assert_eq!(flag_value(&args, "--users-per-app"), Some("4"));
        assert_eq!(flag_value(&args, "--qps"), Some("0.5"));
        assert_eq!(flag_value(&args, "--init-user-id"), Some("41"));
        assert_eq!(flag_value(&args, "--output"), Some("out/K_apps_qps0.5.csv"));
        assert_eq!(flag_value(&args, "--apps-file"), Some("out/K_apps_qps0.5.json"));
        assert!(!args.iter().any(|a| a == "--request-with-user-id"));
    }

    #[test]
    fn scenario_shapes_differ_where_expected() {
        let config = config();
        let registry = ScenarioRegistry::builtin();
        let request = RunRequest {
            scenario: "x".to_string(),
            qps: 1.0,
            user_ids: UserIdRange { start: 1, len: 15 },
        };
        let args_for = |tag: &str| {
            registry
                .resolve(tag)
                .unwrap()
                .measured_args(&config, &request, Path::new("o.csv"), None)
        };

        assert_eq!(
            flag_value(&args_for("short-input"), "--user-history-prompt"),
            Some(SHORT_HISTORY_LEN)
        );
        assert_eq!(
            flag_value(&args_for("long-input"), "--user-history-prompt"),
            Some("20000")
        );
        assert_eq!(
            flag_value(&args_for("long-long"), "--answer-len"),
            Some(LONG_ANSWER_LEN)
        );
        assert_eq!(args_for("sharegpt").last().map(String::as_str), Some("--sharegpt"));
    }

    #[test]
    fn artifact_names_follow_key_scenario_qps() {
        let dir = Path::new("results");
        assert_eq!(
            artifact_path(dir, "K", "short-input", 1.0),
            PathBuf::from("results/K_short-input_qps1.csv")
        );
        assert_eq!(
            artifact_path(dir, "K", "apps", 2.5),
            PathBuf::from("results/K_apps_qps2.5.csv")
        );
    }
}
