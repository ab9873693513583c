use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use itertools::Itertools;
use sweep_summary_model::SweepSummary;

use crate::cli::SweepCli;
use crate::error::ConfigError;
use crate::scenario::{expand_scenarios, is_known_tag};
use crate::tool::ToolCommand;

pub const DEFAULT_NUM_USERS: u64 = 15;
pub const DEFAULT_NUM_ROUNDS: u64 = 20;
pub const DEFAULT_SYSTEM_PROMPT_LEN: u64 = 1000;
pub const DEFAULT_CHAT_HISTORY_LEN: u64 = 20000;
pub const DEFAULT_ANSWER_LEN: u64 = 100;
pub const DEFAULT_DURATION_SECONDS: u64 = 300;
pub const DEFAULT_NUM_APPS: u64 = 5;
pub const DEFAULT_USERS_PER_APP: u64 = 2;
pub const DEFAULT_RAG_DOC_LEN: u64 = 1000;
pub const DEFAULT_RAG_DOC_COUNT: u64 = 10;
pub const DEFAULT_LOG_INTERVAL: u64 = 30;
pub const DEFAULT_QPS: f64 = 1.0;
pub const DEFAULT_DRAIN_SECONDS: u64 = 10;
pub const DEFAULT_LOAD_GENERATOR: &str = "python3 multi-round-qa-apps.py";
pub const DEFAULT_APPS_GENERATOR: &str = "python3 generate_apps_json.py";

/// When the whole process should report failure after a sweep that had at least one failed cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExitPolicy {
    /// Fail only if no cell succeeded.
    #[default]
    AllFailed,
    /// Fail if any cell did not succeed.
    AnyFailed,
}

impl ExitPolicy {
    pub fn should_fail(&self, summary: &SweepSummary) -> bool {
        let total = summary.results.len();
        let succeeded = summary.succeeded_count();
        match self {
            ExitPolicy::AllFailed => total > 0 && succeeded == 0,
            ExitPolicy::AnyFailed => succeeded < total,
        }
    }
}

/// A fully resolved and validated sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub model: String,
    pub base_url: String,
    pub output_key: String,
    /// Deduplicated scenario tags with `all` already expanded. May contain unknown tags, which
    /// are reported when the sweep reaches them.
    pub scenarios: Vec<String>,
    pub qps_values: Vec<f64>,

    pub num_apps: u64,
    pub users_per_app: u64,
    pub system_prompt_len: u64,
    pub rag_doc_len: u64,
    pub rag_doc_count: u64,
    pub num_users: u64,
    pub num_rounds: u64,
    pub duration_seconds: u64,
    pub chat_history_len: u64,
    pub answer_len: u64,
    pub log_interval: u64,

    pub warmup: bool,
    pub request_with_user_id: bool,
    pub drain: Duration,
    pub run_timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub exit_policy: ExitPolicy,
    pub load_generator: ToolCommand,
    pub apps_generator: ToolCommand,
    pub ledger_file: Option<PathBuf>,
    pub no_progress: bool,
}

/// The parameters that can be supplied both by name and by position.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PartialConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub output_key: Option<String>,
    pub scenarios: Option<Vec<String>>,
    pub qps_values: Option<Vec<f64>>,
}

impl PartialConfig {
    /// Field-wise merge where `self` wins. Lists are taken whole from one side, never combined.
    fn or(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            model: self.model.or(fallback.model),
            base_url: self.base_url.or(fallback.base_url),
            output_key: self.output_key.or(fallback.output_key),
            scenarios: self.scenarios.or(fallback.scenarios),
            qps_values: self.qps_values.or(fallback.qps_values),
        }
    }
}

/// Resolve the command line into a [SweepConfig].
///
/// Named flags and positional tokens are parsed separately into two partial configs, which are
/// then merged with the named side taking precedence.
pub fn resolve_config(cli: &SweepCli) -> Result<SweepConfig, ConfigError> {
    let named = parse_named(cli)?;
    let positional = parse_positional(&cli.positional)?;
    let merged = named.or(positional);

    let model = required(merged.model, "model")?;
    let base_url = required(merged.base_url, "base_url")?;
    let output_key = required(merged.output_key, "save_file_key")?;

    let scenarios = merged
        .scenarios
        .unwrap_or_else(|| vec![crate::scenario::ALL_TAG.to_string()]);
    let scenarios = expand_scenarios(&scenarios);
    if scenarios.is_empty() {
        return Err(ConfigError::invalid("scenarios", "", "no scenario given"));
    }

    // `1` and `1.0` name the same artifact, so they are the same cell.
    let qps_values = merged
        .qps_values
        .unwrap_or_else(|| vec![DEFAULT_QPS])
        .into_iter()
        .unique_by(|qps| qps.to_string())
        .collect::<Vec<_>>();

    let num_apps = cli.num_apps.unwrap_or(DEFAULT_NUM_APPS);
    let users_per_app = cli.users_per_app.unwrap_or(DEFAULT_USERS_PER_APP);
    if num_apps.checked_mul(users_per_app).is_none() {
        return Err(ConfigError::invalid(
            "users_per_app",
            users_per_app.to_string(),
            format!("{num_apps} apps x {users_per_app} users overflows the user id space"),
        ));
    }

    let load_generator = cli
        .load_generator
        .as_deref()
        .unwrap_or(DEFAULT_LOAD_GENERATOR)
        .parse::<ToolCommand>()
        .map_err(|reason| ConfigError::invalid("load_generator", "", reason))?;
    let apps_generator = cli
        .apps_generator
        .as_deref()
        .unwrap_or(DEFAULT_APPS_GENERATOR)
        .parse::<ToolCommand>()
        .map_err(|reason| ConfigError::invalid("apps_generator", "", reason))?;

    Ok(SweepConfig {
        model,
        base_url,
        output_key,
        scenarios,
        qps_values,
        num_apps,
        users_per_app,
        system_prompt_len: cli.system_prompt_len.unwrap_or(DEFAULT_SYSTEM_PROMPT_LEN),
        rag_doc_len: cli.rag_doc_len.unwrap_or(DEFAULT_RAG_DOC_LEN),
        rag_doc_count: cli.rag_doc_count.unwrap_or(DEFAULT_RAG_DOC_COUNT),
        num_users: cli.num_users.unwrap_or(DEFAULT_NUM_USERS),
        num_rounds: cli.num_rounds.unwrap_or(DEFAULT_NUM_ROUNDS),
        duration_seconds: cli.duration_seconds.unwrap_or(DEFAULT_DURATION_SECONDS),
        chat_history_len: cli.chat_history_len.unwrap_or(DEFAULT_CHAT_HISTORY_LEN),
        answer_len: cli.answer_len.unwrap_or(DEFAULT_ANSWER_LEN),
        log_interval: cli.log_interval.unwrap_or(DEFAULT_LOG_INTERVAL),
        warmup: cli.warmup.unwrap_or(true),
        request_with_user_id: cli.request_with_user_id.unwrap_or(true),
        drain: Duration::from_secs(cli.drain_seconds.unwrap_or(DEFAULT_DRAIN_SECONDS)),
        run_timeout: cli.run_timeout_seconds.map(Duration::from_secs),
        output_dir: cli
            .output_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        exit_policy: cli.exit_policy.unwrap_or_default(),
        load_generator,
        apps_generator,
        ledger_file: cli.ledger_file.as_deref().map(PathBuf::from),
        no_progress: cli.no_progress,
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { field })
}

fn parse_named(cli: &SweepCli) -> Result<PartialConfig, ConfigError> {
    let scenarios = cli.scenarios.as_deref().map(split_list);
    let qps_values = cli
        .qps_values
        .as_deref()
        .map(|raw| {
            split_list(raw)
                .iter()
                .map(|token| parse_qps(token))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    if let Some(qps_values) = &qps_values {
        if qps_values.is_empty() {
            return Err(ConfigError::invalid("qps_values", "", "no QPS value given"));
        }
    }

    Ok(PartialConfig {
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
        output_key: cli.save_file_key.clone(),
        scenarios,
        qps_values,
    })
}

/// Parse the legacy positional form `MODEL BASE_URL SAVE_FILE_KEY [SCENARIO...] [QPS...]`.
///
/// The first three tokens fill the required slots by position, whatever their shape, so a
/// numeric save key such as a date is kept. Only a known scenario tag ends the slot phase early,
/// which lets named required flags be combined with positional scenarios and QPS values. After
/// the slots, non-numeric tokens are scenario tags and numeric tokens are QPS values. Scenario
/// tags may not follow QPS values.
pub(crate) fn parse_positional(tokens: &[String]) -> Result<PartialConfig, ConfigError> {
    let mut slots: Vec<String> = Vec::with_capacity(3);
    let mut scenarios = Vec::new();
    let mut qps_values = Vec::new();

    for token in tokens.iter().flat_map(|t| split_list(t)) {
        let in_slots = scenarios.is_empty() && qps_values.is_empty();

        if in_slots && slots.len() < 3 && !is_known_tag(&token) {
            slots.push(token);
            continue;
        }

        let numeric = token.parse::<f64>().is_ok();
        if numeric {
            qps_values.push(parse_qps(&token)?);
        } else if qps_values.is_empty() {
            scenarios.push(token);
        } else {
            return Err(ConfigError::UnexpectedPositional {
                token,
                reason: "scenario tags must come before QPS values".to_string(),
            });
        }
    }

    let mut slots = slots.into_iter();
    Ok(PartialConfig {
        model: slots.next(),
        base_url: slots.next(),
        output_key: slots.next(),
        scenarios: (!scenarios.is_empty()).then_some(scenarios),
        qps_values: (!qps_values.is_empty()).then_some(qps_values),
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_qps(token: &str) -> Result<f64, ConfigError> {
    let qps = token
        .parse::<f64>()
        .map_err(|e| ConfigError::invalid("qps_values", token, e.to_string()))?;
    if !qps.is_finite() || qps <= 0.0 {
        return Err(ConfigError::invalid(
            "qps_values",
            token,
            "must be a positive number",
        ));
    }
    Ok(qps)
}

impl fmt::Display for SweepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sweep parameters")?;
        writeln!(f, "  model:              {}", self.model)?;
        writeln!(f, "  base_url:           {}", self.base_url)?;
        writeln!(f, "  save_file_key:      {}", self.output_key)?;
        writeln!(f, "  scenarios:          {}", self.scenarios.join(","))?;
        writeln!(
            f,
            "  qps_values:         {}",
            self.qps_values.iter().map(|q| q.to_string()).join(",")
        )?;
        writeln!(f, "  num_users:          {}", self.num_users)?;
        writeln!(f, "  num_rounds:         {}", self.num_rounds)?;
        writeln!(f, "  system_prompt_len:  {}", self.system_prompt_len)?;
        writeln!(f, "  chat_history_len:   {}", self.chat_history_len)?;
        writeln!(f, "  answer_len:         {}", self.answer_len)?;
        writeln!(f, "  duration:           {}s", self.duration_seconds)?;
        writeln!(f, "  num_apps:           {}", self.num_apps)?;
        writeln!(f, "  users_per_app:      {}", self.users_per_app)?;
        writeln!(f, "  rag_doc_len:        {}", self.rag_doc_len)?;
        writeln!(f, "  rag_doc_count:      {}", self.rag_doc_count)?;
        writeln!(f, "  warmup:             {}", self.warmup)?;
        writeln!(f, "  drain:              {}s", self.drain.as_secs())?;
        writeln!(f, "  output_dir:         {}", self.output_dir.display())?;
        writeln!(f, "  load_generator:     {}", self.load_generator)?;
        write!(f, "  apps_generator:     {}", self.apps_generator)
    }
}
