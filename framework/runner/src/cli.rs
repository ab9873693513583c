use clap::Parser;

use crate::config::ExitPolicy;

/// Drive a scenario x QPS load-test sweep against a language-model serving endpoint.
///
/// Arguments can be given as named flags or, for compatibility with older sweep scripts, as a
/// positional sequence: `MODEL BASE_URL SAVE_FILE_KEY [SCENARIO...] [QPS...]`. Named flags always
/// take precedence over positional arguments for the same parameter.
#[derive(Parser, Debug, Default, Clone)]
#[command(about, long_about = None, allow_negative_numbers = true)]
pub struct SweepCli {
    /// The model id to request from the serving endpoint
    #[arg(long = "model")]
    pub model: Option<String>,

    /// Base URL of the serving endpoint
    #[arg(long = "base_url", visible_alias = "base-url")]
    pub base_url: Option<String>,

    /// Prefix for every CSV artifact written by the sweep
    #[arg(long = "save_file_key", visible_alias = "save-file-key")]
    pub save_file_key: Option<String>,

    /// Comma separated scenario tags, or `all`. Replaces any positional scenario tags.
    #[arg(long = "scenarios")]
    pub scenarios: Option<String>,

    /// Comma separated target request rates. Replaces any positional QPS values.
    #[arg(long = "qps_values", visible_alias = "qps-values")]
    pub qps_values: Option<String>,

    /// Number of concurrent users for the single-tenant scenarios
    #[arg(long = "num_users", visible_alias = "num-users")]
    pub num_users: Option<u64>,

    /// Number of rounds in each user conversation
    #[arg(long = "num_rounds", visible_alias = "num-rounds")]
    pub num_rounds: Option<u64>,

    /// Length of the shared system prompt, in tokens
    #[arg(long = "system_prompt_len", visible_alias = "system-prompt-len")]
    pub system_prompt_len: Option<u64>,

    /// Length of the per-user chat history, in tokens
    #[arg(long = "chat_history_len", visible_alias = "chat-history-len")]
    pub chat_history_len: Option<u64>,

    /// Length of each answer, in tokens
    #[arg(long = "answer_len", visible_alias = "answer-len")]
    pub answer_len: Option<u64>,

    /// How long each measured run lasts, in seconds
    #[arg(long = "duration", visible_alias = "duration_seconds")]
    pub duration_seconds: Option<u64>,

    /// Number of apps to generate for the `apps` scenario
    #[arg(long = "num_apps", visible_alias = "num-apps")]
    pub num_apps: Option<u64>,

    /// Number of users sharing each app in the `apps` scenario
    #[arg(long = "users_per_app", visible_alias = "users-per-app")]
    pub users_per_app: Option<u64>,

    /// Length of each generated RAG document
    #[arg(long = "rag_doc_len", visible_alias = "rag-doc-len")]
    pub rag_doc_len: Option<u64>,

    /// Number of generated RAG documents per app
    #[arg(long = "rag_doc_count", visible_alias = "rag-doc-count")]
    pub rag_doc_count: Option<u64>,

    /// Seconds between two summary log lines of the load generator
    #[arg(long = "log_interval", visible_alias = "log-interval")]
    pub log_interval: Option<u64>,

    /// Whether to run a short priming pass before each measured run
    #[arg(long = "warmup", action = clap::ArgAction::Set)]
    pub warmup: Option<bool>,

    /// Whether the load generator should send the user id with each request
    #[arg(long = "request_with_user_id", visible_alias = "request-with-user-id", action = clap::ArgAction::Set)]
    pub request_with_user_id: Option<bool>,

    /// Pause between two measured runs, in seconds
    #[arg(long = "drain_seconds", visible_alias = "drain-seconds")]
    pub drain_seconds: Option<u64>,

    /// Kill a run of an external tool after this many seconds
    #[arg(long = "run_timeout_seconds", visible_alias = "run-timeout-seconds")]
    pub run_timeout_seconds: Option<u64>,

    /// Directory the CSV artifacts are written to
    #[arg(long = "output_dir", visible_alias = "output-dir")]
    pub output_dir: Option<String>,

    /// When the process should exit with a failure status after the sweep
    #[arg(long = "exit_policy", visible_alias = "exit-policy", value_enum)]
    pub exit_policy: Option<ExitPolicy>,

    /// Command used to run the load generator, for example `python3 multi-round-qa-apps.py`
    #[arg(long = "load_generator", visible_alias = "load-generator", env = "QA_SWEEP_LOAD_GENERATOR")]
    pub load_generator: Option<String>,

    /// Command used to generate the apps manifest, for example `python3 generate_apps_json.py`
    #[arg(long = "apps_generator", visible_alias = "apps-generator", env = "QA_SWEEP_APPS_GENERATOR")]
    pub apps_generator: Option<String>,

    /// Append the run ledger to this file as a JSON line when the sweep finishes
    #[arg(long = "ledger_file", visible_alias = "ledger-file")]
    pub ledger_file: Option<String>,

    /// Do not show a progress bar during measured runs.
    ///
    /// Recommended for CI where nobody is watching the bar and it only adds noise to the logs.
    #[arg(long = "no_progress", visible_alias = "no-progress", default_value = "false")]
    pub no_progress: bool,

    /// Positional arguments: `MODEL BASE_URL SAVE_FILE_KEY [SCENARIO...] [QPS...]`
    #[arg(value_name = "ARGS")]
    pub positional: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_underscore_and_kebab_spellings() {
        let cli = SweepCli::try_parse_from([
            "qa-sweep",
            "--model=M",
            "--base-url=U",
            "--save_file_key=K",
            "--qps_values=1,2",
            "--warmup=false",
        ])
        .unwrap();

        assert_eq!(cli.model.as_deref(), Some("M"));
        assert_eq!(cli.base_url.as_deref(), Some("U"));
        assert_eq!(cli.save_file_key.as_deref(), Some("K"));
        assert_eq!(cli.qps_values.as_deref(), Some("1,2"));
        assert_eq!(cli.warmup, Some(false));
        assert!(cli.positional.is_empty());
    }

    #[test]
    fn collects_positional_tokens() {
        let cli =
            SweepCli::try_parse_from(["qa-sweep", "M", "U", "K", "short-input", "0.5", "-1"])
                .unwrap();

        assert_eq!(cli.positional, vec!["M", "U", "K", "short-input", "0.5", "-1"]);
    }

    #[test]
    fn rejects_malformed_numeric_flag() {
        let result = SweepCli::try_parse_from(["qa-sweep", "--num_users=many"]);
        assert!(result.is_err());
    }
}
