use std::path::PathBuf;
use std::time::Duration;

/// Fatal problems with the sweep configuration. Raised before any run is started.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required parameter `{field}`")]
    Missing { field: &'static str },
    #[error("invalid value `{value}` for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("unexpected positional argument `{token}`: {reason}")]
    UnexpectedPositional { token: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown scenario `{0}`")]
pub struct UnknownScenarioError(pub String);

/// A run of an external tool that did not complete successfully.
#[derive(Debug, thiserror::Error)]
pub enum RunInvocationError {
    #[error("cannot locate `{program}`: {reason}")]
    NotFound { program: String, reason: String },
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    ExitStatus { program: String, status: String },
    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("`{program}` was interrupted by a shutdown signal")]
    Interrupted { program: String },
}

impl RunInvocationError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunInvocationError::Interrupted { .. })
    }
}

/// The auxiliary data generator could not produce the manifest for a cell.
#[derive(Debug, thiserror::Error)]
pub enum AuxiliaryGenerationError {
    #[error("auxiliary data generator failed: {0}")]
    Invocation(#[from] RunInvocationError),
    #[error("auxiliary data generator did not produce {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("cannot remove stale {}: {source}", .path.display())]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Warmup failures are logged and never stop the measured run.
#[derive(Debug, thiserror::Error)]
#[error("warmup failed: {0}")]
pub struct WarmupError(#[from] pub RunInvocationError);

/// The user id space cannot fit another block without reusing ids.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("cannot allocate {requested} user ids after id {next}: id space exhausted")]
pub struct IdentitySpaceExhausted {
    pub next: u64,
    pub requested: u64,
}
