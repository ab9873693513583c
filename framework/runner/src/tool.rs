use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;

use crate::error::RunInvocationError;
use crate::executor::Executor;

/// An external program plus any arguments that always precede the per-run ones, for example
/// `python3 multi-round-qa-apps.py`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl FromStr for ToolCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or("empty command")?;
        Ok(Self {
            program,
            leading_args: parts.collect(),
        })
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.leading_args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl ToolCommand {
    /// Locate the program.
    ///
    /// A bare name is looked up in the user's `PATH`. Anything that looks like a path must exist.
    pub fn resolve_program(&self) -> Result<PathBuf, RunInvocationError> {
        let path = Path::new(&self.program);
        if path.is_absolute() || path.components().count() > 1 {
            if !path.exists() {
                return Err(RunInvocationError::NotFound {
                    program: self.program.clone(),
                    reason: "path does not exist".to_string(),
                });
            }
            return Ok(path.to_path_buf());
        }

        which::which(&self.program).map_err(|e| RunInvocationError::NotFound {
            program: self.program.clone(),
            reason: format!("not found in PATH: {e}"),
        })
    }
}

/// A single call of an external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Short human readable name used in logs, e.g. `short-input@qps2 measured run`.
    pub label: String,
    pub command: ToolCommand,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.command, self.args.iter().join(" "))
    }
}

/// Runs external tools to completion, one at a time.
pub trait ToolRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), RunInvocationError>;
}

/// Runs invocations as child processes on the [Executor]'s runtime.
///
/// The child inherits stdout and stderr so that the tool's own progress output stays visible.
/// It is killed if it outlives its timeout or the sweep is shut down.
pub struct ProcessRunner {
    executor: Arc<Executor>,
}

impl ProcessRunner {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), RunInvocationError> {
        let program_path = invocation.command.resolve_program()?;
        let program = invocation.command.program.clone();

        log::info!("Starting {}: {}", invocation.label, invocation);

        let mut cmd = tokio::process::Command::new(program_path);
        cmd.args(&invocation.command.leading_args)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let timeout = invocation.timeout;
        let name = program.clone();
        let fut = async move {
            let mut child = cmd.spawn().map_err(|source| RunInvocationError::Spawn {
                program: name.clone(),
                source,
            })?;

            let status = match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        return Err(RunInvocationError::Timeout {
                            program: name,
                            timeout,
                        })
                    }
                },
                None => child.wait().await,
            }
            .map_err(|source| RunInvocationError::Spawn {
                program: name.clone(),
                source,
            })?;

            if status.success() {
                Ok(())
            } else {
                Err(RunInvocationError::ExitStatus {
                    program: name,
                    status: status.to_string(),
                })
            }
        };

        match self.executor.execute_in_place(fut) {
            Ok(result) => result,
            Err(_) => Err(RunInvocationError::Interrupted { program }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_core::prelude::ShutdownHandle;
    use tempfile::NamedTempFile;

    fn invocation(command: &str, args: &[&str], timeout: Option<Duration>) -> Invocation {
        Invocation {
            label: "test".to_string(),
            command: command.parse().unwrap(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }

    fn runner() -> ProcessRunner {
        ProcessRunner::new(Arc::new(
            Executor::new(ShutdownHandle::default()).unwrap(),
        ))
    }

    #[test]
    fn parses_program_and_leading_args() {
        let command: ToolCommand = "python3  multi-round-qa-apps.py --verbose".parse().unwrap();
        assert_eq!(command.program, "python3");
        assert_eq!(command.leading_args, vec!["multi-round-qa-apps.py", "--verbose"]);
        assert_eq!(command.to_string(), "python3 multi-round-qa-apps.py --verbose");
        assert!("".parse::<ToolCommand>().is_err());
    }

    #[test]
    fn resolves_existing_path() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let command = ToolCommand {
            program: temp.path().display().to_string(),
            leading_args: vec![],
        };
        assert_eq!(command.resolve_program().unwrap(), temp.path());
    }

    #[test]
    fn does_not_resolve_missing_path() {
        let command: ToolCommand = "/non/existent/path/to/load-generator".parse().unwrap();
        assert!(matches!(
            command.resolve_program(),
            Err(RunInvocationError::NotFound { .. })
        ));
    }

    #[test]
    fn does_not_resolve_unknown_bare_name() {
        let command: ToolCommand = "qa-sweep-no-such-tool-on-path".parse().unwrap();
        assert!(command.resolve_program().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn successful_process() {
        runner()
            .run(&invocation("sh -c", &["exit 0"], None))
            .expect("process should succeed");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_an_error() {
        let err = runner()
            .run(&invocation("sh -c", &["exit 3"], None))
            .unwrap_err();
        assert!(matches!(err, RunInvocationError::ExitStatus { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn slow_process_times_out() {
        let err = runner()
            .run(&invocation(
                "sleep",
                &["30"],
                Some(Duration::from_millis(200)),
            ))
            .unwrap_err();
        assert!(matches!(err, RunInvocationError::Timeout { .. }), "{err:?}");
    }
}
