use std::path::{Path, PathBuf};

use crate::config::SweepConfig;
use crate::error::AuxiliaryGenerationError;
use crate::scenario::AuxiliaryData;
use crate::tool::{Invocation, ToolRunner};

impl AuxiliaryData {
    /// The generator call that materialises this data at `output`.
    pub fn invocation(&self, config: &SweepConfig, output: &Path, label: &str) -> Invocation {
        match self {
            AuxiliaryData::AppsManifest => Invocation {
                label: format!("{label} apps manifest"),
                command: config.apps_generator.clone(),
                args: vec![
                    "--num-apps".to_string(),
                    config.num_apps.to_string(),
                    "--sys-prompt-len".to_string(),
                    config.system_prompt_len.to_string(),
                    "--rag-doc-len".to_string(),
                    config.rag_doc_len.to_string(),
                    "--rag-doc-count".to_string(),
                    config.rag_doc_count.to_string(),
                    "--output".to_string(),
                    output.display().to_string(),
                ],
                timeout: config.run_timeout,
            },
        }
    }
}

/// Run the generator synchronously and check that it produced its output.
///
/// Any file already at `output` is removed first so a leftover manifest from an earlier sweep
/// cannot stand in for one the generator failed to write.
pub fn generate(
    runner: &mut dyn ToolRunner,
    data: AuxiliaryData,
    config: &SweepConfig,
    output: PathBuf,
    label: &str,
) -> Result<PathBuf, AuxiliaryGenerationError> {
    if output.exists() {
        std::fs::remove_file(&output).map_err(|source| AuxiliaryGenerationError::StaleOutput {
            path: output.clone(),
            source,
        })?;
    }

    runner.run(&data.invocation(config, &output, label))?;

    if !output.exists() {
        return Err(AuxiliaryGenerationError::MissingOutput(output));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SweepCli;
    use crate::config::resolve_config;
    use crate::error::RunInvocationError;

    /// Exits successfully, optionally writing the file named by `--output`.
    struct GeneratorStub {
        writes_output: bool,
    }

    impl ToolRunner for GeneratorStub {
        fn run(&mut self, invocation: &Invocation) -> Result<(), RunInvocationError> {
            if self.writes_output {
                let i = invocation.args.iter().position(|a| a == "--output").unwrap();
                std::fs::write(&invocation.args[i + 1], "[]").unwrap();
            }
            Ok(())
        }
    }

    fn config() -> SweepConfig {
        resolve_config(&SweepCli {
            model: Some("M".to_string()),
            base_url: Some("U".to_string()),
            save_file_key: Some("K".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn leftover_manifest_does_not_count_as_generated() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("K_apps_qps1.json");
        std::fs::write(&manifest, "stale").unwrap();

        let result = generate(
            &mut GeneratorStub {
                writes_output: false,
            },
            AuxiliaryData::AppsManifest,
            &config(),
            manifest.clone(),
            "apps@qps1",
        );

        assert!(matches!(
            result,
            Err(AuxiliaryGenerationError::MissingOutput(path)) if path == manifest
        ));
        assert!(!manifest.exists());
    }

    #[test]
    fn fresh_manifest_replaces_leftover() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("K_apps_qps1.json");
        std::fs::write(&manifest, "stale").unwrap();

        let path = generate(
            &mut GeneratorStub {
                writes_output: true,
            },
            AuxiliaryData::AppsManifest,
            &config(),
            manifest.clone(),
            "apps@qps1",
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "[]");
    }
}
