use crate::error::RunError;
use cloth_summary_model::RunConfig;
use std::path::Path;

/// File holding the sweep parameters of a run
pub(crate) const RUN_CONFIG_FILE_NAME: &str = "cloth_input.txt";

/// Load the sweep parameters of a run from its configuration file.
///
/// Lines are `key=value` pairs, split at the first `=` with both sides
/// trimmed. Blank lines and `#` comments are skipped. A remaining line
/// without a `=` fails the whole load.
pub(crate) fn load_run_config(run_dir: &Path) -> Result<RunConfig, RunError> {
    let content =
        std::fs::read_to_string(run_dir.join(RUN_CONFIG_FILE_NAME)).map_err(|source| {
            RunError::Io {
                file: RUN_CONFIG_FILE_NAME,
                source,
            }
        })?;

    let mut config = RunConfig::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(RunError::ConfigParse {
                line: index + 1,
                content: line.to_string(),
            });
        };
        config.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(config)
}
