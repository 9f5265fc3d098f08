use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find every run directory under `root`.
///
/// A run directory is any directory holding a run configuration file or a
/// payment log. The list is sorted so discovery never depends on filesystem
/// iteration order.
pub fn discover_runs(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut runs = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if path.join(crate::config::RUN_CONFIG_FILE_NAME).is_file()
            || path.join(crate::loader::PAYMENTS_FILE_NAME).is_file()
        {
            runs.push(path.to_path_buf());
        }
    }

    runs.sort();
    Ok(runs)
}
