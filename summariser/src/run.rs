use cloth_summary_model::SummaryRow;
use std::path::Path;

/// Reduce one run directory to its summary row.
///
/// Loads the run configuration and the four logs, then computes the metrics.
/// Any failure in there fails this run only; isolating it from the rest of
/// the sweep is the caller's job.
pub fn process_run(sweep_root: &Path, run_dir: &Path) -> anyhow::Result<SummaryRow> {
    let run_id = run_id(sweep_root, run_dir);
    log::debug!("Processing run {run_id}");

    let config = crate::config::load_run_config(run_dir)?;
    let records = crate::loader::load_run_records(run_dir)?;
    let metrics = crate::metrics::compute_run_metrics(&records)?;

    Ok(SummaryRow::new(run_id, config, metrics))
}

/// The run's identifier: its path relative to the sweep root.
///
/// Stable across machines and re-runs, unlike an absolute path.
pub(crate) fn run_id(sweep_root: &Path, run_dir: &Path) -> String {
    let relative = run_dir.strip_prefix(sweep_root).unwrap_or(run_dir);
    if relative.as_os_str().is_empty() {
        // The sweep root itself is the run directory
        ".".to_string()
    } else {
        relative.to_string_lossy().into_owned()
    }
}
