use cloth_summary_model::SummaryRow;
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod analyze;
mod config;
pub mod discover;
pub mod error;
mod loader;
mod metrics;
mod partition;
pub mod run;
pub mod table;

/// What summarising a sweep produced
#[derive(Debug)]
pub struct SweepOutcome {
    /// One row per run that processed cleanly
    pub rows: Vec<SummaryRow>,
    /// Number of runs skipped because their reduction failed
    pub skipped: usize,
    /// Whether summarising stopped early on a shutdown signal
    pub interrupted: bool,
}

/// Summarise every run directory, at most `jobs` runs in flight at a time.
///
/// Each run is a pure function of its own files, so runs are reduced on
/// blocking workers with no shared state and gathered here. A failing run is
/// logged and counted, never allowed to abort the sweep. When `shutdown`
/// resolves, scheduling stops and the rows already completed are returned
/// with `interrupted` set so the caller can still write a partial summary.
pub async fn summarise_runs(
    sweep_root: &Path,
    run_dirs: Vec<PathBuf>,
    jobs: usize,
    shutdown: impl Future<Output = ()>,
) -> SweepOutcome {
    let sweep_root = Arc::new(sweep_root.to_path_buf());

    let mut results = futures::stream::iter(run_dirs.into_iter().map(|run_dir| {
        let sweep_root = sweep_root.clone();
        async move {
            let run_id = run::run_id(&sweep_root, &run_dir);
            let result =
                tokio::task::spawn_blocking(move || run::process_run(&sweep_root, &run_dir)).await;
            (run_id, result)
        }
    }))
    .buffer_unordered(jobs.max(1));

    let mut rows = Vec::new();
    let mut skipped = 0;
    let mut interrupted = false;

    futures::pin_mut!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                log::warn!("Shutdown requested, abandoning the runs still in flight");
                interrupted = true;
                break;
            }
            next = results.next() => match next {
                Some((_, Ok(Ok(row)))) => rows.push(row),
                Some((run_id, Ok(Err(error)))) => {
                    log::warn!("Skipping run {run_id}: {error:#}");
                    skipped += 1;
                }
                Some((run_id, Err(join_error))) => {
                    log::warn!("Skipping run {run_id}: worker failed: {join_error}");
                    skipped += 1;
                }
                None => break,
            },
        }
    }

    SweepOutcome {
        rows,
        skipped,
        interrupted,
    }
}
