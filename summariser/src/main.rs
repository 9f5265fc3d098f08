use anyhow::{bail, Context};
use clap::Parser;
use cloth_summariser::discover::discover_runs;
use cloth_summariser::summarise_runs;
use cloth_summariser::table::SummaryTable;
use cloth_summary_model::{write_run_report, RUN_REPORT_FILE_NAME};
use log::info;
use std::path::PathBuf;

/// Default name of the summary table, written into the sweep root
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// Reduce a sweep of payment-network simulation runs to one summary table
#[derive(Parser)]
#[command(about, long_about = None)]
struct Cli {
    /// Root directory of the sweep, scanned recursively for run directories
    root: PathBuf,

    /// Where to write the summary table
    ///
    /// Defaults to `summary.csv` in the sweep root.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// The number of runs to process concurrently
    ///
    /// Defaults to the available parallelism.
    #[clap(short, long)]
    jobs: Option<usize>,

    /// Also write each run's reduction as `cloth_summary.json` into its run directory
    #[clap(long, default_value = "false")]
    run_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if !cli.root.is_dir() {
        bail!("Sweep root {} is not a directory", cli.root.display());
    }

    let run_dirs = discover_runs(&cli.root)
        .with_context(|| format!("Failed to scan {}", cli.root.display()))?;
    if run_dirs.is_empty() {
        bail!("No run directories found under {}", cli.root.display());
    }
    info!(
        "Discovered {} runs under {}",
        run_dirs.len(),
        cli.root.display()
    );

    let jobs = cli.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(1)
    });

    let total = run_dirs.len();
    let outcome = summarise_runs(&cli.root, run_dirs, jobs, async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl-C");
    })
    .await;

    if outcome.rows.is_empty() {
        if outcome.interrupted {
            bail!("Interrupted before any run finished");
        }
        bail!("All {} runs failed to process", total);
    }

    if cli.run_json {
        for row in &outcome.rows {
            let path = cli.root.join(&row.run).join(RUN_REPORT_FILE_NAME);
            write_run_report(row, path)
                .with_context(|| format!("Failed to write the report for run {}", row.run))?;
        }
    }

    let output = cli
        .output
        .unwrap_or_else(|| cli.root.join(SUMMARY_FILE_NAME));
    let table = SummaryTable::new(outcome.rows);
    table.write_to_file(&output)?;
    info!(
        "Wrote {} rows to {}, skipped {} runs",
        table.len(),
        output.display(),
        outcome.skipped
    );

    if outcome.interrupted {
        bail!("Interrupted before the sweep finished, the summary is partial");
    }

    Ok(())
}
