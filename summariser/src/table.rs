use anyhow::Context;
use cloth_summary_model::SummaryRow;
use itertools::Itertools;
use std::io::Write;
use std::path::Path;

/// Column holding the run identifier, always first
const RUN_COLUMN: &str = "run";

/// The merged summary of a whole sweep
///
/// Rows do not share a schema: optional metric families appear only in runs
/// whose log files existed, and sweep parameters can differ between
/// generations of a sweep. The table is the union of all keys, with cells a
/// row has no value for rendered as empty strings, so the output is always
/// rectangular.
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn new(mut rows: Vec<SummaryRow>) -> Self {
        rows.sort_by(|a, b| a.run.cmp(&b.run));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column order is deterministic: `run`, then the sweep parameters
    /// sorted by name, then the metrics sorted by name.
    fn columns(&self) -> (Vec<&str>, Vec<&str>) {
        let config_columns = self
            .rows
            .iter()
            .flat_map(|row| row.config.keys())
            .map(String::as_str)
            .unique()
            .sorted()
            .collect();
        let metric_columns = self
            .rows
            .iter()
            .flat_map(|row| row.metrics.keys())
            .map(String::as_str)
            .unique()
            .sorted()
            .collect();
        (config_columns, metric_columns)
    }

    /// Write the table as CSV, one row per run, sorted by run id.
    pub fn write<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let (config_columns, metric_columns) = self.columns();

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(
            std::iter::once(RUN_COLUMN)
                .chain(config_columns.iter().copied())
                .chain(metric_columns.iter().copied()),
        )?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(1 + config_columns.len() + metric_columns.len());
            record.push(row.run.clone());
            for column in &config_columns {
                record.push(row.config.get(*column).cloned().unwrap_or_default());
            }
            for column in &metric_columns {
                record.push(
                    row.metrics
                        .get(*column)
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                );
            }
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write(file)
    }
}
