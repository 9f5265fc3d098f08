use thiserror::Error;

/// Reasons a single run is dropped from the summary
///
/// Every variant is handled at single-run granularity: the run is logged and
/// skipped, and the rest of the sweep carries on.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("cloth_input.txt line {line}: expected `key=value`, found `{content}`")]
    ConfigParse { line: usize, content: String },

    #[error("{file}: missing required column `{column}`")]
    Schema {
        file: &'static str,
        column: &'static str,
    },

    #[error("{file} line {line}, column `{column}`: {message}")]
    Record {
        file: &'static str,
        line: usize,
        column: &'static str,
        message: String,
    },

    #[error("no payment records in payments_output.csv")]
    EmptyRun,

    #[error("failed to read {file}")]
    Io {
        file: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {file}")]
    Csv {
        file: &'static str,
        #[source]
        source: csv::Error,
    },
}
