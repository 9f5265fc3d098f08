use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

/// File name used for the per-run JSON report
pub const RUN_REPORT_FILE_NAME: &str = "cloth_summary.json";

/// One row of the payment log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    /// The amount transferred, in millisatoshi
    pub amount: i64,
    /// Simulation time at which the payment entered the network, in milliseconds
    pub start_time: i64,
    /// Simulation time at which the payment reached a terminal state, in milliseconds
    pub end_time: i64,
    /// The number of routing attempts, counting the first one
    ///
    /// Always at least 1. A payment that found a route immediately has `attempts == 1`.
    pub attempts: i64,
    /// How many attempts failed because an edge on the route had insufficient balance
    pub no_balance_count: i64,
    /// How many attempts failed because an edge on the route was occupied by a
    /// concurrent payment
    pub edge_occupied_count: i64,
    /// Edge ids of the final route, in hop order
    ///
    /// Empty when no route was ever found.
    pub route: Vec<i64>,
    /// The total routing fee paid, in millisatoshi
    ///
    /// Only set for successful payments.
    pub total_fee: Option<i64>,
    /// Whether the payment completed
    pub is_success: bool,
    /// Whether the payment gave up because its timeout expired
    pub timeout_exp: bool,
}

impl PaymentRecord {
    /// The time the payment spent in the network, in milliseconds
    pub fn elapsed(&self) -> i64 {
        self.end_time - self.start_time
    }

    /// The number of attempts beyond the first
    pub fn retries(&self) -> i64 {
        self.attempts - 1
    }

    /// Classify the terminal state of the payment
    ///
    /// The checks are ordered and the order matters. A payment that never found a
    /// route on its single attempt is [PaymentOutcome::FailNoPath] even when its
    /// timeout also expired, because the timeout check only applies once at least
    /// one route was tried.
    pub fn outcome(&self) -> PaymentOutcome {
        if self.is_success {
            PaymentOutcome::Success
        } else if self.route.is_empty() && self.attempts == 1 {
            PaymentOutcome::FailNoPath
        } else if self.timeout_exp {
            PaymentOutcome::FailTimeout
        } else {
            PaymentOutcome::FailNoAlternativePath
        }
    }
}

/// Terminal state of a payment
///
/// Every payment falls into exactly one of these classes, see
/// [PaymentRecord::outcome] for the classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The payment was delivered
    Success,
    /// No route to the destination was ever found
    FailNoPath,
    /// The payment timed out while retrying
    FailTimeout,
    /// A route existed at first but every alternative was exhausted
    FailNoAlternativePath,
}

/// One channel direction of the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    /// The edge id
    pub id: i64,
    /// Id of the group the edge belongs to, if any
    pub group: Option<i64>,
    /// Base fee charged for forwarding through this edge, in millisatoshi
    pub fee_base: i64,
    /// Proportional fee, in millionths of the forwarded amount
    pub fee_proportional: i64,
    /// History of `(balance, duration)` pairs recorded while payments held
    /// balance locked on this edge
    pub locked_balance_and_duration: Vec<(i64, i64)>,
}

impl EdgeRecord {
    /// Integral of locked balance over time, in balance x time units
    ///
    /// Used as a cost proxy for how long liquidity was unavailable on this edge.
    pub fn total_locked_balance_duration(&self) -> i64 {
        self.locked_balance_and_duration
            .iter()
            .map(|(balance, duration)| balance * duration)
            .sum()
    }
}

/// One channel of the network, made up of two opposite edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Id of the edge in one direction
    pub edge1: i64,
    /// Id of the edge in the other direction
    pub edge2: i64,
    /// Total time any balance of the channel was locked, in milliseconds
    pub total_lock_time: i64,
}

/// One group of channels sharing routing capacity
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    /// Simulation time at which the group was constructed, in milliseconds
    pub constructed_time: i64,
    /// Simulation time at which the group was closed, in milliseconds
    ///
    /// Zero when the group was still open at the end of the run.
    pub closed_time: i64,
    /// The group capacity, in millisatoshi
    pub capacity: i64,
    /// Capacity-utilization estimate of the group
    ///
    /// Only meaningful while the group is open.
    pub cul: f64,
}

impl GroupRecord {
    /// Whether the group was still open at the end of the run
    pub fn is_open(&self) -> bool {
        self.closed_time == 0
    }

    /// The lifetime of a closed group, in milliseconds
    ///
    /// `None` for open groups and for records whose close precedes their
    /// construction, which can only be bad data.
    pub fn survival_time(&self) -> Option<i64> {
        if self.is_open() {
            return None;
        }
        let lifetime = self.closed_time - self.constructed_time;
        (lifetime >= 0).then_some(lifetime)
    }
}

/// Sweep parameters of one run, as key-value pairs from its configuration file
pub type RunConfig = BTreeMap<String, String>;

/// Metrics produced for one run, keyed by metric name
///
/// Keys follow the `<distribution>/<statistic>` convention for distribution
/// statistics, for example `time/average` or `fee/95-percentile`. Rates and
/// counts use a bare name such as `success_rate`.
pub type RunMetrics = BTreeMap<String, MetricValue>;

/// A single metric value
///
/// `Empty` marks a statistic that is undefined for the run, for example a
/// percentile over a run with zero successful payments. It renders as an empty
/// cell in tabular output and serializes as JSON `null`, keeping "no value"
/// distinct from any fabricated zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Empty,
}

impl MetricValue {
    /// Whether this is the empty marker
    pub fn is_empty(&self) -> bool {
        matches!(self, MetricValue::Empty)
    }

    /// The numeric value, if there is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(value) => Some(*value as f64),
            MetricValue::Float(value) => Some(*value),
            MetricValue::Empty => None,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(value) => write!(f, "{value}"),
            MetricValue::Float(value) => write!(f, "{value}"),
            MetricValue::Empty => Ok(()),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            MetricValue::Int(value) => serializer.serialize_i64(*value),
            MetricValue::Float(value) => serializer.serialize_f64(*value),
            MetricValue::Empty => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Int(value)) => MetricValue::Int(value),
            Some(Raw::Float(value)) => MetricValue::Float(value),
            None => MetricValue::Empty,
        })
    }
}

/// The full reduction of one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRow {
    /// The run identifier
    ///
    /// This is the run directory's path relative to the sweep root, so it is
    /// unique within a sweep and stable across re-runs of the summariser.
    pub run: String,
    /// The sweep parameters the run was configured with
    pub config: RunConfig,
    /// The metrics produced for the run
    pub metrics: RunMetrics,
}

impl SummaryRow {
    /// Create a new summary row
    pub fn new(run: String, config: RunConfig, metrics: RunMetrics) -> Self {
        Self {
            run,
            config,
            metrics,
        }
    }
}

/// Serialize the run report to a writer
pub fn store_run_report<W: Write>(report: &SummaryRow, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Load a run report from a reader
pub fn load_run_report<R: Read>(reader: R) -> anyhow::Result<SummaryRow> {
    let reader = std::io::BufReader::new(reader);
    let report: SummaryRow = serde_json::from_reader(reader)?;
    Ok(report)
}

/// Write the run report to a file, replacing any previous report
///
/// The recommended location is [RUN_REPORT_FILE_NAME] inside the run directory
/// the report was produced from.
pub fn write_run_report(report: &SummaryRow, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path)?;
    store_run_report(report, &mut file)?;
    Ok(())
}
