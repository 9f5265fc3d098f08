use crate::error::RunError;
use cloth_summary_model::{ChannelRecord, EdgeRecord, GroupRecord, PaymentRecord};
use std::fs::File;
use std::path::Path;

pub(crate) const PAYMENTS_FILE_NAME: &str = "payments_output.csv";
pub(crate) const EDGES_FILE_NAME: &str = "edges_output.csv";
pub(crate) const CHANNELS_FILE_NAME: &str = "channels_output.csv";
pub(crate) const GROUPS_FILE_NAME: &str = "groups_output.csv";

/// Header of the column holding a group's close time
const CLOSED_COLUMN: &str = "is_closed(closed_time)";

/// The typed contents of one run directory
///
/// Payments are always produced. The other logs exist only for some routing
/// modes, so their absence is represented rather than treated as an error.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunRecords {
    pub payments: Vec<PaymentRecord>,
    pub edges: Option<Vec<EdgeRecord>>,
    pub channels: Option<Vec<ChannelRecord>>,
    pub groups: Option<Vec<GroupRecord>>,
}

/// Load every log of a run into typed records.
///
/// A row that fails to decode invalidates the whole file load, there are no
/// partial record lists. The caller decides what to do with the run.
pub(crate) fn load_run_records(run_dir: &Path) -> Result<RunRecords, RunError> {
    Ok(RunRecords {
        payments: load_payments(run_dir)?,
        edges: optional(run_dir, EDGES_FILE_NAME, load_edges)?,
        channels: optional(run_dir, CHANNELS_FILE_NAME, load_channels)?,
        groups: optional(run_dir, GROUPS_FILE_NAME, load_groups)?,
    })
}

fn optional<T>(
    run_dir: &Path,
    file: &'static str,
    load: fn(&Path) -> Result<Vec<T>, RunError>,
) -> Result<Option<Vec<T>>, RunError> {
    if run_dir.join(file).is_file() {
        load(run_dir).map(Some)
    } else {
        Ok(None)
    }
}

fn load_payments(run_dir: &Path) -> Result<Vec<PaymentRecord>, RunError> {
    const FILE: &str = PAYMENTS_FILE_NAME;
    let mut reader = open_csv(run_dir, FILE)?;
    let headers = read_headers(&mut reader, FILE)?;

    let amount = column_index(&headers, FILE, "amount")?;
    let start_time = column_index(&headers, FILE, "start_time")?;
    let end_time = column_index(&headers, FILE, "end_time")?;
    let attempts = column_index(&headers, FILE, "attempts")?;
    let no_balance_count = column_index(&headers, FILE, "no_balance_count")?;
    let edge_occupied_count = column_index(&headers, FILE, "edge_occupied_count")?;
    let route = column_index(&headers, FILE, "route")?;
    let total_fee = column_index(&headers, FILE, "total_fee")?;
    let is_success = column_index(&headers, FILE, "is_success")?;
    let timeout_exp = column_index(&headers, FILE, "timeout_exp")?;

    let mut payments = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| RunError::Csv { file: FILE, source })?;
        let fields = FieldReader::new(FILE, &record);

        let payment = PaymentRecord {
            amount: fields.int(amount, "amount")?,
            start_time: fields.int(start_time, "start_time")?,
            end_time: fields.int(end_time, "end_time")?,
            attempts: fields.int(attempts, "attempts")?,
            no_balance_count: fields.int(no_balance_count, "no_balance_count")?,
            edge_occupied_count: fields.int(edge_occupied_count, "edge_occupied_count")?,
            route: parse_route(&fields, route)?,
            total_fee: match fields.raw(total_fee, "total_fee")? {
                "" => None,
                raw => Some(raw.parse().map_err(|_| {
                    fields.error("total_fee", format!("invalid integer `{raw}`"))
                })?),
            },
            is_success: fields.flag(is_success, "is_success")?,
            timeout_exp: fields.flag(timeout_exp, "timeout_exp")?,
        };

        validate_payment(&payment, &fields)?;
        payments.push(payment);
    }

    Ok(payments)
}

fn validate_payment(payment: &PaymentRecord, fields: &FieldReader<'_>) -> Result<(), RunError> {
    if payment.attempts < 1 {
        return Err(fields.error(
            "attempts",
            format!("must be at least 1, found {}", payment.attempts),
        ));
    }
    if payment.no_balance_count < 0 {
        return Err(fields.error(
            "no_balance_count",
            format!("must not be negative, found {}", payment.no_balance_count),
        ));
    }
    if payment.edge_occupied_count < 0 {
        return Err(fields.error(
            "edge_occupied_count",
            format!("must not be negative, found {}", payment.edge_occupied_count),
        ));
    }
    if payment.is_success && payment.route.is_empty() {
        return Err(fields.error("route", "successful payment without a route"));
    }
    if payment.is_success && payment.total_fee.is_none() {
        return Err(fields.error("total_fee", "successful payment without a fee"));
    }
    Ok(())
}

// Older simulator builds wrote the literal `-1` instead of an empty field when
// no route was found.
fn parse_route(fields: &FieldReader<'_>, index: usize) -> Result<Vec<i64>, RunError> {
    let raw = fields.raw(index, "route")?;
    if raw.is_empty() || raw == "-1" {
        return Ok(Vec::new());
    }
    raw.split('-')
        .map(|hop| {
            hop.parse().map_err(|_| {
                fields.error("route", format!("invalid hop id `{hop}` in `{raw}`"))
            })
        })
        .collect()
}

fn load_edges(run_dir: &Path) -> Result<Vec<EdgeRecord>, RunError> {
    const FILE: &str = EDGES_FILE_NAME;
    let mut reader = open_csv(run_dir, FILE)?;
    let headers = read_headers(&mut reader, FILE)?;

    let id = column_index(&headers, FILE, "id")?;
    let group = column_index(&headers, FILE, "group")?;
    let fee_base = column_index(&headers, FILE, "fee_base")?;
    let fee_proportional = column_index(&headers, FILE, "fee_proportional")?;
    let locked = column_index(&headers, FILE, "locked_balance_and_duration")?;

    let mut edges = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| RunError::Csv { file: FILE, source })?;
        let fields = FieldReader::new(FILE, &record);

        edges.push(EdgeRecord {
            id: fields.int(id, "id")?,
            group: match fields.raw(group, "group")? {
                "" | "NULL" => None,
                raw => Some(raw.parse().map_err(|_| {
                    fields.error("group", format!("invalid group id `{raw}`"))
                })?),
            },
            fee_base: fields.int(fee_base, "fee_base")?,
            fee_proportional: fields.int(fee_proportional, "fee_proportional")?,
            locked_balance_and_duration: parse_locked_pairs(&fields, locked)?,
        });
    }

    Ok(edges)
}

// Format: `-`-separated `<balance>x<duration>` pairs, e.g. `100x50-200x10`.
fn parse_locked_pairs(fields: &FieldReader<'_>, index: usize) -> Result<Vec<(i64, i64)>, RunError> {
    const COLUMN: &str = "locked_balance_and_duration";
    let raw = fields.raw(index, COLUMN)?;
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split('-')
        .map(|pair| {
            let invalid =
                || fields.error(COLUMN, format!("invalid `<balance>x<duration>` pair `{pair}`"));
            let (balance, duration) = pair.split_once('x').ok_or_else(invalid)?;
            Ok((
                balance.parse().map_err(|_| invalid())?,
                duration.parse().map_err(|_| invalid())?,
            ))
        })
        .collect()
}

fn load_channels(run_dir: &Path) -> Result<Vec<ChannelRecord>, RunError> {
    const FILE: &str = CHANNELS_FILE_NAME;
    let mut reader = open_csv(run_dir, FILE)?;
    let headers = read_headers(&mut reader, FILE)?;

    let edge1 = column_index(&headers, FILE, "edge1")?;
    let edge2 = column_index(&headers, FILE, "edge2")?;
    let total_lock_time = column_index(&headers, FILE, "total_lock_time")?;

    let mut channels = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| RunError::Csv { file: FILE, source })?;
        let fields = FieldReader::new(FILE, &record);

        channels.push(ChannelRecord {
            edge1: fields.int(edge1, "edge1")?,
            edge2: fields.int(edge2, "edge2")?,
            total_lock_time: fields.int(total_lock_time, "total_lock_time")?,
        });
    }

    Ok(channels)
}

fn load_groups(run_dir: &Path) -> Result<Vec<GroupRecord>, RunError> {
    const FILE: &str = GROUPS_FILE_NAME;
    let mut reader = open_csv(run_dir, FILE)?;
    let headers = read_headers(&mut reader, FILE)?;

    let constructed_time = column_index(&headers, FILE, "constructed_time")?;
    let closed_time = column_index(&headers, FILE, CLOSED_COLUMN)?;
    let capacity = column_index(&headers, FILE, "group_capacity")?;
    let cul = column_index(&headers, FILE, "cul")?;

    let mut groups = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| RunError::Csv { file: FILE, source })?;
        let fields = FieldReader::new(FILE, &record);

        groups.push(GroupRecord {
            constructed_time: fields.int(constructed_time, "constructed_time")?,
            closed_time: fields.int(closed_time, CLOSED_COLUMN)?,
            capacity: fields.int(capacity, "group_capacity")?,
            cul: fields.float(cul, "cul")?,
        });
    }

    Ok(groups)
}

fn open_csv(run_dir: &Path, file: &'static str) -> Result<csv::Reader<File>, RunError> {
    let handle =
        File::open(run_dir.join(file)).map_err(|source| RunError::Io { file, source })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(handle))
}

fn read_headers(
    reader: &mut csv::Reader<File>,
    file: &'static str,
) -> Result<csv::StringRecord, RunError> {
    Ok(reader
        .headers()
        .map_err(|source| RunError::Csv { file, source })?
        .clone())
}

fn column_index(
    headers: &csv::StringRecord,
    file: &'static str,
    column: &'static str,
) -> Result<usize, RunError> {
    headers
        .iter()
        .position(|header| header == column)
        .ok_or(RunError::Schema { file, column })
}

/// Access to one CSV record's fields with located errors
struct FieldReader<'record> {
    file: &'static str,
    line: usize,
    record: &'record csv::StringRecord,
}

impl<'record> FieldReader<'record> {
    fn new(file: &'static str, record: &'record csv::StringRecord) -> Self {
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(0);
        Self { file, line, record }
    }

    fn error(&self, column: &'static str, message: impl Into<String>) -> RunError {
        RunError::Record {
            file: self.file,
            line: self.line,
            column,
            message: message.into(),
        }
    }

    fn raw(&self, index: usize, column: &'static str) -> Result<&str, RunError> {
        self.record
            .get(index)
            .ok_or_else(|| self.error(column, "field is missing"))
    }

    fn int(&self, index: usize, column: &'static str) -> Result<i64, RunError> {
        let raw = self.raw(index, column)?;
        raw.parse()
            .map_err(|_| self.error(column, format!("invalid integer `{raw}`")))
    }

    fn float(&self, index: usize, column: &'static str) -> Result<f64, RunError> {
        let raw = self.raw(index, column)?;
        raw.parse()
            .map_err(|_| self.error(column, format!("invalid number `{raw}`")))
    }

    fn flag(&self, index: usize, column: &'static str) -> Result<bool, RunError> {
        match self.raw(index, column)? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(self.error(column, format!("invalid flag `{other}`, expected 0 or 1"))),
        }
    }
}
