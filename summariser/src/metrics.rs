use crate::analyze::{insert_distribution_stats, DistributionStats};
use crate::error::RunError;
use crate::loader::RunRecords;
use crate::partition::{partition_groups, GroupPartition};
use cloth_summary_model::{MetricValue, PaymentOutcome, PaymentRecord, RunMetrics};

type Extract = fn(&RunRecords, Option<&GroupPartition>) -> Option<Vec<f64>>;

/// The distribution families, keyed by metric name
///
/// Each extractor returns the family's value sequence, or `None` when the run
/// never produced the records the family is built from. A missing family is
/// left out of the run's metrics entirely while an empty one is reported as
/// empty markers; the summary table's column union absorbs the difference
/// between runs. New families are added here, nowhere else.
const DISTRIBUTIONS: &[(&str, Extract)] = &[
    ("time", |records, _| {
        Some(records.payments.iter().map(|p| p.elapsed() as f64).collect())
    }),
    ("time_success", |records, _| {
        Some(successes(records).map(|p| p.elapsed() as f64).collect())
    }),
    ("time_fail", |records, _| {
        Some(
            records
                .payments
                .iter()
                .filter(|p| !p.is_success)
                .map(|p| p.elapsed() as f64)
                .collect(),
        )
    }),
    ("retry", |records, _| {
        Some(successes(records).map(|p| p.retries() as f64).collect())
    }),
    ("fee", |records, _| {
        Some(
            successes(records)
                .filter_map(|p| p.total_fee)
                .map(|fee| fee as f64)
                .collect(),
        )
    }),
    ("fee_per_amount", |records, _| {
        Some(
            successes(records)
                .filter(|p| p.amount > 0)
                .filter_map(|p| p.total_fee.map(|fee| fee as f64 / p.amount as f64))
                .collect(),
        )
    }),
    ("route_len", |records, _| {
        Some(successes(records).map(|p| p.route.len() as f64).collect())
    }),
    ("group_survival_time", |_, groups| {
        groups.map(|partition| partition.survival_times.clone())
    }),
    ("group_capacity", |_, groups| {
        groups.map(|partition| partition.capacities.clone())
    }),
    ("cul", |_, groups| groups.map(|partition| partition.culs.clone())),
    ("total_locked_balance_duration", |records, _| {
        records.edges.as_ref().map(|edges| {
            edges
                .iter()
                .filter(|edge| !edge.locked_balance_and_duration.is_empty())
                .map(|edge| edge.total_locked_balance_duration() as f64)
                .collect()
        })
    }),
    ("total_channel_locked_time", |records, _| {
        records.channels.as_ref().map(|channels| {
            channels
                .iter()
                .map(|channel| channel.total_lock_time as f64)
                .collect()
        })
    }),
];

fn successes(records: &RunRecords) -> impl Iterator<Item = &PaymentRecord> {
    records.payments.iter().filter(|payment| payment.is_success)
}

/// Reduce one run's records to its flat metric map.
///
/// Fails with [RunError::EmptyRun] when the run has no payment records at
/// all; a rate over zero payments would otherwise silently come out as 0.
pub(crate) fn compute_run_metrics(records: &RunRecords) -> Result<RunMetrics, RunError> {
    if records.payments.is_empty() {
        return Err(RunError::EmptyRun);
    }

    let groups = records.groups.as_deref().map(partition_groups);

    let mut metrics = RunMetrics::new();
    insert_rate_metrics(&mut metrics, records);
    for (name, extract) in DISTRIBUTIONS {
        if let Some(values) = extract(records, groups.as_ref()) {
            insert_distribution_stats(
                &mut metrics,
                name,
                DistributionStats::from_values(&values).as_ref(),
            );
        }
    }
    insert_group_metrics(&mut metrics, records, groups.as_ref());
    insert_channel_metrics(&mut metrics, records);

    Ok(metrics)
}

fn insert_rate_metrics(metrics: &mut RunMetrics, records: &RunRecords) {
    let total = records.payments.len() as f64;

    let mut success = 0usize;
    let mut no_path = 0usize;
    let mut timeout = 0usize;
    let mut no_alternative = 0usize;
    for payment in &records.payments {
        match payment.outcome() {
            PaymentOutcome::Success => success += 1,
            PaymentOutcome::FailNoPath => no_path += 1,
            PaymentOutcome::FailTimeout => timeout += 1,
            PaymentOutcome::FailNoAlternativePath => no_alternative += 1,
        }
    }

    let rate = |count: usize| MetricValue::Float(count as f64 / total);
    metrics.insert("success_rate".to_string(), rate(success));
    metrics.insert(
        "fail_rate".to_string(),
        rate(no_path + timeout + no_alternative),
    );
    metrics.insert("fail_no_path_rate".to_string(), rate(no_path));
    metrics.insert("fail_timeout_rate".to_string(), rate(timeout));
    metrics.insert(
        "fail_no_alternative_path_rate".to_string(),
        rate(no_alternative),
    );

    // Retries can happen several times within one payment, so these are
    // normalized per attempt rather than per payment
    let attempts: i64 = records.payments.iter().map(|p| p.attempts).sum();
    let retries: i64 = records.payments.iter().map(|p| p.retries()).sum();
    let no_balance: i64 = records.payments.iter().map(|p| p.no_balance_count).sum();
    let edge_occupied: i64 = records.payments.iter().map(|p| p.edge_occupied_count).sum();

    let per_attempt = |count: i64| MetricValue::Float(count as f64 / attempts as f64);
    metrics.insert("retry_rate".to_string(), per_attempt(retries));
    metrics.insert("retry_no_balance_rate".to_string(), per_attempt(no_balance));
    metrics.insert(
        "retry_edge_occupied_rate".to_string(),
        per_attempt(edge_occupied),
    );
}

fn insert_group_metrics(
    metrics: &mut RunMetrics,
    records: &RunRecords,
    groups: Option<&GroupPartition>,
) {
    let Some(partition) = groups else {
        return;
    };

    if partition.malformed > 0 {
        log::warn!(
            "Excluded {} malformed group records from the group statistics",
            partition.malformed
        );
    }
    metrics.insert(
        "group_malformed_count".to_string(),
        MetricValue::Int(partition.malformed as i64),
    );

    let cover_rate = records.edges.as_ref().and_then(|edges| {
        if edges.is_empty() {
            return None;
        }
        let grouped = edges.iter().filter(|edge| edge.group.is_some()).count();
        Some(grouped as f64 / edges.len() as f64)
    });
    metrics.insert(
        "group_cover_rate".to_string(),
        cover_rate.map(MetricValue::Float).unwrap_or(MetricValue::Empty),
    );
}

fn insert_channel_metrics(metrics: &mut RunMetrics, records: &RunRecords) {
    let Some(channels) = &records.channels else {
        return;
    };

    // The wall-clock span the run actually covered
    let simulation_duration = records.payments.iter().map(|p| p.end_time).max().unwrap_or(0);

    let ratio = if channels.is_empty() || simulation_duration <= 0 {
        MetricValue::Empty
    } else {
        let mean_lock_time = channels
            .iter()
            .map(|channel| channel.total_lock_time as f64)
            .sum::<f64>()
            / channels.len() as f64;
        MetricValue::Float(mean_lock_time / simulation_duration as f64)
    };
    metrics.insert("channel_locked_time_ratio".to_string(), ratio);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloth_summary_model::{ChannelRecord, EdgeRecord, GroupRecord};

    fn success(start_time: i64, end_time: i64, attempts: i64, fee: i64) -> PaymentRecord {
        PaymentRecord {
            amount: 1000,
            start_time,
            end_time,
            attempts,
            no_balance_count: 0,
            edge_occupied_count: 0,
            route: vec![1, 2],
            total_fee: Some(fee),
            is_success: true,
            timeout_exp: false,
        }
    }

    fn failure(start_time: i64, end_time: i64, outcome: PaymentOutcome) -> PaymentRecord {
        let (attempts, route, timeout_exp) = match outcome {
            PaymentOutcome::FailNoPath => (1, vec![], false),
            PaymentOutcome::FailTimeout => (3, vec![1, 2], true),
            PaymentOutcome::FailNoAlternativePath => (3, vec![1, 2], false),
            PaymentOutcome::Success => panic!("Not a failure"),
        };
        PaymentRecord {
            amount: 1000,
            start_time,
            end_time,
            attempts,
            no_balance_count: 0,
            edge_occupied_count: 0,
            route,
            total_fee: None,
            is_success: false,
            timeout_exp,
        }
    }

    fn edge(id: i64, group: Option<i64>) -> EdgeRecord {
        EdgeRecord {
            id,
            group,
            fee_base: 1000,
            fee_proportional: 10,
            locked_balance_and_duration: Vec::new(),
        }
    }

    fn group(constructed_time: i64, closed_time: i64, capacity: i64, cul: f64) -> GroupRecord {
        GroupRecord {
            constructed_time,
            closed_time,
            capacity,
            cul,
        }
    }

    fn payments_only(payments: Vec<PaymentRecord>) -> RunRecords {
        RunRecords {
            payments,
            ..RunRecords::default()
        }
    }

    #[test]
    fn test_outcome_rates() -> anyhow::Result<()> {
        let mut payments: Vec<_> = [10, 20, 30, 40, 50, 60]
            .into_iter()
            .map(|end_time| success(0, end_time, 1, 5))
            .collect();
        payments.push(failure(0, 70, PaymentOutcome::FailNoPath));
        // A payment that found no route on its single attempt counts as
        // fail_no_path even when its timeout also expired
        let mut ambiguous = failure(0, 80, PaymentOutcome::FailNoPath);
        ambiguous.timeout_exp = true;
        payments.push(ambiguous);
        payments.push(failure(0, 90, PaymentOutcome::FailTimeout));
        payments.push(failure(0, 100, PaymentOutcome::FailNoAlternativePath));

        let metrics = compute_run_metrics(&payments_only(payments))?;

        assert_eq!(metrics["success_rate"], MetricValue::Float(0.6));
        assert_eq!(metrics["fail_rate"], MetricValue::Float(0.4));
        assert_eq!(metrics["fail_no_path_rate"], MetricValue::Float(0.2));
        assert_eq!(metrics["fail_timeout_rate"], MetricValue::Float(0.1));
        assert_eq!(
            metrics["fail_no_alternative_path_rate"],
            MetricValue::Float(0.1)
        );
        assert_eq!(metrics["time/average"], MetricValue::Float(55.0));
        assert_eq!(metrics["time_success/average"], MetricValue::Float(35.0));
        assert_eq!(metrics["time_fail/average"], MetricValue::Float(85.0));
        assert_eq!(metrics["fee/average"], MetricValue::Float(5.0));
        assert_eq!(metrics["route_len/average"], MetricValue::Float(2.0));
        assert_eq!(metrics["retry/average"], MetricValue::Float(0.0));
        Ok(())
    }

    #[test]
    fn test_rates_partition_payments() -> anyhow::Result<()> {
        let payments = vec![
            success(0, 10, 2, 5),
            failure(0, 20, PaymentOutcome::FailNoPath),
            failure(0, 30, PaymentOutcome::FailTimeout),
            failure(0, 40, PaymentOutcome::FailTimeout),
            failure(0, 50, PaymentOutcome::FailNoAlternativePath),
            success(0, 60, 1, 5),
            success(0, 70, 4, 5),
        ];
        let metrics = compute_run_metrics(&payments_only(payments))?;

        let sum: f64 = [
            "success_rate",
            "fail_no_path_rate",
            "fail_timeout_rate",
            "fail_no_alternative_path_rate",
        ]
        .iter()
        .map(|key| metrics[*key].as_f64().unwrap())
        .sum();
        assert!((sum - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_retry_rates_are_per_attempt() -> anyhow::Result<()> {
        let mut first = success(0, 10, 4, 5);
        first.no_balance_count = 2;
        first.edge_occupied_count = 1;
        let second = success(0, 10, 1, 5);

        let metrics = compute_run_metrics(&payments_only(vec![first, second]))?;

        // 5 attempts in total, 3 of them retries
        assert_eq!(metrics["retry_rate"], MetricValue::Float(0.6));
        assert_eq!(metrics["retry_no_balance_rate"], MetricValue::Float(0.4));
        assert_eq!(metrics["retry_edge_occupied_rate"], MetricValue::Float(0.2));
        Ok(())
    }

    #[test]
    fn test_empty_run_is_an_error() {
        let result = compute_run_metrics(&payments_only(Vec::new()));
        assert!(matches!(result, Err(RunError::EmptyRun)));
    }

    #[test]
    fn test_no_successes_leaves_success_stats_empty() -> anyhow::Result<()> {
        let metrics = compute_run_metrics(&payments_only(vec![failure(
            0,
            100,
            PaymentOutcome::FailTimeout,
        )]))?;

        assert_eq!(metrics["success_rate"], MetricValue::Float(0.0));
        // The keys exist, the values are the empty marker
        assert_eq!(metrics["time_success/average"], MetricValue::Empty);
        assert_eq!(metrics["fee/50-percentile"], MetricValue::Empty);
        assert_eq!(metrics["time_fail/average"], MetricValue::Float(100.0));
        Ok(())
    }

    #[test]
    fn test_absent_logs_produce_no_keys() -> anyhow::Result<()> {
        let metrics = compute_run_metrics(&payments_only(vec![success(0, 10, 1, 5)]))?;

        assert!(!metrics.contains_key("group_survival_time/average"));
        assert!(!metrics.contains_key("cul/average"));
        assert!(!metrics.contains_key("group_cover_rate"));
        assert!(!metrics.contains_key("group_malformed_count"));
        assert!(!metrics.contains_key("total_locked_balance_duration/average"));
        assert!(!metrics.contains_key("total_channel_locked_time/average"));
        assert!(!metrics.contains_key("channel_locked_time_ratio"));
        Ok(())
    }

    #[test]
    fn test_group_metrics() -> anyhow::Result<()> {
        let records = RunRecords {
            payments: vec![success(0, 10, 1, 5)],
            edges: Some(vec![
                edge(0, Some(1)),
                edge(1, Some(1)),
                edge(2, None),
                edge(3, None),
            ]),
            channels: None,
            groups: Some(vec![
                group(100, 500, 10000, 0.0),
                group(200, 0, 20000, 0.5),
                group(900, 300, 30000, 0.25),
            ]),
        };

        let metrics = compute_run_metrics(&records)?;

        assert_eq!(metrics["group_cover_rate"], MetricValue::Float(0.5));
        assert_eq!(metrics["group_malformed_count"], MetricValue::Int(1));
        assert_eq!(
            metrics["group_survival_time/average"],
            MetricValue::Float(400.0)
        );
        // Valid groups only, the malformed record's capacity is excluded
        assert_eq!(metrics["group_capacity/average"], MetricValue::Float(15000.0));
        assert_eq!(metrics["cul/average"], MetricValue::Float(0.5));
        Ok(())
    }

    #[test]
    fn test_group_cover_rate_without_edges() -> anyhow::Result<()> {
        let records = RunRecords {
            payments: vec![success(0, 10, 1, 5)],
            groups: Some(vec![group(100, 500, 10000, 0.0)]),
            ..RunRecords::default()
        };

        let metrics = compute_run_metrics(&records)?;
        assert_eq!(metrics["group_cover_rate"], MetricValue::Empty);
        Ok(())
    }

    #[test]
    fn test_channel_metrics() -> anyhow::Result<()> {
        let channel = |total_lock_time| ChannelRecord {
            edge1: 0,
            edge2: 1,
            total_lock_time,
        };
        let records = RunRecords {
            payments: vec![success(0, 1000, 1, 5)],
            channels: Some(vec![channel(100), channel(300)]),
            ..RunRecords::default()
        };

        let metrics = compute_run_metrics(&records)?;

        assert_eq!(
            metrics["total_channel_locked_time/average"],
            MetricValue::Float(200.0)
        );
        // Mean lock time over the time span the run covered
        assert_eq!(metrics["channel_locked_time_ratio"], MetricValue::Float(0.2));
        Ok(())
    }

    #[test]
    fn test_channel_ratio_empty_for_empty_channel_log() -> anyhow::Result<()> {
        let records = RunRecords {
            payments: vec![success(0, 1000, 1, 5)],
            channels: Some(Vec::new()),
            ..RunRecords::default()
        };

        let metrics = compute_run_metrics(&records)?;
        assert_eq!(metrics["channel_locked_time_ratio"], MetricValue::Empty);
        assert_eq!(
            metrics["total_channel_locked_time/average"],
            MetricValue::Empty
        );
        Ok(())
    }

    #[test]
    fn test_fee_per_amount_skips_zero_amounts() -> anyhow::Result<()> {
        let mut zero_amount = success(0, 10, 1, 5);
        zero_amount.amount = 0;
        let mut paying = success(0, 10, 1, 30);
        paying.amount = 300;

        let metrics = compute_run_metrics(&payments_only(vec![zero_amount, paying]))?;
        assert_eq!(metrics["fee_per_amount/average"], MetricValue::Float(0.1));
        Ok(())
    }

    #[test]
    fn test_locked_balance_duration_over_edges_with_history() -> anyhow::Result<()> {
        let mut busy = edge(0, None);
        busy.locked_balance_and_duration = vec![(100, 50), (200, 10)];
        let idle = edge(1, None);
        let records = RunRecords {
            payments: vec![success(0, 10, 1, 5)],
            edges: Some(vec![busy, idle]),
            ..RunRecords::default()
        };

        let metrics = compute_run_metrics(&records)?;

        // Only the edge with a locked-balance history contributes
        assert_eq!(
            metrics["total_locked_balance_duration/average"],
            MetricValue::Float(7000.0)
        );
        // No groups log, so no group metrics either
        assert!(!metrics.contains_key("group_cover_rate"));
        Ok(())
    }
}
