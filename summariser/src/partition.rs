use cloth_summary_model::GroupRecord;

/// Group records partitioned by lifecycle state
///
/// Closed groups contribute a survival time and open groups contribute their
/// capacity-utilization estimate, and the two must never be mixed in one
/// statistic. A record that claims to have closed before it was constructed
/// is bad data; it is kept out of every partition and counted instead of
/// silently dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct GroupPartition {
    /// Survival time of every validly closed group
    pub survival_times: Vec<f64>,
    /// Capacity of every valid group, open or closed
    pub capacities: Vec<f64>,
    /// Capacity-utilization estimate of every open group
    pub culs: Vec<f64>,
    /// Number of records excluded as bad data
    pub malformed: usize,
}

pub(crate) fn partition_groups(groups: &[GroupRecord]) -> GroupPartition {
    let mut partition = GroupPartition::default();

    for group in groups {
        if group.is_open() {
            partition.culs.push(group.cul);
            partition.capacities.push(group.capacity as f64);
        } else if let Some(survival_time) = group.survival_time() {
            partition.survival_times.push(survival_time as f64);
            partition.capacities.push(group.capacity as f64);
        } else {
            partition.malformed += 1;
        }
    }

    partition
}
