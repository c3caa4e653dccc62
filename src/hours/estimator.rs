use crate::model::{CommitEvent, EstimationConfig};

/// Estimates raw working seconds for one repository on one calendar date.
///
/// Consecutive commits closer than `gap_threshold_seconds` count as
/// continuous work; anything else (a break, or a non-positive interval from
/// out-of-order timestamps) is credited `min_commit_seconds`. A solo commit is
/// credited `min_commit_seconds`.
pub fn estimate(events: &[CommitEvent], config: &EstimationConfig) -> u64 {
    match events {
        [] => 0,
        [_] => config.min_commit_seconds,
        _ => events
            .windows(2)
            .map(|pair| {
                let interval = (pair[1].timestamp - pair[0].timestamp).num_seconds();
                gap_credit(interval, config)
            })
            .sum(),
    }
}

fn gap_credit(interval: i64, config: &EstimationConfig) -> u64 {
    match u64::try_from(interval) {
        Ok(secs) if secs > 0 && secs <= config.gap_threshold_seconds => secs,
        _ => config.min_commit_seconds,
    }
}
