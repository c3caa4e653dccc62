use crate::model::EstimationConfig;

const SECONDS_PER_HOUR: f64 = 3600.0;

// Absorbs float noise such as 0.3 / 0.1 = 2.9999999999999996.
const STEP_EPSILON: f64 = 1e-9;

/// Turns a raw estimate into the seconds shown to the user.
///
/// Rounds up to `rounding_increment_hours`, then adds the startup overhead.
/// Zero stays zero.
pub fn apply(raw_seconds: u64, config: &EstimationConfig) -> u64 {
    if raw_seconds == 0 {
        return 0;
    }

    let mut seconds = raw_seconds;
    if config.rounding_increment_hours > 0.0 {
        seconds = round_up(raw_seconds, config.rounding_increment_hours);
    }
    if config.startup_overhead_hours > 0.0 {
        seconds += (config.startup_overhead_hours * SECONDS_PER_HOUR).floor() as u64;
    }
    seconds
}

fn round_up(raw_seconds: u64, increment_hours: f64) -> u64 {
    let hours = raw_seconds as f64 / SECONDS_PER_HOUR;
    let steps = (hours / increment_hours - STEP_EPSILON).ceil();
    (steps * increment_hours * SECONDS_PER_HOUR).floor() as u64
}
