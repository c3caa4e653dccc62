use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How seconds are rendered for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Decimal hours, e.g. `1.75`
    #[default]
    Decimal,
    /// Hours and minutes, e.g. `1:45`
    Clock,
}

impl TimeFormat {
    pub fn format(self, seconds: u64) -> String {
        match self {
            TimeFormat::Decimal => format_decimal(seconds),
            TimeFormat::Clock => format_clock(seconds),
        }
    }
}

pub fn format_decimal(seconds: u64) -> String {
    format!("{:.2}", seconds as f64 / 3600.0)
}

pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{hours}:{minutes:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decimal_hours() {
        assert_eq!(format_decimal(0), "0.00");
        assert_eq!(format_decimal(5400), "1.50");
        assert_eq!(format_decimal(7200), "2.00");
        assert_eq!(format_decimal(1000), "0.28");
    }

    #[test]
    fn clock_hours() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(59), "0:00");
        assert_eq!(format_clock(2700), "0:45");
        assert_eq!(format_clock(36_660), "10:11");
    }

    #[test]
    fn dispatches_on_variant() {
        assert_eq!(TimeFormat::Clock.format(5400), "1:30");
        assert_eq!(TimeFormat::default().format(5400), "1.50");
    }
}
