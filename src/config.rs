//! Settings file and command-line overrides.

use crate::error::{HoursError, Result};
use crate::hours::TimeFormat;
use crate::model::EstimationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Gap threshold: `1h`, `45m`, `90s`, a bare number of hours, or humantime text.
    pub duration: String,
    pub min_commit_time: f64,
    pub hours_rounding: f64,
    pub project_startup_time: f64,
    pub words: usize,
    pub show_summary: bool,
    pub time_format: TimeFormat,
    pub include_merges: bool,
    /// 0 picks min(repository count, CPU count).
    pub workers: usize,
    pub fetch_timeout: String,
    pub cache: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            working_directory: None,
            author: None,
            duration: "1h".to_string(),
            min_commit_time: 0.5,
            hours_rounding: 0.25,
            project_startup_time: 0.5,
            words: 50,
            show_summary: true,
            time_format: TimeFormat::Decimal,
            include_merges: true,
            workers: 0,
            fetch_timeout: "60s".to_string(),
            cache: true,
        }
    }
}

impl Settings {
    /// Reads `path`, or the default location when `None`. A missing default
    /// file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("min_commit_time", self.min_commit_time),
            ("hours_rounding", self.hours_rounding),
            ("project_startup_time", self.project_startup_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HoursError::InvalidConfig(format!(
                    "{key} must be a non-negative number of hours, got {value}"
                )));
            }
        }
        parse_gap_duration(&self.duration)?;
        self.fetch_timeout()?;
        Ok(())
    }

    pub fn estimation(&self) -> Result<EstimationConfig> {
        self.validate()?;
        Ok(EstimationConfig {
            gap_threshold_seconds: parse_gap_duration(&self.duration)?,
            min_commit_seconds: hours_to_seconds(self.min_commit_time),
            rounding_increment_hours: self.hours_rounding,
            startup_overhead_hours: self.project_startup_time,
            max_summary_words: self.words,
        })
    }

    pub fn fetch_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(self.fetch_timeout.trim()).map_err(|e| {
            HoursError::InvalidConfig(format!("fetch_timeout '{}': {e}", self.fetch_timeout))
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("githours").join("config.toml"))
}

fn hours_to_seconds(hours: f64) -> u64 {
    (hours * 3600.0).floor() as u64
}

/// `2` and `2h` are hours, `30m` minutes, `90s` seconds; anything else goes
/// through humantime (`1h 30m`).
pub fn parse_gap_duration(input: &str) -> Result<u64> {
    let input = input.trim();
    let invalid = || HoursError::InvalidConfig(format!("duration '{input}' is not a valid duration"));

    let (number, unit_seconds) = match input.char_indices().last() {
        Some((idx, 'h')) => (&input[..idx], 3600.0),
        Some((idx, 'm')) => (&input[..idx], 60.0),
        Some((idx, 's')) => (&input[..idx], 1.0),
        Some(_) => (input, 3600.0),
        None => return Err(invalid()),
    };
    if let Ok(value) = number.trim().parse::<f64>() {
        if value.is_finite() && value >= 0.0 {
            return Ok((value * unit_seconds).floor() as u64);
        }
        return Err(invalid());
    }

    humantime::parse_duration(input)
        .map(|d| d.as_secs())
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_estimation_defaults() {
        let config = Settings::default().estimation().unwrap();
        assert_eq!(config, EstimationConfig::default());
    }

    #[test]
    fn parses_gap_durations() {
        assert_eq!(parse_gap_duration("1h").unwrap(), 3600);
        assert_eq!(parse_gap_duration("1.5").unwrap(), 5400);
        assert_eq!(parse_gap_duration("45m").unwrap(), 2700);
        assert_eq!(parse_gap_duration("90s").unwrap(), 90);
        assert_eq!(parse_gap_duration("1h 30m").unwrap(), 5400);
        assert!(parse_gap_duration("soon").is_err());
        assert!(parse_gap_duration("").is_err());
        assert!(parse_gap_duration("-2h").is_err());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            author = "Ada"
            duration = "2h"
            words = 12
            time_format = "clock"
            "#,
        )
        .unwrap();
        assert_eq!(settings.author.as_deref(), Some("Ada"));
        assert_eq!(settings.time_format, TimeFormat::Clock);
        let config = settings.estimation().unwrap();
        assert_eq!(config.gap_threshold_seconds, 7200);
        assert_eq!(config.max_summary_words, 12);
        assert_eq!(config.min_commit_seconds, 1800);
    }

    #[test]
    fn rejects_negative_hours() {
        let err = Settings::from_toml("hours_rounding = -0.25").unwrap_err();
        assert!(matches!(err, HoursError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = Settings::from_toml(r#"fetch_timeout = "whenever""#).unwrap_err();
        assert!(matches!(err, HoursError::InvalidConfig(_)));
    }

    #[test]
    fn toml_round_trips() {
        let settings = Settings {
            author: Some("Ada".to_string()),
            ..Settings::default()
        };
        let text = settings.to_toml().unwrap();
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }
}
