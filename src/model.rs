use crate::error::{HoursError, Result};
use crate::util::{end_of_day, start_of_day, week_dates};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 1;

/// One commit as delivered by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub message: String,
    /// Calendar date of `timestamp` in the user's local time zone.
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Day,
    Week,
}

/// A single local calendar day or a Monday-to-Sunday week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub kind: WindowKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub dates: Vec<NaiveDate>,
}

impl TimeWindow {
    pub fn day(date: NaiveDate) -> Result<Self> {
        Self::from_dates(WindowKind::Day, vec![date])
    }

    /// The week (Monday 00:00:00 through Sunday 23:59:59 local) containing `date`.
    pub fn week_of(date: NaiveDate) -> Result<Self> {
        Self::from_dates(WindowKind::Week, week_dates(date))
    }

    fn from_dates(kind: WindowKind, dates: Vec<NaiveDate>) -> Result<Self> {
        let (first, last) = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(HoursError::InvalidWindow("window has no dates".to_string())),
        };
        let window = Self {
            kind,
            start: start_of_day(first)?,
            end: end_of_day(last)?,
            dates,
        };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(HoursError::InvalidWindow(format!(
                "start ({}) is not before end ({})",
                self.start, self.end
            )));
        }
        if self.kind == WindowKind::Week && self.dates.len() != 7 {
            return Err(HoursError::InvalidWindow(format!(
                "a week window needs 7 dates, got {}",
                self.dates.len()
            )));
        }
        Ok(())
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp <= self.end
    }

    pub fn contains_date(&self, date: &NaiveDate) -> bool {
        self.dates.contains(date)
    }
}

/// Parameters of the estimator, rounding policy and summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationConfig {
    /// Gaps longer than this are breaks, not continuous work.
    pub gap_threshold_seconds: u64,
    /// Credit for a solo commit or a commit that follows a break.
    pub min_commit_seconds: u64,
    /// 0 disables rounding.
    pub rounding_increment_hours: f64,
    /// Added once to every non-empty repository/day cell.
    pub startup_overhead_hours: f64,
    pub max_summary_words: usize,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            gap_threshold_seconds: 3600,
            min_commit_seconds: 1800,
            rounding_increment_hours: 0.25,
            startup_overhead_hours: 0.5,
            max_summary_words: 50,
        }
    }
}

/// One repository on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryResult {
    pub repository_name: String,
    pub date: NaiveDate,
    pub raw_seconds: u64,
    pub display_seconds: u64,
    pub summary_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub raw_seconds: u64,
    pub display_seconds: u64,
}

impl Totals {
    fn add(&mut self, result: &RepositoryResult) {
        self.raw_seconds += result.raw_seconds;
        self.display_seconds += result.display_seconds;
    }
}

/// Repository x date table of estimated hours.
///
/// Repositories without any activity in the window are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMatrix {
    pub window: TimeWindow,
    pub author: String,
    pub repositories: BTreeMap<String, Vec<RepositoryResult>>,
}

impl ResultMatrix {
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn cell(&self, repository: &str, date: NaiveDate) -> Option<&RepositoryResult> {
        self.repositories
            .get(repository)?
            .iter()
            .find(|result| result.date == date)
    }

    pub fn repository_total(&self, repository: &str) -> Totals {
        let mut totals = Totals::default();
        for result in self.repositories.get(repository).into_iter().flatten() {
            totals.add(result);
        }
        totals
    }

    /// Column totals for every date of the window, in window order.
    pub fn date_totals(&self) -> Vec<(NaiveDate, Totals)> {
        let mut by_date: BTreeMap<NaiveDate, Totals> =
            self.window.dates.iter().map(|d| (*d, Totals::default())).collect();
        for result in self.repositories.values().flatten() {
            by_date.entry(result.date).or_default().add(result);
        }
        by_date.into_iter().collect()
    }

    pub fn grand_total(&self) -> Totals {
        let mut totals = Totals::default();
        for result in self.repositories.values().flatten() {
            totals.add(result);
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellOutput {
    pub date: NaiveDate,
    pub raw_seconds: u64,
    pub display_seconds: u64,
    pub formatted: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowOutput {
    pub repository: String,
    pub cells: Vec<CellOutput>,
    pub total_seconds: u64,
    pub total_formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateTotalOutput {
    pub date: NaiveDate,
    pub display_seconds: u64,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsOutput {
    pub by_date: Vec<DateTotalOutput>,
    pub grand_seconds: u64,
    pub grand_formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowOutput {
    pub kind: WindowKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub author: String,
    pub window: WindowOutput,
    pub rows: Vec<RowOutput>,
    pub totals: TotalsOutput,
}

/// One NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellLine {
    pub repository: String,
    #[serde(flatten)]
    pub cell: CellOutput,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn result(repo: &str, day: &str, raw: u64, display: u64) -> RepositoryResult {
        RepositoryResult {
            repository_name: repo.to_string(),
            date: date(day),
            raw_seconds: raw,
            display_seconds: display,
            summary_text: String::new(),
        }
    }

    #[test]
    fn week_window_has_seven_dates() {
        let window = TimeWindow::week_of(date("2024-03-06")).unwrap();
        assert_eq!(window.kind, WindowKind::Week);
        assert_eq!(window.dates.len(), 7);
        assert!(window.start < window.end);
        assert!(window.contains_date(&date("2024-03-10")));
        assert!(!window.contains_date(&date("2024-03-11")));
    }

    #[test]
    fn validate_rejects_reversed_bounds() {
        let mut window = TimeWindow::day(date("2024-03-06")).unwrap();
        std::mem::swap(&mut window.start, &mut window.end);
        assert!(matches!(window.validate(), Err(HoursError::InvalidWindow(_))));
    }

    #[test]
    fn totals_cover_rows_columns_and_grand() {
        let window = TimeWindow::week_of(date("2024-03-06")).unwrap();
        let mut repositories = BTreeMap::new();
        repositories.insert(
            "api".to_string(),
            vec![
                result("api", "2024-03-04", 1800, 3600),
                result("api", "2024-03-05", 3600, 5400),
            ],
        );
        repositories.insert("web".to_string(), vec![result("web", "2024-03-04", 600, 2700)]);
        let matrix = ResultMatrix {
            window,
            author: "me".to_string(),
            repositories,
        };

        assert_eq!(matrix.repository_total("api").display_seconds, 9000);
        assert_eq!(matrix.repository_total("missing"), Totals::default());

        let columns = matrix.date_totals();
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[0].1.display_seconds, 6300);
        assert_eq!(columns[1].1.raw_seconds, 3600);
        assert_eq!(columns[6].1, Totals::default());

        assert_eq!(
            matrix.grand_total(),
            Totals {
                raw_seconds: 6000,
                display_seconds: 11700
            }
        );
        assert_eq!(matrix.cell("web", date("2024-03-04")).unwrap().raw_seconds, 600);
        assert!(matrix.cell("web", date("2024-03-05")).is_none());
    }
}
