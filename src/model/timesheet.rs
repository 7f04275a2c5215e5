use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub id: u64,
    pub user_id: u64,
    pub project_id: Option<u64>,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub start_time: String,
    #[schema(example = "17:30")]
    pub end_time: String,
    pub description: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

pub const TIMESHEET_COLUMNS: &str =
    "id, user_id, project_id, date, start_time, end_time, description, created_at";

/// Start and end of a worked interval on a single day, `end` strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::invalid("endTime must be after startTime"));
        }
        Ok(Self { start, end })
    }

    /// Parses two `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> AppResult<Self> {
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value.trim(), "%H:%M")
                .map_err(|_| AppError::invalid(format!("{field} must be HH:MM")))
        };
        Self::new(parse("startTime", start)?, parse("endTime", end)?)
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Worked hours rounded to two decimals.
    pub fn hours(&self) -> f64 {
        (self.minutes() as f64 / 60.0 * 100.0).round() / 100.0
    }
}

impl Timesheet {
    pub fn hours(&self) -> f64 {
        TimeRange::parse(&self.start_time, &self.end_time)
            .map(|r| r.hours())
            .unwrap_or(0.0)
    }
}

/// Timesheet row plus the derived `hours`.
#[derive(Serialize, ToSchema)]
pub struct TimesheetResponse {
    #[serde(flatten)]
    pub timesheet: Timesheet,
    #[schema(example = 8.5)]
    pub hours: f64,
}

impl From<Timesheet> for TimesheetResponse {
    fn from(timesheet: Timesheet) -> Self {
        let hours = timesheet.hours();
        Self { timesheet, hours }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_hours_from_strings() {
        let range = TimeRange::parse("09:00", "17:30").unwrap();
        assert_eq!(range.minutes(), 510);
        assert_eq!(range.hours(), 8.5);
    }

    #[test]
    fn rounds_to_two_decimals() {
        let range = TimeRange::parse("09:00", "09:20").unwrap();
        assert_eq!(range.hours(), 0.33);
    }

    #[test]
    fn rejects_inverted_or_empty_ranges() {
        assert!(matches!(
            TimeRange::parse("17:00", "09:00"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(TimeRange::parse("09:00", "09:00").is_err());
    }

    #[test]
    fn rejects_malformed_times() {
        let err = TimeRange::parse("9am", "17:00").unwrap_err();
        assert_eq!(err.to_string(), "startTime must be HH:MM");
        assert!(TimeRange::parse("09:00", "25:00").is_err());
    }

    #[test]
    fn unparseable_stored_row_reports_zero_hours() {
        let sheet = Timesheet {
            id: 1,
            user_id: 1,
            project_id: None,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            start_time: "bad".into(),
            end_time: "17:00".into(),
            description: None,
            created_at: NaiveDate::from_ymd_opt(2026, 1, 5)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
        };
        assert_eq!(TimesheetResponse::from(sheet).hours, 0.0);
    }
}
