//! Dashboard rollups. The numbers only; reading the sessions is the aggregator's job.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub total_hours: u64,
    pub active_subjects: u64,
    pub progress_percentage: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherStats {
    pub monthly_income: f64,
    pub completed_sessions: u64,
    pub rating: f64,
    pub total_reviews: u64,
    pub active_students: u64,
}

/// Whole hours from minutes, rounding half up (90 min -> 2 h, 89 min -> 1 h).
pub fn hours_from_minutes(total_minutes: u64) -> u64 {
    (total_minutes + 30) / 60
}

/// `round(completed / total * 100)`, or 0 when there are no sessions.
pub fn progress_percentage(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (completed * 100 + total / 2) / total
}

/// Half-open calendar range `[first of month, first of next month)` containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    let end = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(start);
    (start, end)
}
