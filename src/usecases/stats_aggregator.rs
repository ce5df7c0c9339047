//! Dashboard statistics. Read-only; every field degrades to zero on its own.

use crate::domain::stats::{hours_from_minutes, month_bounds, progress_percentage};
use crate::domain::{DomainError, SessionStatus, StudentStats, TeacherStats, TutoringSession};
use crate::ports::{DirectoryPort, SessionFilter, SessionStore};
use crate::shared::timeout::bounded;
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct StatsAggregator {
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn DirectoryPort>,
    call_timeout: Duration,
}

impl StatsAggregator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn DirectoryPort>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            directory,
            call_timeout,
        }
    }

    pub async fn student_stats(&self, student_id: &str) -> StudentStats {
        let all = SessionFilter::for_student(student_id);
        let completed = all.clone().with_statuses(&[SessionStatus::Completed]);
        let active = all
            .clone()
            .with_statuses(&[SessionStatus::Pending, SessionStatus::Confirmed]);

        let (total, done, minutes, subjects) = tokio::join!(
            self.count(&all),
            self.count(&completed),
            self.completed_minutes(&completed),
            self.distinct(&active, |s| s.subject_id),
        );

        let total_sessions = or_zero("total_sessions", student_id, total);
        let completed_sessions = or_zero("completed_sessions", student_id, done);
        let stats = StudentStats {
            total_sessions,
            completed_sessions,
            total_hours: hours_from_minutes(or_zero("total_hours", student_id, minutes)),
            active_subjects: or_zero("active_subjects", student_id, subjects),
            progress_percentage: progress_percentage(completed_sessions, total_sessions),
        };
        debug!(student_id, ?stats, "student stats computed");
        stats
    }

    pub async fn teacher_stats(&self, teacher_id: &str) -> TeacherStats {
        self.teacher_stats_at(teacher_id, Utc::now().date_naive())
            .await
    }

    /// Same as `teacher_stats`, with monthly income bucketed around `today`.
    pub async fn teacher_stats_at(&self, teacher_id: &str, today: NaiveDate) -> TeacherStats {
        let (month_start, next_month) = month_bounds(today);
        let completed = SessionFilter::for_teacher(teacher_id)
            .with_statuses(&[SessionStatus::Completed]);
        let this_month = completed
            .clone()
            .scheduled_between(month_start, next_month);

        let (income, done, teacher, students) = tokio::join!(
            self.income(&this_month),
            self.count(&completed),
            self.teacher_rating(teacher_id),
            self.distinct(&completed, |s| s.student_id),
        );

        let (rating, total_reviews) = or_zero("rating", teacher_id, teacher);
        let stats = TeacherStats {
            monthly_income: or_zero("monthly_income", teacher_id, income),
            completed_sessions: or_zero("completed_sessions", teacher_id, done),
            rating,
            total_reviews,
            active_students: or_zero("active_students", teacher_id, students),
        };
        debug!(teacher_id, ?stats, "teacher stats computed");
        stats
    }

    async fn count(&self, filter: &SessionFilter) -> Result<u64, DomainError> {
        bounded(
            self.call_timeout,
            "count sessions",
            self.sessions.count_sessions(filter),
        )
        .await
    }

    async fn completed_minutes(&self, filter: &SessionFilter) -> Result<u64, DomainError> {
        let rows = self.select(filter).await?;
        Ok(rows.iter().map(|s| u64::from(s.duration_minutes)).sum())
    }

    async fn income(&self, filter: &SessionFilter) -> Result<f64, DomainError> {
        let rows = self.select(filter).await?;
        // f64 `Sum` yields -0.0 on empty input.
        Ok(rows.iter().fold(0.0, |acc, s| acc + s.price))
    }

    async fn distinct<F>(&self, filter: &SessionFilter, key: F) -> Result<u64, DomainError>
    where
        F: Fn(TutoringSession) -> String,
    {
        let rows = self.select(filter).await?;
        let keys: HashSet<String> = rows.into_iter().map(key).collect();
        Ok(keys.len() as u64)
    }

    async fn teacher_rating(&self, teacher_id: &str) -> Result<(f64, u64), DomainError> {
        let teacher = bounded(
            self.call_timeout,
            "get teacher",
            self.directory.get_teacher(teacher_id),
        )
        .await?;
        Ok(teacher
            .map(|t| (t.rating, u64::from(t.total_reviews)))
            .unwrap_or_default())
    }

    async fn select(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<TutoringSession>, DomainError> {
        bounded(
            self.call_timeout,
            "select sessions",
            self.sessions.select_sessions(filter),
        )
        .await
    }
}

/// A failed read contributes zero to its field and nothing else.
fn or_zero<T: Default>(field: &str, owner: &str, res: Result<T, DomainError>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => {
            warn!(field, owner, error = %e, "stats read failed; reporting zero");
            T::default()
        }
    }
}
