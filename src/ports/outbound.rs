//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters (libsql, in-memory, hosted identity service).

use crate::domain::{
    AuthSession, AuthUser, DomainError, NewNotification, NewTutoringRequest, NewTutoringSession,
    Notification, RequestStatus, SessionStatus, Subject, Teacher, TutoringRequest,
    TutoringSession, UserProfile, UserSettings,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Request store. Requests are never deleted; their lifecycle lives in `status`.
#[async_trait::async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert with status `pending`. The store assigns `id` and `created_at`.
    async fn insert_request(
        &self,
        request: &NewTutoringRequest,
        expires_at: DateTime<Utc>,
    ) -> Result<TutoringRequest, DomainError>;

    async fn get_request(&self, id: &str) -> Result<Option<TutoringRequest>, DomainError>;

    /// Conditional update: set `to` only where the current status is `from`.
    /// Returns true when exactly one row changed.
    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, DomainError>;

    /// Pending requests addressed to a teacher, newest first.
    async fn pending_requests_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringRequest>, DomainError>;

    /// Move every pending request with `expires_at <= now` to `expired`. Returns the count.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}

/// Filter for session reads and counts. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub student_id: Option<String>,
    pub teacher_id: Option<String>,
    /// Empty means any status.
    pub statuses: Vec<SessionStatus>,
    /// Inclusive lower bound on `scheduled_date`.
    pub scheduled_from: Option<NaiveDate>,
    /// Exclusive upper bound on `scheduled_date`.
    pub scheduled_before: Option<NaiveDate>,
}

impl SessionFilter {
    pub fn for_student(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_teacher(teacher_id: &str) -> Self {
        Self {
            teacher_id: Some(teacher_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[SessionStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn scheduled_between(mut self, from: NaiveDate, before: NaiveDate) -> Self {
        self.scheduled_from = Some(from);
        self.scheduled_before = Some(before);
        self
    }

    /// In-process evaluation, shared by stores that cannot push the filter down.
    pub fn matches(&self, session: &TutoringSession) -> bool {
        if let Some(ref s) = self.student_id {
            if &session.student_id != s {
                return false;
            }
        }
        if let Some(ref t) = self.teacher_id {
            if &session.teacher_id != t {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&session.status) {
            return false;
        }
        let date = session.scheduled_date.as_str();
        if let Some(from) = self.scheduled_from {
            if date < from.format("%Y-%m-%d").to_string().as_str() {
                return false;
            }
        }
        if let Some(before) = self.scheduled_before {
            if date >= before.format("%Y-%m-%d").to_string().as_str() {
                return false;
            }
        }
        true
    }
}

/// Session store. Sessions are kept indefinitely for statistics.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(
        &self,
        session: &NewTutoringSession,
    ) -> Result<TutoringSession, DomainError>;

    async fn get_session(&self, id: &str) -> Result<Option<TutoringSession>, DomainError>;

    /// Conditional update: set `to` only where the current status is `from`.
    /// Returns true when exactly one row changed.
    async fn transition_session(
        &self,
        id: &str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, DomainError>;

    /// Matching sessions ordered by `scheduled_date` ascending.
    async fn select_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<TutoringSession>, DomainError>;

    async fn count_sessions(&self, filter: &SessionFilter) -> Result<u64, DomainError>;
}

/// Notification store.
#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, DomainError>;

    /// Newest first, at most `limit`.
    async fn notifications_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError>;

    /// Flip the read flag. Returns false when no notification has that id.
    async fn mark_read(&self, id: &str, read_at: DateTime<Utc>) -> Result<bool, DomainError>;
}

/// Read-side catalog: subjects and the teacher directory.
#[async_trait::async_trait]
pub trait DirectoryPort: Send + Sync {
    /// All subjects ordered by name.
    async fn subjects(&self) -> Result<Vec<Subject>, DomainError>;

    async fn get_subject(&self, id: &str) -> Result<Option<Subject>, DomainError>;

    async fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, DomainError>;

    /// Teachers offering at least one subject, ordered by rating descending.
    /// With `subject_id`, only those offering that subject.
    async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError>;

    /// Insert a subject or replace the one with the same id.
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), DomainError>;

    /// Record that a teacher offers a subject. Repeating a link is a no-op.
    async fn link_teacher_subject(
        &self,
        teacher_id: &str,
        subject_id: &str,
    ) -> Result<(), DomainError>;
}

/// Profiles and per-user settings.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DomainError>;

    /// Insert or replace. Returns the stored row.
    async fn upsert_settings(&self, settings: &UserSettings) -> Result<UserSettings, DomainError>;

    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, DomainError>;
}

/// Hosted identity service (sign-up / password sign-in / sessions).
/// Sessions are addressed by access token; implementations keep no "current user".
#[async_trait::async_trait]
pub trait IdentityPort: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<AuthUser, DomainError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, DomainError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), DomainError>;

    /// The session behind `access_token`; `None` when the token is unknown or expired.
    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, DomainError>;
}
