//! Inbound port. HTTP and CLI adapters call into the application through this.

use crate::domain::{
    AuthSession, DomainError, NewTutoringRequest, Notification, RegisterData, SessionBooking,
    SessionDetails, SessionStatus, StudentStats, Subject, Teacher, TeacherStats, TutoringRequest,
    TutoringSession, UserProfile, UserSettings,
};

/// Use-case facade. Every operation returns its error as a value; nothing panics across it.
#[async_trait::async_trait]
pub trait TutoringApi: Send + Sync {
    // Request lifecycle
    async fn submit_request(
        &self,
        request: NewTutoringRequest,
    ) -> Result<TutoringRequest, DomainError>;

    async fn accept_request(
        &self,
        request_id: &str,
        details: SessionDetails,
    ) -> Result<TutoringSession, DomainError>;

    async fn reject_request(&self, request_id: &str) -> Result<TutoringRequest, DomainError>;

    async fn expire_overdue_requests(&self) -> Result<u64, DomainError>;

    async fn pending_requests(&self, teacher_id: &str)
    -> Result<Vec<TutoringRequest>, DomainError>;

    // Sessions and dashboard
    async fn student_sessions(
        &self,
        student_id: &str,
    ) -> Result<Vec<TutoringSession>, DomainError>;

    async fn teacher_sessions(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringSession>, DomainError>;

    /// Book a session directly; it starts `pending`.
    async fn book_session(&self, booking: SessionBooking) -> Result<TutoringSession, DomainError>;

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<TutoringSession, DomainError>;

    async fn student_stats(&self, student_id: &str) -> StudentStats;

    async fn teacher_stats(&self, teacher_id: &str) -> TeacherStats;

    // Catalog
    async fn subjects(&self) -> Result<Vec<Subject>, DomainError>;

    async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError>;

    async fn add_subject(&self, subject: Subject) -> Result<Subject, DomainError>;

    /// Record that an existing teacher offers an existing subject.
    async fn offer_subject(&self, teacher_id: &str, subject_id: &str)
    -> Result<Teacher, DomainError>;

    // Notifications
    async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>, DomainError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), DomainError>;

    // Accounts
    async fn register(&self, data: RegisterData) -> Result<UserProfile, DomainError>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, DomainError>;

    async fn logout(&self, access_token: &str) -> Result<(), DomainError>;

    async fn current_session(&self, access_token: &str)
    -> Result<Option<AuthSession>, DomainError>;

    async fn profile(&self, user_id: &str) -> Result<UserProfile, DomainError>;

    /// Stored settings, or the defaults for a user who never saved any.
    async fn settings(&self, user_id: &str) -> Result<UserSettings, DomainError>;

    async fn update_settings(&self, settings: UserSettings) -> Result<UserSettings, DomainError>;
}
