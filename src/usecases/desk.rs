//! `TutoringDesk`: the one object inbound adapters talk to.
//!
//! Delegates every operation to the service that owns it.

use crate::domain::{
    AuthSession, DomainError, NewTutoringRequest, Notification, RegisterData, SessionBooking,
    SessionDetails, SessionStatus, StudentStats, Subject, Teacher, TeacherStats, TutoringRequest,
    TutoringSession, UserProfile, UserSettings,
};
use crate::ports::{
    AccountStore, DirectoryPort, IdentityPort, NotificationStore, RequestStore, SessionStore,
    TutoringApi,
};
use crate::shared::config::{AppConfig, DEFAULT_REQUEST_TTL_HOURS};
use crate::usecases::{
    AccountService, CatalogService, NotificationService, RequestLifecycle, SessionService,
    StatsAggregator,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Tunables the services need, resolved from `AppConfig`.
#[derive(Debug, Clone, Copy)]
pub struct DeskSettings {
    pub request_ttl: chrono::Duration,
    pub call_timeout: Duration,
    pub notification_limit: u32,
}

impl DeskSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let default_ttl = chrono::Duration::hours(DEFAULT_REQUEST_TTL_HOURS as i64);
        let request_ttl = i64::try_from(cfg.request_ttl_hours_or_default())
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(default_ttl);
        Self {
            request_ttl,
            call_timeout: Duration::from_millis(cfg.store_timeout_ms_or_default()),
            notification_limit: cfg.notification_limit_or_default(),
        }
    }
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct TutoringDesk {
    lifecycle: RequestLifecycle,
    stats: StatsAggregator,
    accounts: AccountService,
    notifications: NotificationService,
    sessions: SessionService,
    catalog: CatalogService,
}

impl TutoringDesk {
    /// Wire every service against one store that implements all store ports.
    pub fn wire<S>(store: Arc<S>, identity: Arc<dyn IdentityPort>, settings: DeskSettings) -> Self
    where
        S: RequestStore + SessionStore + NotificationStore + DirectoryPort + AccountStore + 'static,
    {
        let requests: Arc<dyn RequestStore> = store.clone();
        let sessions: Arc<dyn SessionStore> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store.clone();
        let directory: Arc<dyn DirectoryPort> = store.clone();
        let accounts: Arc<dyn AccountStore> = store;

        Self {
            lifecycle: RequestLifecycle::new(
                requests,
                Arc::clone(&sessions),
                Arc::clone(&notifications),
                Arc::clone(&directory),
                settings.request_ttl,
                settings.call_timeout,
            ),
            stats: StatsAggregator::new(
                Arc::clone(&sessions),
                Arc::clone(&directory),
                settings.call_timeout,
            ),
            accounts: AccountService::new(identity, accounts, settings.call_timeout),
            notifications: NotificationService::new(
                notifications,
                settings.notification_limit,
                settings.call_timeout,
            ),
            sessions: SessionService::new(sessions, settings.call_timeout),
            catalog: CatalogService::new(directory, settings.call_timeout),
        }
    }
}

#[async_trait::async_trait]
impl TutoringApi for TutoringDesk {
    async fn submit_request(
        &self,
        request: NewTutoringRequest,
    ) -> Result<TutoringRequest, DomainError> {
        self.lifecycle.submit(request).await
    }

    async fn accept_request(
        &self,
        request_id: &str,
        details: SessionDetails,
    ) -> Result<TutoringSession, DomainError> {
        self.lifecycle.accept(request_id, details).await
    }

    async fn reject_request(&self, request_id: &str) -> Result<TutoringRequest, DomainError> {
        self.lifecycle.reject(request_id).await
    }

    async fn expire_overdue_requests(&self) -> Result<u64, DomainError> {
        self.lifecycle.expire_overdue(Utc::now()).await
    }

    async fn pending_requests(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringRequest>, DomainError> {
        self.lifecycle.pending_for_teacher(teacher_id).await
    }

    async fn student_sessions(
        &self,
        student_id: &str,
    ) -> Result<Vec<TutoringSession>, DomainError> {
        self.sessions.for_student(student_id).await
    }

    async fn teacher_sessions(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringSession>, DomainError> {
        self.sessions.for_teacher(teacher_id).await
    }

    async fn book_session(&self, booking: SessionBooking) -> Result<TutoringSession, DomainError> {
        self.sessions.book(booking).await
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<TutoringSession, DomainError> {
        self.sessions.advance(session_id, status).await
    }

    async fn student_stats(&self, student_id: &str) -> StudentStats {
        self.stats.student_stats(student_id).await
    }

    async fn teacher_stats(&self, teacher_id: &str) -> TeacherStats {
        self.stats.teacher_stats(teacher_id).await
    }

    async fn subjects(&self) -> Result<Vec<Subject>, DomainError> {
        self.catalog.subjects().await
    }

    async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError> {
        self.catalog.available_teachers(subject_id).await
    }

    async fn add_subject(&self, subject: Subject) -> Result<Subject, DomainError> {
        self.catalog.add_subject(subject).await
    }

    async fn offer_subject(
        &self,
        teacher_id: &str,
        subject_id: &str,
    ) -> Result<Teacher, DomainError> {
        self.catalog.offer_subject(teacher_id, subject_id).await
    }

    async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>, DomainError> {
        self.notifications.for_user(user_id).await
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), DomainError> {
        self.notifications.mark_read(notification_id).await
    }

    async fn register(&self, data: RegisterData) -> Result<UserProfile, DomainError> {
        self.accounts.register(data).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        self.accounts.login(email, password).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), DomainError> {
        self.accounts.logout(access_token).await
    }

    async fn current_session(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthSession>, DomainError> {
        self.accounts.current_session(access_token).await
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile, DomainError> {
        self.accounts.profile(user_id).await
    }

    async fn settings(&self, user_id: &str) -> Result<UserSettings, DomainError> {
        self.accounts.settings(user_id).await
    }

    async fn update_settings(&self, settings: UserSettings) -> Result<UserSettings, DomainError> {
        self.accounts.update_settings(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::identity::MockIdentity;
    use crate::adapters::persistence::MemoryStore;
    use crate::domain::RequestStatus;
    use pretty_assertions::assert_eq;

    fn desk() -> (Arc<MemoryStore>, TutoringDesk) {
        let store = Arc::new(MemoryStore::new());
        let desk = TutoringDesk::wire(
            store.clone(),
            Arc::new(MockIdentity::new()),
            DeskSettings::default(),
        );
        (store, desk)
    }

    #[test]
    fn test_settings_from_config() {
        let cfg = AppConfig {
            request_ttl_hours: Some(48),
            store_timeout_ms: Some(250),
            notification_limit: Some(5),
            ..AppConfig::default()
        };
        let s = DeskSettings::from_config(&cfg);
        assert_eq!(s.request_ttl, chrono::Duration::hours(48));
        assert_eq!(s.call_timeout, Duration::from_millis(250));
        assert_eq!(s.notification_limit, 5);
    }

    #[tokio::test]
    async fn test_submit_accept_then_dashboard_reads() {
        let (store, desk) = desk();
        let req = desk
            .submit_request(NewTutoringRequest {
                student_id: "s1".into(),
                teacher_id: "t1".into(),
                subject_id: "math".into(),
                preferred_date: "2026-03-10".into(),
                preferred_time: "14:00".into(),
                ..NewTutoringRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(desk.pending_requests("t1").await.unwrap().len(), 1);

        let session = desk
            .accept_request(
                &req.id,
                SessionDetails {
                    title: "Limits".into(),
                    scheduled_date: "2026-03-12".into(),
                    start_time: "09:00".into(),
                    end_time: "10:00".into(),
                    ..SessionDetails::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(session.duration_minutes, 60);
        assert!(desk.pending_requests("t1").await.unwrap().is_empty());

        let mine = desk.student_sessions("s1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, SessionStatus::Confirmed);
        assert_eq!(desk.teacher_sessions("t1").await.unwrap().len(), 1);

        let stats = desk.student_stats("s1").await;
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.active_subjects, 1);
        assert_eq!(stats.progress_percentage, 0);

        let stored = store.get_request(&req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
        assert_eq!(desk.notifications("s1").await.unwrap().len(), 1);
        assert_eq!(desk.notifications("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_subject_filter_lists_every_offering_teacher() {
        let (store, desk) = desk();
        for (id, rating, subjects) in [
            ("a", 4.0, vec!["math"]),
            ("b", 4.8, vec!["phys"]),
            ("idle", 5.0, vec![]),
        ] {
            store
                .add_teacher(Teacher {
                    id: id.into(),
                    first_name: id.into(),
                    last_name: String::new(),
                    department: String::new(),
                    specialization: String::new(),
                    bio: String::new(),
                    experience_years: 1,
                    hourly_rate: 25.0,
                    rating,
                    total_reviews: 0,
                    is_verified: false,
                    subject_ids: subjects.into_iter().map(String::from).collect(),
                })
                .await;
        }
        let all = desk.available_teachers(Some("")).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let math = desk.available_teachers(Some("math")).await.unwrap();
        assert_eq!(math.len(), 1);
        assert_eq!(math[0].id, "a");
    }

    #[tokio::test]
    async fn test_booked_session_shows_up_for_both_parties() {
        let (_store, desk) = desk();
        let session = desk
            .book_session(SessionBooking {
                student_id: "s2".into(),
                teacher_id: "t2".into(),
                subject_id: "chem".into(),
                session_details: SessionDetails {
                    title: "Moles".into(),
                    scheduled_date: "2026-05-01".into(),
                    start_time: "08:00".into(),
                    end_time: "08:45".into(),
                    ..SessionDetails::default()
                },
            })
            .await
            .unwrap();
        desk.update_session_status(&session.id, SessionStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(desk.student_sessions("s2").await.unwrap()[0].status, SessionStatus::Confirmed);
        assert_eq!(desk.teacher_sessions("t2").await.unwrap().len(), 1);
        assert!(desk.pending_requests("t2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_added_subject_names_the_request_notification() {
        let (_store, desk) = desk();
        desk.add_subject(Subject {
            id: "chem".into(),
            name: "Organic Chemistry".into(),
            code: "QUI201".into(),
            description: String::new(),
            department: String::new(),
            credits: 3,
        })
        .await
        .unwrap();
        desk.submit_request(NewTutoringRequest {
            student_id: "s3".into(),
            teacher_id: "t3".into(),
            subject_id: "chem".into(),
            preferred_date: "2026-05-04".into(),
            preferred_time: "10:00".into(),
            ..NewTutoringRequest::default()
        })
        .await
        .unwrap();

        let notes = desk.notifications("t3").await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("Organic Chemistry"));
    }
}
