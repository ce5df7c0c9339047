//! Fault-injecting store for use case tests.
//!
//! Wraps a `MemoryStore` and fails selected calls on demand.

use crate::adapters::persistence::MemoryStore;
use crate::domain::{
    DomainError, NewNotification, NewTutoringRequest, NewTutoringSession, Notification,
    RequestStatus, SessionStatus, Subject, Teacher, TutoringRequest, TutoringSession,
    UserProfile, UserSettings,
};
use crate::ports::{
    AccountStore, DirectoryPort, NotificationStore, RequestStore, SessionFilter, SessionStore,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    InsertRequest,
    InsertSession,
    TransitionRequest,
    InsertNotification,
    SelectSessions,
    CountSessions,
    GetTeacher,
    InsertProfile,
    UpsertSettings,
    LinkTeacherSubject,
    /// `get_request` reports `pending` whatever the stored status is,
    /// as a concurrent reader would have seen it before another accept landed.
    StalePendingRead,
    TransitionSession,
    /// `get_session` reports `confirmed` whatever the stored status is.
    StaleConfirmedSession,
    /// Request inserts sleep past any sensible test timeout.
    Slow,
    /// `transition_request` commits, then sleeps past the caller's deadline.
    StallAfterTransition,
}

#[derive(Debug)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<HashSet<Fault>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail(&self, fault: Fault) {
        self.faults.lock().unwrap().insert(fault);
    }

    fn check(&self, fault: Fault) -> Result<(), DomainError> {
        if self.faults.lock().unwrap().contains(&fault) {
            return Err(DomainError::Persistence(format!("injected {:?}", fault)));
        }
        Ok(())
    }

    fn active(&self, fault: Fault) -> bool {
        self.faults.lock().unwrap().contains(&fault)
    }
}

#[async_trait::async_trait]
impl RequestStore for FaultyStore {
    async fn insert_request(
        &self,
        request: &NewTutoringRequest,
        expires_at: DateTime<Utc>,
    ) -> Result<TutoringRequest, DomainError> {
        if self.active(Fault::Slow) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.check(Fault::InsertRequest)?;
        self.inner.insert_request(request, expires_at).await
    }

    async fn get_request(&self, id: &str) -> Result<Option<TutoringRequest>, DomainError> {
        let found = self.inner.get_request(id).await?;
        if self.active(Fault::StalePendingRead) {
            return Ok(found.map(|mut r| {
                r.status = RequestStatus::Pending;
                r
            }));
        }
        Ok(found)
    }

    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, DomainError> {
        self.check(Fault::TransitionRequest)?;
        let changed = self.inner.transition_request(id, from, to).await?;
        if self.active(Fault::StallAfterTransition) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(changed)
    }

    async fn pending_requests_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringRequest>, DomainError> {
        self.inner.pending_requests_for_teacher(teacher_id).await
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check(Fault::TransitionRequest)?;
        self.inner.expire_overdue(now).await
    }
}

#[async_trait::async_trait]
impl SessionStore for FaultyStore {
    async fn insert_session(
        &self,
        session: &NewTutoringSession,
    ) -> Result<TutoringSession, DomainError> {
        self.check(Fault::InsertSession)?;
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<TutoringSession>, DomainError> {
        let session = self.inner.get_session(id).await?;
        if self.active(Fault::StaleConfirmedSession) {
            return Ok(session.map(|mut s| {
                s.status = SessionStatus::Confirmed;
                s
            }));
        }
        Ok(session)
    }

    async fn transition_session(
        &self,
        id: &str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, DomainError> {
        self.check(Fault::TransitionSession)?;
        self.inner.transition_session(id, from, to).await
    }

    async fn select_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<TutoringSession>, DomainError> {
        self.check(Fault::SelectSessions)?;
        self.inner.select_sessions(filter).await
    }

    async fn count_sessions(&self, filter: &SessionFilter) -> Result<u64, DomainError> {
        self.check(Fault::CountSessions)?;
        self.inner.count_sessions(filter).await
    }
}

#[async_trait::async_trait]
impl NotificationStore for FaultyStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, DomainError> {
        self.check(Fault::InsertNotification)?;
        self.inner.insert_notification(notification).await
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError> {
        self.inner.notifications_for_user(user_id, limit).await
    }

    async fn mark_read(&self, id: &str, read_at: DateTime<Utc>) -> Result<bool, DomainError> {
        self.inner.mark_read(id, read_at).await
    }
}

#[async_trait::async_trait]
impl DirectoryPort for FaultyStore {
    async fn subjects(&self) -> Result<Vec<Subject>, DomainError> {
        self.inner.subjects().await
    }

    async fn get_subject(&self, id: &str) -> Result<Option<Subject>, DomainError> {
        self.inner.get_subject(id).await
    }

    async fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, DomainError> {
        self.check(Fault::GetTeacher)?;
        self.inner.get_teacher(id).await
    }

    async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError> {
        self.inner.available_teachers(subject_id).await
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), DomainError> {
        self.inner.upsert_subject(subject).await
    }

    async fn link_teacher_subject(
        &self,
        teacher_id: &str,
        subject_id: &str,
    ) -> Result<(), DomainError> {
        self.check(Fault::LinkTeacherSubject)?;
        self.inner.link_teacher_subject(teacher_id, subject_id).await
    }
}

#[async_trait::async_trait]
impl AccountStore for FaultyStore {
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError> {
        self.check(Fault::InsertProfile)?;
        self.inner.insert_profile(profile).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DomainError> {
        self.inner.get_profile(user_id).await
    }

    async fn upsert_settings(&self, settings: &UserSettings) -> Result<UserSettings, DomainError> {
        self.check(Fault::UpsertSettings)?;
        self.inner.upsert_settings(settings).await
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, DomainError> {
        self.inner.get_settings(user_id).await
    }
}
