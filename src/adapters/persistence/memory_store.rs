//! In-process store. Implements every store port over maps behind one RwLock.
//!
//! Used for `--ephemeral` runs and as the base of test fakes. Semantics match
//! `SqliteStore`: conditional transitions, newest-first notifications, date-ordered sessions.

use crate::domain::{
    DomainError, NewNotification, NewTutoringRequest, NewTutoringSession, Notification,
    RequestStatus, RoleProfile, SessionStatus, Subject, Teacher, TutoringRequest,
    TutoringSession, UserProfile, UserSettings,
};
use crate::ports::{
    AccountStore, DirectoryPort, NotificationStore, RequestStore, SessionFilter, SessionStore,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    requests: HashMap<String, TutoringRequest>,
    sessions: Vec<TutoringSession>,
    notifications: Vec<Notification>,
    subjects: HashMap<String, Subject>,
    teachers: HashMap<String, Teacher>,
    profiles: HashMap<String, UserProfile>,
    settings: HashMap<String, UserSettings>,
}

/// Memory-backed store. Safe to share via Arc.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    /// Successful mutating calls (inserts and updates that changed something).
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn add_subject(&self, subject: Subject) {
        self.state
            .write()
            .await
            .subjects
            .insert(subject.id.clone(), subject);
    }

    pub async fn add_teacher(&self, teacher: Teacher) {
        self.state
            .write()
            .await
            .teachers
            .insert(teacher.id.clone(), teacher);
    }

    /// All sessions regardless of owner, in insertion order.
    pub async fn all_sessions(&self) -> Vec<TutoringSession> {
        self.state.read().await.sessions.clone()
    }

    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(
        &self,
        request: &NewTutoringRequest,
        expires_at: DateTime<Utc>,
    ) -> Result<TutoringRequest, DomainError> {
        let row = TutoringRequest {
            id: Uuid::new_v4().to_string(),
            student_id: request.student_id.clone(),
            teacher_id: request.teacher_id.clone(),
            subject_id: request.subject_id.clone(),
            preferred_date: request.preferred_date.clone(),
            preferred_time: request.preferred_time.clone(),
            message: request.message.clone(),
            urgency: request.urgency.unwrap_or_default(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            expires_at,
        };
        self.state
            .write()
            .await
            .requests
            .insert(row.id.clone(), row.clone());
        self.bump();
        Ok(row)
    }

    async fn get_request(&self, id: &str) -> Result<Option<TutoringRequest>, DomainError> {
        Ok(self.state.read().await.requests.get(id).cloned())
    }

    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.requests.get_mut(id) {
            Some(req) if req.status == from => {
                req.status = to;
                drop(state);
                self.bump();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_requests_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringRequest>, DomainError> {
        let state = self.state.read().await;
        let mut rows: Vec<TutoringRequest> = state
            .requests
            .values()
            .filter(|r| r.teacher_id == teacher_id && r.status == RequestStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut state = self.state.write().await;
        let mut n = 0u64;
        for req in state.requests.values_mut() {
            if req.status == RequestStatus::Pending && req.is_overdue(now) {
                req.status = RequestStatus::Expired;
                n += 1;
            }
        }
        drop(state);
        if n > 0 {
            self.bump();
        }
        Ok(n)
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(
        &self,
        session: &NewTutoringSession,
    ) -> Result<TutoringSession, DomainError> {
        let now = Utc::now();
        let row = TutoringSession {
            id: Uuid::new_v4().to_string(),
            student_id: session.student_id.clone(),
            teacher_id: session.teacher_id.clone(),
            subject_id: session.subject_id.clone(),
            title: session.title.clone(),
            description: session.description.clone(),
            scheduled_date: session.scheduled_date.clone(),
            start_time: session.start_time.clone(),
            end_time: session.end_time.clone(),
            duration_minutes: session.duration_minutes,
            status: session.status,
            location_type: session.location_type,
            location_details: session.location_details.clone(),
            meeting_url: session.meeting_url.clone(),
            price: session.price,
            payment_status: session.payment_status,
            notes: session.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.sessions.push(row.clone());
        self.bump();
        Ok(row)
    }

    async fn get_session(&self, id: &str) -> Result<Option<TutoringSession>, DomainError> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn transition_session(
        &self,
        id: &str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.status == from)
        {
            Some(s) => {
                s.status = to;
                s.updated_at = Utc::now();
                drop(state);
                self.bump();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn select_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<TutoringSession>, DomainError> {
        let state = self.state.read().await;
        let mut rows: Vec<TutoringSession> = state
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.scheduled_date.cmp(&b.scheduled_date));
        Ok(rows)
    }

    async fn count_sessions(&self, filter: &SessionFilter) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().filter(|s| filter.matches(s)).count() as u64)
    }
}

#[async_trait::async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, DomainError> {
        let row = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: notification.user_id.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind.clone(),
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
        };
        self.state.write().await.notifications.push(row.clone());
        self.bump();
        Ok(row)
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError> {
        let state = self.state.read().await;
        // Insertion order breaks created_at ties so the newest insert comes first.
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &str, read_at: DateTime<Utc>) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                n.read_at = Some(read_at);
                drop(state);
                self.bump();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl DirectoryPort for MemoryStore {
    async fn subjects(&self) -> Result<Vec<Subject>, DomainError> {
        let mut rows: Vec<Subject> = self.state.read().await.subjects.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_subject(&self, id: &str) -> Result<Option<Subject>, DomainError> {
        Ok(self.state.read().await.subjects.get(id).cloned())
    }

    async fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, DomainError> {
        Ok(self.state.read().await.teachers.get(id).cloned())
    }

    async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError> {
        let state = self.state.read().await;
        let mut rows: Vec<Teacher> = state
            .teachers
            .values()
            .filter(|t| match subject_id {
                Some(s) => t.subject_ids.iter().any(|id| id == s),
                None => !t.subject_ids.is_empty(),
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        Ok(rows)
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), DomainError> {
        self.state
            .write()
            .await
            .subjects
            .insert(subject.id.clone(), subject.clone());
        self.bump();
        Ok(())
    }

    async fn link_teacher_subject(
        &self,
        teacher_id: &str,
        subject_id: &str,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let Some(teacher) = state.teachers.get_mut(teacher_id) else {
            return Err(DomainError::Persistence(format!(
                "teacher {} does not exist",
                teacher_id
            )));
        };
        if teacher.subject_ids.iter().any(|id| id == subject_id) {
            return Ok(());
        }
        teacher.subject_ids.push(subject_id.to_string());
        drop(state);
        self.bump();
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryStore {
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if state.profiles.contains_key(&profile.id) {
            return Err(DomainError::Persistence(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        if let RoleProfile::Teacher(t) = &profile.profile {
            state.teachers.insert(
                profile.id.clone(),
                Teacher {
                    id: profile.id.clone(),
                    first_name: profile.first_name.clone(),
                    last_name: profile.last_name.clone(),
                    department: t.department.clone(),
                    specialization: t.specialization.clone(),
                    bio: t.bio.clone(),
                    experience_years: t.experience_years,
                    hourly_rate: t.hourly_rate,
                    rating: t.rating,
                    total_reviews: t.total_reviews,
                    is_verified: t.is_verified,
                    subject_ids: Vec::new(),
                },
            );
        }
        state.profiles.insert(profile.id.clone(), profile.clone());
        drop(state);
        self.bump();
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DomainError> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn upsert_settings(&self, settings: &UserSettings) -> Result<UserSettings, DomainError> {
        let mut row = settings.clone();
        row.updated_at = Some(Utc::now());
        self.state
            .write()
            .await
            .settings
            .insert(row.user_id.clone(), row.clone());
        self.bump();
        Ok(row)
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, DomainError> {
        Ok(self.state.read().await.settings.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Urgency;
    use chrono::Duration;

    fn new_request(teacher: &str) -> NewTutoringRequest {
        NewTutoringRequest {
            student_id: "stu-1".into(),
            teacher_id: teacher.into(),
            subject_id: "math".into(),
            preferred_date: "2026-03-10".into(),
            preferred_time: "14:00".into(),
            message: "help with limits".into(),
            urgency: None,
        }
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let store = MemoryStore::new();
        let req = store
            .insert_request(&new_request("t1"), Utc::now() + Duration::days(7))
            .await
            .unwrap();
        assert_eq!(req.urgency, Urgency::Medium);

        let first = store
            .transition_request(&req.id, RequestStatus::Pending, RequestStatus::Accepted)
            .await
            .unwrap();
        let second = store
            .transition_request(&req.id, RequestStatus::Pending, RequestStatus::Rejected)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
        let stored = store.get_request(&req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_expire_overdue_only_touches_pending() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = store
            .insert_request(&new_request("t1"), now - Duration::hours(1))
            .await
            .unwrap();
        let fresh = store
            .insert_request(&new_request("t1"), now + Duration::hours(1))
            .await
            .unwrap();
        let done = store
            .insert_request(&new_request("t1"), now - Duration::hours(1))
            .await
            .unwrap();
        store
            .transition_request(&done.id, RequestStatus::Pending, RequestStatus::Rejected)
            .await
            .unwrap();

        assert_eq!(store.expire_overdue(now).await.unwrap(), 1);
        let status = |id: String| {
            let store = &store;
            async move { store.get_request(&id).await.unwrap().unwrap().status }
        };
        assert_eq!(status(old.id).await, RequestStatus::Expired);
        assert_eq!(status(fresh.id).await, RequestStatus::Pending);
        assert_eq!(status(done.id).await, RequestStatus::Rejected);
    }

    #[tokio::test]
    async fn test_notifications_newest_first_with_limit() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .insert_notification(&NewNotification {
                    user_id: "u1".into(),
                    title: format!("n{i}"),
                    message: String::new(),
                    kind: crate::domain::NotificationKind::TutoringRequest,
                })
                .await
                .unwrap();
        }
        let feed = store.notifications_for_user("u1", 2).await.unwrap();
        let titles: Vec<&str> = feed.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n2", "n1"]);
        assert!(!store.mark_read("missing", Utc::now()).await.unwrap());
    }
}
