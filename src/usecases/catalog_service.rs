//! Subject catalog and the teacher directory.

use crate::domain::errors::require_field;
use crate::domain::{DomainError, Subject, Teacher};
use crate::ports::DirectoryPort;
use crate::shared::timeout::bounded;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct CatalogService {
    directory: Arc<dyn DirectoryPort>,
    call_timeout: Duration,
}

impl CatalogService {
    pub fn new(directory: Arc<dyn DirectoryPort>, call_timeout: Duration) -> Self {
        Self {
            directory,
            call_timeout,
        }
    }

    pub async fn subjects(&self) -> Result<Vec<Subject>, DomainError> {
        bounded(self.call_timeout, "list subjects", self.directory.subjects()).await
    }

    /// A blank `subject_id` is treated as no filter.
    pub async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError> {
        let subject_id = subject_id.filter(|s| !s.trim().is_empty());
        bounded(
            self.call_timeout,
            "list teachers",
            self.directory.available_teachers(subject_id),
        )
        .await
    }

    /// Add a subject, or replace the one with the same id.
    pub async fn add_subject(&self, mut subject: Subject) -> Result<Subject, DomainError> {
        require_field("id", &subject.id)?;
        require_field("name", &subject.name)?;
        require_field("code", &subject.code)?;
        subject.id = subject.id.trim().to_string();

        bounded(
            self.call_timeout,
            "upsert subject",
            self.directory.upsert_subject(&subject),
        )
        .await?;
        info!(subject_id = %subject.id, code = %subject.code, "subject saved");
        Ok(subject)
    }

    /// Record that a teacher offers a subject and return the updated teacher.
    ///
    /// Both must already exist; otherwise `NotFound` and nothing is written.
    pub async fn offer_subject(
        &self,
        teacher_id: &str,
        subject_id: &str,
    ) -> Result<Teacher, DomainError> {
        require_field("teacher_id", teacher_id)?;
        require_field("subject_id", subject_id)?;
        self.teacher(teacher_id).await?;
        bounded(
            self.call_timeout,
            "get subject",
            self.directory.get_subject(subject_id),
        )
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("subject {}", subject_id)))?;

        bounded(
            self.call_timeout,
            "link teacher subject",
            self.directory.link_teacher_subject(teacher_id, subject_id),
        )
        .await?;
        info!(teacher_id, subject_id, "teacher now offers subject");
        self.teacher(teacher_id).await
    }

    async fn teacher(&self, teacher_id: &str) -> Result<Teacher, DomainError> {
        bounded(
            self.call_timeout,
            "get teacher",
            self.directory.get_teacher(teacher_id),
        )
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("teacher {}", teacher_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryStore;
    use crate::domain::{RoleProfile, TeacherProfile, UserProfile};
    use crate::ports::AccountStore;
    use crate::test_support::{Fault, FaultyStore};
    use pretty_assertions::assert_eq;

    fn calculus() -> Subject {
        Subject {
            id: "math".into(),
            name: "Calculus I".into(),
            code: "MAT101".into(),
            description: String::new(),
            department: "Sciences".into(),
            credits: 4,
        }
    }

    async fn setup() -> (Arc<FaultyStore>, CatalogService) {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store
            .insert_profile(&UserProfile {
                id: "t1".into(),
                email: "ana@uni.edu".into(),
                first_name: "Ana".into(),
                last_name: "Loor".into(),
                profile: RoleProfile::Teacher(TeacherProfile {
                    department: "Sciences".into(),
                    specialization: "Calculus".into(),
                    bio: String::new(),
                    experience_years: 3,
                    hourly_rate: 25.0,
                    rating: 4.5,
                    total_reviews: 12,
                    is_verified: true,
                }),
            })
            .await
            .unwrap();
        let svc = CatalogService::new(store.clone(), Duration::from_secs(2));
        (store, svc)
    }

    #[tokio::test]
    async fn test_registered_teacher_is_listed_once_offering() {
        let (_store, svc) = setup().await;
        svc.add_subject(calculus()).await.unwrap();
        assert!(svc.available_teachers(None).await.unwrap().is_empty());

        let teacher = svc.offer_subject("t1", "math").await.unwrap();
        assert_eq!(teacher.subject_ids, vec!["math".to_string()]);
        let again = svc.offer_subject("t1", "math").await.unwrap();
        assert_eq!(again.subject_ids.len(), 1);

        let listed = svc.available_teachers(Some("math")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].first_name, "Ana");
        assert_eq!(svc.subjects().await.unwrap()[0].code, "MAT101");
    }

    #[tokio::test]
    async fn test_add_subject_replaces_same_id() {
        let (_store, svc) = setup().await;
        svc.add_subject(calculus()).await.unwrap();
        let mut renamed = calculus();
        renamed.name = "Calculus 1".into();
        svc.add_subject(renamed).await.unwrap();

        let all = svc.subjects().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Calculus 1");
    }

    #[tokio::test]
    async fn test_add_subject_requires_name_and_code() {
        let (store, svc) = setup().await;
        let before = store.inner().write_count();
        let mut bad = calculus();
        bad.name = " ".into();
        assert!(matches!(
            svc.add_subject(bad).await,
            Err(DomainError::Validation(_))
        ));
        let mut bad = calculus();
        bad.code = String::new();
        assert!(matches!(
            svc.add_subject(bad).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(store.inner().write_count(), before);
    }

    #[tokio::test]
    async fn test_offer_unknown_teacher_or_subject_is_not_found() {
        let (store, svc) = setup().await;
        svc.add_subject(calculus()).await.unwrap();
        let before = store.inner().write_count();

        assert!(matches!(
            svc.offer_subject("ghost", "math").await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            svc.offer_subject("t1", "art").await,
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(store.inner().write_count(), before);
    }

    #[tokio::test]
    async fn test_failed_link_surfaces_as_persistence() {
        let (store, svc) = setup().await;
        svc.add_subject(calculus()).await.unwrap();
        store.fail(Fault::LinkTeacherSubject);
        assert!(matches!(
            svc.offer_subject("t1", "math").await,
            Err(DomainError::Persistence(_))
        ));
        assert!(svc.available_teachers(None).await.unwrap().is_empty());
    }
}
