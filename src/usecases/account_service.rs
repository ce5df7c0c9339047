//! Registration, sign-in and per-user profile/settings.

use crate::domain::errors::require_field;
use crate::domain::{
    AuthSession, DomainError, RegisterData, Role, RoleProfile, StudentProfile, TeacherProfile,
    UserProfile, UserSettings,
};
use crate::ports::{AccountStore, IdentityPort};
use crate::shared::timeout::bounded;
use chrono::{Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Hourly rate assigned to new teachers until they set their own.
const DEFAULT_HOURLY_RATE: f64 = 25.0;

pub struct AccountService {
    identity: Arc<dyn IdentityPort>,
    accounts: Arc<dyn AccountStore>,
    call_timeout: Duration,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityPort>,
        accounts: Arc<dyn AccountStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            accounts,
            call_timeout,
        }
    }

    /// Create the identity, then the role profile, then default settings.
    pub async fn register(&self, data: RegisterData) -> Result<UserProfile, DomainError> {
        let role_profile = build_role_profile(&data, Utc::now().year())?;

        let metadata = serde_json::json!({
            "role": role_profile.role().as_str(),
            "first_name": data.first_name,
            "last_name": data.last_name,
        });
        let user = bounded(
            self.call_timeout,
            "identity sign-up",
            self.identity.sign_up(&data.email, &data.password, metadata),
        )
        .await?;

        let profile = UserProfile {
            id: user.id.clone(),
            email: if user.email.is_empty() {
                data.email.clone()
            } else {
                user.email.clone()
            },
            first_name: data.first_name.clone(),
            last_name: data.last_name.clone(),
            profile: role_profile,
        };
        bounded(
            self.call_timeout,
            "insert profile",
            self.accounts.insert_profile(&profile),
        )
        .await?;

        let defaults = UserSettings::defaults_for(&profile.id);
        if let Err(e) = bounded(
            self.call_timeout,
            "insert default settings",
            self.accounts.upsert_settings(&defaults),
        )
        .await
        {
            warn!(user_id = %profile.id, error = %e, "default settings not stored");
        }

        info!(user_id = %profile.id, role = profile.role().as_str(), "user registered");
        Ok(profile)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        require_field("email", email)?;
        require_field("password", password)?;
        let session = bounded(
            self.call_timeout,
            "identity sign-in",
            self.identity.sign_in(email, password),
        )
        .await?;
        info!(user_id = %session.user.id, "user signed in");
        Ok(session)
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), DomainError> {
        require_field("access_token", access_token)?;
        bounded(
            self.call_timeout,
            "identity sign-out",
            self.identity.sign_out(access_token),
        )
        .await
    }

    pub async fn current_session(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthSession>, DomainError> {
        require_field("access_token", access_token)?;
        bounded(
            self.call_timeout,
            "identity session",
            self.identity.get_session(access_token),
        )
        .await
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, DomainError> {
        require_field("user_id", user_id)?;
        bounded(
            self.call_timeout,
            "get profile",
            self.accounts.get_profile(user_id),
        )
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("user {}", user_id)))
    }

    /// Stored settings, or the defaults when the user never saved any.
    pub async fn settings(&self, user_id: &str) -> Result<UserSettings, DomainError> {
        require_field("user_id", user_id)?;
        let stored = bounded(
            self.call_timeout,
            "get settings",
            self.accounts.get_settings(user_id),
        )
        .await?;
        Ok(stored.unwrap_or_else(|| UserSettings::defaults_for(user_id)))
    }

    pub async fn update_settings(&self, settings: UserSettings) -> Result<UserSettings, DomainError> {
        require_field("user_id", &settings.user_id)?;
        bounded(
            self.call_timeout,
            "upsert settings",
            self.accounts.upsert_settings(&settings),
        )
        .await
    }
}

/// Checks the form for the chosen role and derives the stored profile.
fn build_role_profile(data: &RegisterData, current_year: i32) -> Result<RoleProfile, DomainError> {
    require_field("email", &data.email)?;
    require_field("password", &data.password)?;
    require_field("first_name", &data.first_name)?;
    require_field("last_name", &data.last_name)?;
    let role = data
        .role
        .ok_or_else(|| DomainError::Validation("role is required".to_string()))?;

    match role {
        Role::Student => {
            let student_code = required(&data.student_id, "student_id")?;
            let program = required(&data.program, "program")?;
            let semester_raw = required(&data.semester, "semester")?;
            let semester = semester_raw.trim().parse::<u32>().map_err(|_| {
                DomainError::Validation(format!("semester must be a number, got {:?}", semester_raw))
            })?;
            Ok(RoleProfile::Student(StudentProfile {
                student_code,
                program,
                semester,
                enrollment_year: current_year,
            }))
        }
        Role::Teacher => {
            let department = required(&data.department, "department")?;
            let specialization = required(&data.specialization, "specialization")?;
            Ok(RoleProfile::Teacher(TeacherProfile {
                department,
                specialization,
                bio: data.bio.clone().unwrap_or_default(),
                experience_years: experience_years(data.experience.as_deref()),
                hourly_rate: DEFAULT_HOURLY_RATE,
                rating: 0.0,
                total_reviews: 0,
                is_verified: false,
            }))
        }
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, DomainError> {
    let v = value.as_deref().unwrap_or_default();
    require_field(name, v)?;
    Ok(v.trim().to_string())
}

/// Leading number of a range like "3-5" or "10+"; 1 when absent or unparseable.
fn experience_years(raw: Option<&str>) -> u32 {
    let digits: String = raw
        .unwrap_or_default()
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::identity::MockIdentity;
    use crate::adapters::persistence::MemoryStore;
    use crate::test_support::{Fault, FaultyStore};
    use pretty_assertions::assert_eq;

    fn student_form() -> RegisterData {
        RegisterData {
            email: "lu@uni.edu".into(),
            password: "secret12".into(),
            first_name: "Lucia".into(),
            last_name: "Paz".into(),
            role: Some(Role::Student),
            student_id: Some("A0123".into()),
            program: Some("Engineering".into()),
            semester: Some("3".into()),
            ..RegisterData::default()
        }
    }

    fn teacher_form() -> RegisterData {
        RegisterData {
            email: "ana@uni.edu".into(),
            password: "secret12".into(),
            first_name: "Ana".into(),
            last_name: "Ruiz".into(),
            role: Some(Role::Teacher),
            department: Some("Sciences".into()),
            specialization: Some("Calculus".into()),
            experience: Some("3-5".into()),
            ..RegisterData::default()
        }
    }

    fn service(store: Arc<FaultyStore>) -> AccountService {
        AccountService::new(
            Arc::new(MockIdentity::new()),
            store,
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_experience_years_leading_number() {
        assert_eq!(experience_years(Some("3-5")), 3);
        assert_eq!(experience_years(Some("10+")), 10);
        assert_eq!(experience_years(Some("")), 1);
        assert_eq!(experience_years(None), 1);
        assert_eq!(experience_years(Some("many")), 1);
    }

    #[test]
    fn test_student_form_needs_semester_number() {
        let mut form = student_form();
        form.semester = Some("third".into());
        assert!(matches!(
            build_role_profile(&form, 2026),
            Err(DomainError::Validation(_))
        ));

        form.semester = None;
        assert_eq!(
            build_role_profile(&form, 2026),
            Err(DomainError::Validation("semester is required".into()))
        );
    }

    #[test]
    fn test_teacher_form_needs_department() {
        let mut form = teacher_form();
        form.department = Some(" ".into());
        assert_eq!(
            build_role_profile(&form, 2026),
            Err(DomainError::Validation("department is required".into()))
        );
    }

    #[tokio::test]
    async fn test_register_student_stores_profile_and_default_settings() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        let svc = service(store.clone());

        let profile = svc.register(student_form()).await.unwrap();
        assert_eq!(profile.role(), Role::Student);
        match &profile.profile {
            RoleProfile::Student(s) => {
                assert_eq!(s.student_code, "A0123");
                assert_eq!(s.semester, 3);
                assert_eq!(s.enrollment_year, Utc::now().year());
            }
            other => panic!("unexpected profile {other:?}"),
        }

        let stored = svc.profile(&profile.id).await.unwrap();
        assert_eq!(stored, profile);
        let settings = store.inner().get_settings(&profile.id).await.unwrap().unwrap();
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.language, "es");
    }

    #[tokio::test]
    async fn test_register_teacher_defaults() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        let profile = svc.register(teacher_form()).await.unwrap();
        match profile.profile {
            RoleProfile::Teacher(t) => {
                assert_eq!(t.experience_years, 3);
                assert_eq!(t.hourly_rate, 25.0);
                assert!(!t.is_verified);
            }
            other => panic!("unexpected profile {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_survives_settings_failure() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail(Fault::UpsertSettings);
        let svc = service(store.clone());
        let profile = svc.register(teacher_form()).await.unwrap();
        assert!(store.inner().get_settings(&profile.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_profile_failure_is_persistence() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail(Fault::InsertProfile);
        let err = service(store).register(student_form()).await.unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_auth_error() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        svc.register(student_form()).await.unwrap();
        assert!(matches!(
            svc.register(student_form()).await,
            Err(DomainError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_login_logout_cycle() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        svc.register(student_form()).await.unwrap();

        assert!(matches!(
            svc.login("lu@uni.edu", "wrong").await,
            Err(DomainError::Auth(_))
        ));
        let session = svc.login("lu@uni.edu", "secret12").await.unwrap();
        let token = session.access_token.clone();
        assert_eq!(
            svc.current_session(&token).await.unwrap().map(|s| s.user.id),
            Some(session.user.id)
        );
        svc.logout(&token).await.unwrap();
        assert!(svc.current_session(&token).await.unwrap().is_none());
        assert!(matches!(svc.logout("").await, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_per_token() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        svc.register(student_form()).await.unwrap();
        let mut other = student_form();
        other.email = "bo@uni.edu".into();
        svc.register(other).await.unwrap();

        let a = svc.login("lu@uni.edu", "secret12").await.unwrap();
        let b = svc.login("bo@uni.edu", "secret12").await.unwrap();
        let seen_a = svc.current_session(&a.access_token).await.unwrap().unwrap();
        assert_eq!(seen_a.user.email, "lu@uni.edu");

        svc.logout(&b.access_token).await.unwrap();
        assert!(svc.current_session(&a.access_token).await.unwrap().is_some());
        assert!(svc.current_session(&b.access_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_missing_is_not_found() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        assert!(matches!(svc.profile("ghost").await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_settings_stamps_time() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        let mut s = UserSettings::defaults_for("u-1");
        s.theme = "dark".into();
        s.accessibility_settings.large_text = true;
        let stored = svc.update_settings(s).await.unwrap();
        assert_eq!(stored.theme, "dark");
        assert!(stored.accessibility_settings.large_text);
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_settings_fall_back_to_defaults_until_saved() {
        let svc = service(Arc::new(FaultyStore::new(MemoryStore::new())));
        let fresh = svc.settings("u-9").await.unwrap();
        assert_eq!(fresh, UserSettings::defaults_for("u-9"));

        let mut s = UserSettings::defaults_for("u-9");
        s.language = "en".into();
        svc.update_settings(s).await.unwrap();
        assert_eq!(svc.settings("u-9").await.unwrap().language, "en");
    }
}
