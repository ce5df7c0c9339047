//! Accounts: role-specific profiles, persisted settings, identity-service records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Institutional student code (not the user id).
    pub student_code: String,
    pub program: String,
    pub semester: u32,
    pub enrollment_year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub department: String,
    pub specialization: String,
    pub bio: String,
    pub experience_years: u32,
    pub hourly_rate: f64,
    pub rating: f64,
    pub total_reviews: u32,
    pub is_verified: bool,
}

/// Role-specific half of a profile. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            Self::Student(_) => Role::Student,
            Self::Teacher(_) => Role::Teacher,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: RoleProfile,
}

impl UserProfile {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilitySettings {
    pub high_contrast: bool,
    pub large_text: bool,
    pub reduced_motion: bool,
    pub screen_reader: bool,
}

/// Per-user preferences. Stored and returned as-is; never interpreted server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    pub theme: String,
    pub language: String,
    pub accessibility_settings: AccessibilitySettings,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserSettings {
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            theme: "light".to_string(),
            language: "es".to_string(),
            accessibility_settings: AccessibilitySettings::default(),
            updated_at: None,
        }
    }
}

/// Registration form. Role-specific fields are optional and checked per role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    pub student_id: Option<String>,
    pub program: Option<String>,
    pub semester: Option<String>,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    /// Free-form range such as `"3-5"`; the leading number is used.
    pub experience: Option<String>,
}

/// User record as returned by the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}
