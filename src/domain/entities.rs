//! Domain entities. Pure data structures for the core business.
//!
//! No database or HTTP types here; adapters map their rows and payloads into these.
//! Enum tags serialize to the same snake_case strings the tables store.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{DomainError, require_field};

/// Implements `as_str`, `Display` and `FromStr` for a plain tag enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(Self::$variant),)+
                    other => Err(DomainError::Validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Student-supplied priority hint. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

string_enum!(Urgency { Low => "low", Medium => "medium", High => "high" });

/// Lifecycle of a tutoring request. Only `Pending` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

string_enum!(RequestStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Expired => "expired",
});

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

string_enum!(SessionStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Sessions only move forward (pending, confirmed, in_progress, completed).
    /// Any live session may be cancelled.
    pub fn can_move_to(&self, next: SessionStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Confirmed)
            | (Self::Confirmed, Self::InProgress)
            | (Self::InProgress, Self::Completed) => true,
            (current, Self::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    #[default]
    Virtual,
    InPerson,
}

string_enum!(LocationType { Virtual => "virtual", InPerson => "in_person" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
}

string_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Refunded => "refunded" });

/// A student's ask for tutoring directed at a teacher and subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringRequest {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    /// `YYYY-MM-DD`
    pub preferred_date: String,
    /// `HH:MM`
    pub preferred_time: String,
    pub message: String,
    #[serde(rename = "urgency_level")]
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TutoringRequest {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Student input for a new request. Identity, status and timestamps are assigned on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTutoringRequest {
    pub student_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub message: String,
    /// Omitted means `medium`.
    #[serde(rename = "urgency_level")]
    pub urgency: Option<Urgency>,
}

impl NewTutoringRequest {
    /// Required fields, a real calendar date stored as `YYYY-MM-DD`, and the urgency default.
    pub fn validated(mut self) -> Result<Self, DomainError> {
        require_field("student_id", &self.student_id)?;
        require_field("teacher_id", &self.teacher_id)?;
        require_field("subject_id", &self.subject_id)?;
        require_field("preferred_date", &self.preferred_date)?;
        require_field("preferred_time", &self.preferred_time)?;
        self.preferred_date = canonical_day("preferred_date", &self.preferred_date)?;
        parse_clock("preferred_time", &self.preferred_time)?;
        self.urgency = Some(self.urgency.unwrap_or_default());
        Ok(self)
    }
}

/// A scheduled (or completed) tutoring engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringSession {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DD`
    pub scheduled_date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub status: SessionStatus,
    pub location_type: LocationType,
    pub location_details: String,
    pub meeting_url: String,
    pub price: f64,
    pub payment_status: PaymentStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert into the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTutoringSession {
    pub student_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub title: String,
    pub description: String,
    pub scheduled_date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub status: SessionStatus,
    pub location_type: LocationType,
    pub location_details: String,
    pub meeting_url: String,
    pub price: f64,
    pub payment_status: PaymentStatus,
    pub notes: String,
}

/// Teacher-supplied schedule and pricing used when accepting a request.
/// Missing fields deserialize empty so `validated` can name them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDetails {
    pub title: String,
    /// Falls back to the request's message when absent.
    #[serde(default)]
    pub description: Option<String>,
    pub scheduled_date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub location_type: Option<LocationType>,
    #[serde(default)]
    pub location_details: String,
    #[serde(default)]
    pub meeting_url: String,
    #[serde(default)]
    pub price: f64,
}

impl SessionDetails {
    /// Checks required fields and keeps `duration_minutes` consistent with start/end.
    /// A zero duration is derived from the times; a non-zero one must match them.
    pub fn validated(mut self) -> Result<Self, DomainError> {
        require_field("scheduled_date", &self.scheduled_date)?;
        require_field("start_time", &self.start_time)?;
        require_field("end_time", &self.end_time)?;
        self.scheduled_date = canonical_day("scheduled_date", &self.scheduled_date)?;
        let start = parse_clock("start_time", &self.start_time)?;
        let end = parse_clock("end_time", &self.end_time)?;
        if end <= start {
            return Err(DomainError::Validation(format!(
                "end_time {} must be after start_time {}",
                self.end_time, self.start_time
            )));
        }
        let span = (end - start).num_minutes() as u32;
        if self.duration_minutes == 0 {
            self.duration_minutes = span;
        } else if self.duration_minutes != span {
            return Err(DomainError::Validation(format!(
                "duration_minutes {} does not match {}-{} ({} min)",
                self.duration_minutes, self.start_time, self.end_time, span
            )));
        }
        if self.price < 0.0 {
            return Err(DomainError::Validation("price must not be negative".into()));
        }
        Ok(self)
    }

    /// Builds the confirmed session row for an accepted request.
    pub fn into_session_for(self, request: &TutoringRequest) -> NewTutoringSession {
        self.into_row(
            &request.student_id,
            &request.teacher_id,
            &request.subject_id,
            &request.message,
            SessionStatus::Confirmed,
        )
    }

    fn into_row(
        self,
        student_id: &str,
        teacher_id: &str,
        subject_id: &str,
        fallback_description: &str,
        status: SessionStatus,
    ) -> NewTutoringSession {
        NewTutoringSession {
            student_id: student_id.to_string(),
            teacher_id: teacher_id.to_string(),
            subject_id: subject_id.to_string(),
            title: self.title,
            description: self
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| fallback_description.to_string()),
            scheduled_date: self.scheduled_date,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            status,
            location_type: self.location_type.unwrap_or_default(),
            location_details: self.location_details,
            meeting_url: self.meeting_url,
            price: self.price,
            payment_status: PaymentStatus::Pending,
            notes: String::new(),
        }
    }
}

/// A session booked directly by one of its parties, without going through a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionBooking {
    pub student_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub session_details: SessionDetails,
}

impl SessionBooking {
    /// Validated row with status `pending`; the other party confirms it later.
    pub fn into_new_session(self) -> Result<NewTutoringSession, DomainError> {
        require_field("student_id", &self.student_id)?;
        require_field("teacher_id", &self.teacher_id)?;
        require_field("subject_id", &self.subject_id)?;
        let details = self.session_details.validated()?;
        Ok(details.into_row(
            &self.student_id,
            &self.teacher_id,
            &self.subject_id,
            "",
            SessionStatus::Pending,
        ))
    }
}

/// Stores compare and bucket dates as text, so every stored date is zero-padded `YYYY-MM-DD`.
fn canonical_day(field: &str, value: &str) -> Result<String, DomainError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| DomainError::Validation(format!("{} '{}' is not YYYY-MM-DD", field, value)))
}

/// Accepts `HH:MM` and the `HH:MM:SS` form databases hand back.
fn parse_clock(field: &str, value: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| DomainError::Validation(format!("{} '{}' is not HH:MM", field, value)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum NotificationKind {
    TutoringRequest,
    TutoringAccepted,
    TutoringRejected,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TutoringRequest => "tutoring_request",
            Self::TutoringAccepted => "tutoring_accepted",
            Self::TutoringRejected => "tutoring_rejected",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "tutoring_request" => Self::TutoringRequest,
            "tutoring_accepted" => Self::TutoringAccepted,
            "tutoring_rejected" => Self::TutoringRejected,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// Per-user notification. Only the read flag changes after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub credits: u32,
}

/// Teacher as listed in the directory: profile fields plus display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub specialization: String,
    pub bio: String,
    pub experience_years: u32,
    pub hourly_rate: f64,
    pub rating: f64,
    pub total_reviews: u32,
    pub is_verified: bool,
    /// Subjects the teacher offers.
    #[serde(default)]
    pub subject_ids: Vec<String>,
}
