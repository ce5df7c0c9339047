//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod profile;
pub mod stats;

pub use entities::{
    LocationType, NewNotification, NewTutoringRequest, NewTutoringSession, Notification,
    NotificationKind, PaymentStatus, RequestStatus, SessionBooking, SessionDetails, SessionStatus, Subject,
    Teacher, TutoringRequest, TutoringSession, Urgency,
};
pub use errors::DomainError;
pub use profile::{
    AccessibilitySettings, AuthSession, AuthUser, RegisterData, Role, RoleProfile,
    StudentProfile, TeacherProfile, UserProfile, UserSettings,
};
pub use stats::{StudentStats, TeacherStats};
