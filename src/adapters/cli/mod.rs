//! Command-line surface. Parses commands with clap and runs them against `TutoringApi`.
//!
//! Every command except `serve` prints its result as pretty JSON on stdout.

use crate::domain::{
    DomainError, LocationType, NewTutoringRequest, RegisterData, Role, SessionBooking,
    SessionDetails, SessionStatus, Subject, Urgency,
};
use crate::ports::TutoringApi;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "tutoring-desk", about = "Tutoring marketplace back office", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Keep everything in memory for this run instead of the database file
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Serve the JSON HTTP API
    Serve {
        /// Listen address (default from TUTORING_HTTP_BIND or 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Submit a tutoring request as a student
    Submit {
        #[arg(long)]
        student: String,
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        subject: String,
        /// Preferred date, YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Preferred time, HH:MM
        #[arg(long)]
        time: String,
        #[arg(long, default_value = "")]
        message: String,
        /// low | medium | high (default medium)
        #[arg(long)]
        urgency: Option<Urgency>,
    },
    /// Accept a pending request and schedule the session
    Accept {
        request_id: String,
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Book a session directly, without a request
    Book {
        #[arg(long)]
        student: String,
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        subject: String,
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Move a session to its next status
    Advance {
        session_id: String,
        /// confirmed | in_progress | completed | cancelled
        status: SessionStatus,
    },
    /// Decline a pending request
    Reject { request_id: String },
    /// Expire every pending request past its deadline
    Expire,
    /// Pending requests in a teacher's inbox
    Requests { teacher_id: String },
    /// Sessions of a student (or of a teacher with --teacher)
    Sessions {
        user_id: String,
        #[arg(long)]
        teacher: bool,
    },
    StudentStats { student_id: String },
    TeacherStats { teacher_id: String },
    /// Latest notifications for a user
    Notifications { user_id: String },
    MarkRead { notification_id: String },
    Subjects,
    /// Teachers by rating, optionally only those offering a subject
    Teachers {
        #[arg(long)]
        subject: Option<String>,
    },
    /// Add a subject to the catalog, or replace the one with the same id
    AddSubject {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        department: String,
        #[arg(long, default_value_t = 0)]
        credits: u32,
    },
    /// Record that a teacher offers a subject
    OfferSubject { teacher_id: String, subject_id: String },
    /// Register a student or teacher account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// student | teacher
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        student_code: Option<String>,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        specialization: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Years of experience, e.g. "3-5"
        #[arg(long)]
        experience: Option<String>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Revoke an access token
    Logout { access_token: String },
    /// Session behind an access token (null when unknown or expired)
    Session { access_token: String },
    Profile { user_id: String },
    /// Stored settings for a user, or the defaults
    Settings { user_id: String },
}

/// Schedule and pricing flags shared by `accept` and `book`.
#[derive(Args, Debug, PartialEq)]
pub struct DetailsArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Session date, YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub start: String,
    #[arg(long)]
    pub end: String,
    /// Minutes; derived from start/end when omitted
    #[arg(long, default_value_t = 0)]
    pub duration: u32,
    #[arg(long, default_value_t = 0.0)]
    pub price: f64,
    /// virtual | in_person
    #[arg(long)]
    pub location: Option<LocationType>,
    #[arg(long, default_value = "")]
    pub location_details: String,
    #[arg(long, default_value = "")]
    pub meeting_url: String,
}

impl From<DetailsArgs> for SessionDetails {
    fn from(a: DetailsArgs) -> Self {
        SessionDetails {
            title: a.title,
            description: a.description,
            scheduled_date: a.date,
            start_time: a.start,
            end_time: a.end,
            duration_minutes: a.duration,
            location_type: a.location,
            location_details: a.location_details,
            meeting_url: a.meeting_url,
            price: a.price,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Could not encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("`serve` is handled by the binary, not by execute")]
    NotACommand,
}

fn parse_role(s: &str) -> Result<Role, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "student" => Ok(Role::Student),
        "teacher" => Ok(Role::Teacher),
        other => Err(format!("unknown role '{}', expected student or teacher", other)),
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Runs one command and returns its JSON rendering.
pub async fn execute(api: &dyn TutoringApi, command: Commands) -> Result<String, CliError> {
    match command {
        Commands::Serve { .. } => Err(CliError::NotACommand),
        Commands::Submit {
            student,
            teacher,
            subject,
            date,
            time,
            message,
            urgency,
        } => {
            let req = NewTutoringRequest {
                student_id: student,
                teacher_id: teacher,
                subject_id: subject,
                preferred_date: date,
                preferred_time: time,
                message,
                urgency,
            };
            pretty(&api.submit_request(req).await?)
        }
        Commands::Accept {
            request_id,
            details,
        } => pretty(&api.accept_request(&request_id, details.into()).await?),
        Commands::Book {
            student,
            teacher,
            subject,
            details,
        } => {
            let booking = SessionBooking {
                student_id: student,
                teacher_id: teacher,
                subject_id: subject,
                session_details: details.into(),
            };
            pretty(&api.book_session(booking).await?)
        }
        Commands::Advance { session_id, status } => {
            pretty(&api.update_session_status(&session_id, status).await?)
        }
        Commands::Reject { request_id } => pretty(&api.reject_request(&request_id).await?),
        Commands::Expire => pretty(&serde_json::json!({
            "expired": api.expire_overdue_requests().await?
        })),
        Commands::Requests { teacher_id } => pretty(&api.pending_requests(&teacher_id).await?),
        Commands::Sessions { user_id, teacher } => {
            let rows = if teacher {
                api.teacher_sessions(&user_id).await?
            } else {
                api.student_sessions(&user_id).await?
            };
            pretty(&rows)
        }
        Commands::StudentStats { student_id } => pretty(&api.student_stats(&student_id).await),
        Commands::TeacherStats { teacher_id } => pretty(&api.teacher_stats(&teacher_id).await),
        Commands::Notifications { user_id } => pretty(&api.notifications(&user_id).await?),
        Commands::MarkRead { notification_id } => {
            api.mark_notification_read(&notification_id).await?;
            pretty(&serde_json::json!({ "id": notification_id, "is_read": true }))
        }
        Commands::Subjects => pretty(&api.subjects().await?),
        Commands::Teachers { subject } => {
            pretty(&api.available_teachers(subject.as_deref()).await?)
        }
        Commands::AddSubject {
            id,
            name,
            code,
            description,
            department,
            credits,
        } => pretty(
            &api.add_subject(Subject {
                id,
                name,
                code,
                description,
                department,
                credits,
            })
            .await?,
        ),
        Commands::OfferSubject {
            teacher_id,
            subject_id,
        } => pretty(&api.offer_subject(&teacher_id, &subject_id).await?),
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
            role,
            student_code,
            program,
            semester,
            department,
            specialization,
            bio,
            experience,
        } => {
            let data = RegisterData {
                email,
                password,
                first_name,
                last_name,
                role: Some(role),
                student_id: student_code,
                program,
                semester,
                department,
                specialization,
                bio,
                experience,
            };
            pretty(&api.register(data).await?)
        }
        Commands::Login { email, password } => pretty(&api.login(&email, &password).await?),
        Commands::Logout { access_token } => {
            api.logout(&access_token).await?;
            pretty(&serde_json::json!({ "signed_out": true }))
        }
        Commands::Session { access_token } => {
            pretty(&api.current_session(&access_token).await?)
        }
        Commands::Profile { user_id } => pretty(&api.profile(&user_id).await?),
        Commands::Settings { user_id } => pretty(&api.settings(&user_id).await?),
    }
}
