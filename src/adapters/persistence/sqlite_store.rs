//! SQLite-backed store via libsql. Implements every store port on one database file.
//!
//! All tables live in data/tutoring.db. Timestamps are stored as fixed-width RFC 3339
//! (UTC, microseconds) so string comparison orders them; dates are `YYYY-MM-DD` text.
//! Status transitions are conditional UPDATEs checked by affected-row count.

use crate::domain::{
    AccessibilitySettings, DomainError, NewNotification, NewTutoringRequest, NewTutoringSession,
    Notification, NotificationKind, RequestStatus, RoleProfile, SessionStatus, StudentProfile,
    Subject, Teacher, TeacherProfile, TutoringRequest, TutoringSession, UserProfile,
    UserSettings,
};
use crate::ports::{
    AccountStore, DirectoryPort, NotificationStore, RequestStore, SessionFilter, SessionStore,
};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Row, Value, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS tutoring_requests (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    teacher_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    preferred_date TEXT NOT NULL,
    preferred_time TEXT NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    urgency_level TEXT NOT NULL DEFAULT 'medium',
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_requests_teacher_status ON tutoring_requests (teacher_id, status, created_at DESC)",
    r#"
CREATE TABLE IF NOT EXISTS tutoring_sessions (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    teacher_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    scheduled_date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    status TEXT NOT NULL,
    location_type TEXT NOT NULL DEFAULT 'virtual',
    location_details TEXT NOT NULL DEFAULT '',
    meeting_url TEXT NOT NULL DEFAULT '',
    price REAL NOT NULL DEFAULT 0,
    payment_status TEXT NOT NULL DEFAULT 'pending',
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_student ON tutoring_sessions (student_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_teacher ON tutoring_sessions (teacher_id, status, scheduled_date)",
    r#"
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    type TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    read_at TEXT
)"#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, created_at DESC)",
    r#"
CREATE TABLE IF NOT EXISTS subjects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    department TEXT NOT NULL DEFAULT '',
    credits INTEGER NOT NULL DEFAULT 0
)"#,
    r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    role TEXT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY REFERENCES users (id),
    student_code TEXT NOT NULL,
    program TEXT NOT NULL,
    semester INTEGER NOT NULL,
    enrollment_year INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS teachers (
    id TEXT PRIMARY KEY REFERENCES users (id),
    department TEXT NOT NULL,
    specialization TEXT NOT NULL,
    bio TEXT NOT NULL DEFAULT '',
    experience_years INTEGER NOT NULL DEFAULT 1,
    hourly_rate REAL NOT NULL DEFAULT 25.0,
    rating REAL NOT NULL DEFAULT 0,
    total_reviews INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER NOT NULL DEFAULT 0
)"#,
    r#"
CREATE TABLE IF NOT EXISTS teacher_subjects (
    teacher_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    PRIMARY KEY (teacher_id, subject_id)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS user_settings (
    user_id TEXT PRIMARY KEY,
    theme TEXT NOT NULL,
    language TEXT NOT NULL,
    accessibility_json TEXT NOT NULL,
    updated_at TEXT
)"#,
];

const REQUEST_COLUMNS: &str = "id, student_id, teacher_id, subject_id, preferred_date, preferred_time, message, urgency_level, status, created_at, expires_at";

const SESSION_COLUMNS: &str = "id, student_id, teacher_id, subject_id, title, description, scheduled_date, start_time, end_time, duration_minutes, status, location_type, location_details, meeting_url, price, payment_status, notes, created_at, updated_at";

const TEACHER_COLUMNS: &str = "t.id, u.first_name, u.last_name, t.department, t.specialization, t.bio, t.experience_years, t.hourly_rate, t.rating, t.total_reviews, t.is_verified";

fn db_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Persistence(e.to_string())
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DomainError::Persistence(format!("bad timestamp '{}': {}", s, e)))
}

/// SQLite store. One database file (tutoring.db) in the given base directory.
pub struct SqliteStore {
    db: Database,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned store is safe to share via Arc.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(db_err)?;
        let db_path = base.join("tutoring.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        // PRAGMA returns a row (the new value); drain it (execute fails when rows are returned).
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Persistence(format!("WAL pragma failed: {}", e)))?;
        while wal_rows.next().await.map_err(db_err)?.is_some() {}

        for stmt in SCHEMA {
            conn.execute(stmt, ()).await.map_err(db_err)?;
        }

        info!(path = %db_path.display(), "SQLite store ready (WAL)");

        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(db_err)
    }

    fn row_to_request(row: &Row) -> Result<TutoringRequest, DomainError> {
        let urgency: String = row.get(7).map_err(db_err)?;
        let status: String = row.get(8).map_err(db_err)?;
        let created_at: String = row.get(9).map_err(db_err)?;
        let expires_at: String = row.get(10).map_err(db_err)?;
        Ok(TutoringRequest {
            id: row.get(0).map_err(db_err)?,
            student_id: row.get(1).map_err(db_err)?,
            teacher_id: row.get(2).map_err(db_err)?,
            subject_id: row.get(3).map_err(db_err)?,
            preferred_date: row.get(4).map_err(db_err)?,
            preferred_time: row.get(5).map_err(db_err)?,
            message: row.get::<String>(6).unwrap_or_default(),
            urgency: urgency.parse()?,
            status: status.parse()?,
            created_at: parse_ts(&created_at)?,
            expires_at: parse_ts(&expires_at)?,
        })
    }

    fn row_to_session(row: &Row) -> Result<TutoringSession, DomainError> {
        let duration: i64 = row.get(9).map_err(db_err)?;
        let status: String = row.get(10).map_err(db_err)?;
        let location_type: String = row.get(11).map_err(db_err)?;
        let payment_status: String = row.get(15).map_err(db_err)?;
        let created_at: String = row.get(17).map_err(db_err)?;
        let updated_at: String = row.get(18).map_err(db_err)?;
        Ok(TutoringSession {
            id: row.get(0).map_err(db_err)?,
            student_id: row.get(1).map_err(db_err)?,
            teacher_id: row.get(2).map_err(db_err)?,
            subject_id: row.get(3).map_err(db_err)?,
            title: row.get::<String>(4).unwrap_or_default(),
            description: row.get::<String>(5).unwrap_or_default(),
            scheduled_date: row.get(6).map_err(db_err)?,
            start_time: row.get(7).map_err(db_err)?,
            end_time: row.get(8).map_err(db_err)?,
            duration_minutes: duration.max(0) as u32,
            status: status.parse()?,
            location_type: location_type.parse()?,
            location_details: row.get::<String>(12).unwrap_or_default(),
            meeting_url: row.get::<String>(13).unwrap_or_default(),
            price: row.get::<f64>(14).unwrap_or_default(),
            payment_status: payment_status.parse()?,
            notes: row.get::<String>(16).unwrap_or_default(),
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })
    }

    fn row_to_notification(row: &Row) -> Result<Notification, DomainError> {
        let kind: String = row.get(4).map_err(db_err)?;
        let is_read: i64 = row.get(5).map_err(db_err)?;
        let created_at: String = row.get(6).map_err(db_err)?;
        let read_at: Option<String> = row.get::<String>(7).ok();
        Ok(Notification {
            id: row.get(0).map_err(db_err)?,
            user_id: row.get(1).map_err(db_err)?,
            title: row.get(2).map_err(db_err)?,
            message: row.get(3).map_err(db_err)?,
            kind: NotificationKind::parse(&kind),
            is_read: is_read != 0,
            created_at: parse_ts(&created_at)?,
            read_at: read_at.as_deref().map(parse_ts).transpose()?,
        })
    }

    fn row_to_subject(row: &Row) -> Result<Subject, DomainError> {
        let credits: i64 = row.get(5).map_err(db_err)?;
        Ok(Subject {
            id: row.get(0).map_err(db_err)?,
            name: row.get(1).map_err(db_err)?,
            code: row.get(2).map_err(db_err)?,
            description: row.get::<String>(3).unwrap_or_default(),
            department: row.get::<String>(4).unwrap_or_default(),
            credits: credits.max(0) as u32,
        })
    }

    fn row_to_teacher(row: &Row) -> Result<Teacher, DomainError> {
        let experience: i64 = row.get(6).map_err(db_err)?;
        let reviews: i64 = row.get(9).map_err(db_err)?;
        let verified: i64 = row.get(10).map_err(db_err)?;
        Ok(Teacher {
            id: row.get(0).map_err(db_err)?,
            first_name: row.get(1).map_err(db_err)?,
            last_name: row.get(2).map_err(db_err)?,
            department: row.get(3).map_err(db_err)?,
            specialization: row.get(4).map_err(db_err)?,
            bio: row.get::<String>(5).unwrap_or_default(),
            experience_years: experience.max(0) as u32,
            hourly_rate: row.get::<f64>(7).unwrap_or_default(),
            rating: row.get::<f64>(8).unwrap_or_default(),
            total_reviews: reviews.max(0) as u32,
            is_verified: verified != 0,
            subject_ids: Vec::new(),
        })
    }

    async fn teacher_subject_ids(
        conn: &Connection,
        teacher_id: &str,
    ) -> Result<Vec<String>, DomainError> {
        let mut rows = conn
            .query(
                "SELECT subject_id FROM teacher_subjects WHERE teacher_id = ?1 ORDER BY subject_id",
                params![teacher_id],
            )
            .await
            .map_err(db_err)?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            ids.push(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(ids)
    }

    /// Build `WHERE ...` and positional values for a session filter.
    fn session_where(filter: &SessionFilter) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let mut push = |clause: &str, v: Value, values: &mut Vec<Value>| {
            values.push(v);
            clauses.push(clause.replace('?', &format!("?{}", values.len())));
        };
        if let Some(ref s) = filter.student_id {
            push("student_id = ?", Value::Text(s.clone()), &mut values);
        }
        if let Some(ref t) = filter.teacher_id {
            push("teacher_id = ?", Value::Text(t.clone()), &mut values);
        }
        if let Some(from) = filter.scheduled_from {
            push(
                "scheduled_date >= ?",
                Value::Text(from.format("%Y-%m-%d").to_string()),
                &mut values,
            );
        }
        if let Some(before) = filter.scheduled_before {
            push(
                "scheduled_date < ?",
                Value::Text(before.format("%Y-%m-%d").to_string()),
                &mut values,
            );
        }
        if !filter.statuses.is_empty() {
            let mut slots = Vec::with_capacity(filter.statuses.len());
            for status in &filter.statuses {
                values.push(Value::Text(status.as_str().to_string()));
                slots.push(format!("?{}", values.len()));
            }
            clauses.push(format!("status IN ({})", slots.join(", ")));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

#[async_trait::async_trait]
impl RequestStore for SqliteStore {
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
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO tutoring_requests ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    REQUEST_COLUMNS
                ),
                params![
                    row.id.as_str(),
                    row.student_id.as_str(),
                    row.teacher_id.as_str(),
                    row.subject_id.as_str(),
                    row.preferred_date.as_str(),
                    row.preferred_time.as_str(),
                    row.message.as_str(),
                    row.urgency.as_str(),
                    row.status.as_str(),
                    ts(row.created_at),
                    ts(row.expires_at)
                ],
            )
            .await
            .map_err(db_err)?;
        debug!(request_id = %row.id, "inserted tutoring request");
        Ok(row)
    }

    async fn get_request(&self, id: &str) -> Result<Option<TutoringRequest>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                &format!(
                    "SELECT {} FROM tutoring_requests WHERE id = ?1",
                    REQUEST_COLUMNS
                ),
                params![id],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(Self::row_to_request(&row)?)),
            None => Ok(None),
        }
    }

    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, DomainError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE tutoring_requests SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![to.as_str(), id, from.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    async fn pending_requests_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringRequest>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                &format!(
                    "SELECT {} FROM tutoring_requests WHERE teacher_id = ?1 AND status = 'pending' ORDER BY created_at DESC, rowid DESC",
                    REQUEST_COLUMNS
                ),
                params![teacher_id],
            )
            .await
            .map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(Self::row_to_request(&row)?);
        }
        Ok(out)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        self.conn()?
            .execute(
                "UPDATE tutoring_requests SET status = 'expired' WHERE status = 'pending' AND expires_at <= ?1",
                params![ts(now)],
            )
            .await
            .map_err(db_err)
    }
}

#[async_trait::async_trait]
impl SessionStore for SqliteStore {
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
        let values: Vec<Value> = vec![
            Value::Text(row.id.clone()),
            Value::Text(row.student_id.clone()),
            Value::Text(row.teacher_id.clone()),
            Value::Text(row.subject_id.clone()),
            Value::Text(row.title.clone()),
            Value::Text(row.description.clone()),
            Value::Text(row.scheduled_date.clone()),
            Value::Text(row.start_time.clone()),
            Value::Text(row.end_time.clone()),
            Value::Integer(row.duration_minutes as i64),
            Value::Text(row.status.as_str().to_string()),
            Value::Text(row.location_type.as_str().to_string()),
            Value::Text(row.location_details.clone()),
            Value::Text(row.meeting_url.clone()),
            Value::Real(row.price),
            Value::Text(row.payment_status.as_str().to_string()),
            Value::Text(row.notes.clone()),
            Value::Text(ts(row.created_at)),
            Value::Text(ts(row.updated_at)),
        ];
        let slots: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO tutoring_sessions ({}) VALUES ({})",
                    SESSION_COLUMNS,
                    slots.join(", ")
                ),
                libsql::params_from_iter(values),
            )
            .await
            .map_err(db_err)?;
        debug!(session_id = %row.id, "inserted tutoring session");
        Ok(row)
    }

    async fn get_session(&self, id: &str) -> Result<Option<TutoringSession>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                &format!(
                    "SELECT {} FROM tutoring_sessions WHERE id = ?1",
                    SESSION_COLUMNS
                ),
                params![id],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(Self::row_to_session(&row)?)),
            None => Ok(None),
        }
    }

    async fn transition_session(
        &self,
        id: &str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, DomainError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE tutoring_sessions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                params![to.as_str(), ts(Utc::now()), id, from.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    async fn select_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<TutoringSession>, DomainError> {
        let (where_sql, values) = Self::session_where(filter);
        let mut rows = self
            .conn()?
            .query(
                &format!(
                    "SELECT {} FROM tutoring_sessions {} ORDER BY scheduled_date ASC, start_time ASC",
                    SESSION_COLUMNS, where_sql
                ),
                libsql::params_from_iter(values),
            )
            .await
            .map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(Self::row_to_session(&row)?);
        }
        Ok(out)
    }

    async fn count_sessions(&self, filter: &SessionFilter) -> Result<u64, DomainError> {
        let (where_sql, values) = Self::session_where(filter);
        let mut rows = self
            .conn()?
            .query(
                &format!("SELECT COUNT(*) FROM tutoring_sessions {}", where_sql),
                libsql::params_from_iter(values),
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let n: i64 = row.get(0).map_err(db_err)?;
                Ok(n.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

#[async_trait::async_trait]
impl NotificationStore for SqliteStore {
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
        self.conn()?
            .execute(
                r#"
                INSERT INTO notifications (id, user_id, title, message, type, is_read, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
                "#,
                params![
                    row.id.as_str(),
                    row.user_id.as_str(),
                    row.title.as_str(),
                    row.message.as_str(),
                    row.kind.as_str(),
                    ts(row.created_at)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(row)
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                r#"
                SELECT id, user_id, title, message, type, is_read, created_at, read_at
                FROM notifications
                WHERE user_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?2
                "#,
                params![user_id, limit as i64],
            )
            .await
            .map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(Self::row_to_notification(&row)?);
        }
        Ok(out)
    }

    async fn mark_read(&self, id: &str, read_at: DateTime<Utc>) -> Result<bool, DomainError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE notifications SET is_read = 1, read_at = ?1 WHERE id = ?2",
                params![ts(read_at), id],
            )
            .await
            .map_err(db_err)?;
        Ok(changed == 1)
    }
}

#[async_trait::async_trait]
impl DirectoryPort for SqliteStore {
    async fn subjects(&self) -> Result<Vec<Subject>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT id, name, code, description, department, credits FROM subjects ORDER BY name",
                (),
            )
            .await
            .map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(Self::row_to_subject(&row)?);
        }
        Ok(out)
    }

    async fn get_subject(&self, id: &str) -> Result<Option<Subject>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT id, name, code, description, department, credits FROM subjects WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(Self::row_to_subject(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM teachers t JOIN users u ON u.id = t.id WHERE t.id = ?1",
                    TEACHER_COLUMNS
                ),
                params![id],
            )
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let mut teacher = Self::row_to_teacher(&row)?;
        drop(rows);
        teacher.subject_ids = Self::teacher_subject_ids(&conn, &teacher.id).await?;
        Ok(Some(teacher))
    }

    async fn available_teachers(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<Teacher>, DomainError> {
        let conn = self.conn()?;
        let mut rows = match subject_id {
            Some(subject) => conn
                .query(
                    &format!(
                        r#"
                        SELECT {} FROM teachers t
                        JOIN users u ON u.id = t.id
                        JOIN teacher_subjects ts ON ts.teacher_id = t.id AND ts.subject_id = ?1
                        ORDER BY t.rating DESC
                        "#,
                        TEACHER_COLUMNS
                    ),
                    params![subject],
                )
                .await
                .map_err(db_err)?,
            None => conn
                .query(
                    &format!(
                        r#"
                        SELECT {} FROM teachers t
                        JOIN users u ON u.id = t.id
                        WHERE EXISTS (SELECT 1 FROM teacher_subjects ts WHERE ts.teacher_id = t.id)
                        ORDER BY t.rating DESC
                        "#,
                        TEACHER_COLUMNS
                    ),
                    (),
                )
                .await
                .map_err(db_err)?,
        };
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(Self::row_to_teacher(&row)?);
        }
        drop(rows);
        for teacher in &mut out {
            teacher.subject_ids = Self::teacher_subject_ids(&conn, &teacher.id).await?;
        }
        Ok(out)
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), DomainError> {
        self.conn()?
            .execute(
                r#"
                INSERT INTO subjects (id, name, code, description, department, credits)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    code = excluded.code,
                    description = excluded.description,
                    department = excluded.department,
                    credits = excluded.credits
                "#,
                params![
                    subject.id.as_str(),
                    subject.name.as_str(),
                    subject.code.as_str(),
                    subject.description.as_str(),
                    subject.department.as_str(),
                    subject.credits as i64
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn link_teacher_subject(
        &self,
        teacher_id: &str,
        subject_id: &str,
    ) -> Result<(), DomainError> {
        self.conn()?
            .execute(
                "INSERT INTO teacher_subjects (teacher_id, subject_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                params![teacher_id, subject_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for SqliteStore {
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        tx.execute(
            "INSERT INTO users (id, email, first_name, last_name, role) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id.as_str(),
                profile.email.as_str(),
                profile.first_name.as_str(),
                profile.last_name.as_str(),
                profile.role().as_str()
            ],
        )
        .await
        .map_err(db_err)?;
        match &profile.profile {
            RoleProfile::Student(s) => {
                tx.execute(
                    r#"
                    INSERT INTO students (id, student_code, program, semester, enrollment_year)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        profile.id.as_str(),
                        s.student_code.as_str(),
                        s.program.as_str(),
                        s.semester as i64,
                        s.enrollment_year as i64
                    ],
                )
                .await
                .map_err(db_err)?;
            }
            RoleProfile::Teacher(t) => {
                tx.execute(
                    r#"
                    INSERT INTO teachers (id, department, specialization, bio, experience_years,
                                          hourly_rate, rating, total_reviews, is_verified)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        profile.id.as_str(),
                        t.department.as_str(),
                        t.specialization.as_str(),
                        t.bio.as_str(),
                        t.experience_years as i64,
                        t.hourly_rate,
                        t.rating,
                        t.total_reviews as i64,
                        t.is_verified as i64
                    ],
                )
                .await
                .map_err(db_err)?;
            }
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT id, email, first_name, last_name, role FROM users WHERE id = ?1",
                params![user_id],
            )
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let id: String = row.get(0).map_err(db_err)?;
        let email: String = row.get(1).map_err(db_err)?;
        let first_name: String = row.get(2).map_err(db_err)?;
        let last_name: String = row.get(3).map_err(db_err)?;
        let role: String = row.get(4).map_err(db_err)?;
        drop(rows);

        let profile = match role.as_str() {
            "student" => {
                let mut rows = conn
                    .query(
                        "SELECT student_code, program, semester, enrollment_year FROM students WHERE id = ?1",
                        params![user_id],
                    )
                    .await
                    .map_err(db_err)?;
                let row = rows.next().await.map_err(db_err)?.ok_or_else(|| {
                    DomainError::Persistence(format!("student row missing for user {}", user_id))
                })?;
                let semester: i64 = row.get(2).map_err(db_err)?;
                let year: i64 = row.get(3).map_err(db_err)?;
                RoleProfile::Student(StudentProfile {
                    student_code: row.get(0).map_err(db_err)?,
                    program: row.get(1).map_err(db_err)?,
                    semester: semester.max(0) as u32,
                    enrollment_year: year as i32,
                })
            }
            "teacher" => {
                let mut rows = conn
                    .query(
                        r#"
                        SELECT department, specialization, bio, experience_years, hourly_rate,
                               rating, total_reviews, is_verified
                        FROM teachers WHERE id = ?1
                        "#,
                        params![user_id],
                    )
                    .await
                    .map_err(db_err)?;
                let row = rows.next().await.map_err(db_err)?.ok_or_else(|| {
                    DomainError::Persistence(format!("teacher row missing for user {}", user_id))
                })?;
                let experience: i64 = row.get(3).map_err(db_err)?;
                let reviews: i64 = row.get(6).map_err(db_err)?;
                let verified: i64 = row.get(7).map_err(db_err)?;
                RoleProfile::Teacher(TeacherProfile {
                    department: row.get(0).map_err(db_err)?,
                    specialization: row.get(1).map_err(db_err)?,
                    bio: row.get::<String>(2).unwrap_or_default(),
                    experience_years: experience.max(0) as u32,
                    hourly_rate: row.get::<f64>(4).unwrap_or_default(),
                    rating: row.get::<f64>(5).unwrap_or_default(),
                    total_reviews: reviews.max(0) as u32,
                    is_verified: verified != 0,
                })
            }
            other => {
                return Err(DomainError::Persistence(format!(
                    "unknown role '{}' for user {}",
                    other, user_id
                )));
            }
        };

        Ok(Some(UserProfile {
            id,
            email,
            first_name,
            last_name,
            profile,
        }))
    }

    async fn upsert_settings(&self, settings: &UserSettings) -> Result<UserSettings, DomainError> {
        let mut row = settings.clone();
        row.updated_at = Some(Utc::now());
        let accessibility =
            serde_json::to_string(&row.accessibility_settings).map_err(db_err)?;
        self.conn()?
            .execute(
                r#"
                INSERT INTO user_settings (user_id, theme, language, accessibility_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (user_id) DO UPDATE SET
                    theme = excluded.theme,
                    language = excluded.language,
                    accessibility_json = excluded.accessibility_json,
                    updated_at = excluded.updated_at
                "#,
                params![
                    row.user_id.as_str(),
                    row.theme.as_str(),
                    row.language.as_str(),
                    accessibility,
                    row.updated_at.map(ts)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(row)
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, DomainError> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT user_id, theme, language, accessibility_json, updated_at FROM user_settings WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let accessibility: String = row.get(3).map_err(db_err)?;
        let updated_at: Option<String> = row.get::<String>(4).ok();
        Ok(Some(UserSettings {
            user_id: row.get(0).map_err(db_err)?,
            theme: row.get(1).map_err(db_err)?,
            language: row.get(2).map_err(db_err)?,
            accessibility_settings: serde_json::from_str::<AccessibilitySettings>(&accessibility)
                .unwrap_or_default(),
            updated_at: updated_at.as_deref().map(parse_ts).transpose()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocationType, PaymentStatus, Urgency};
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        (dir, store)
    }

    fn session(student: &str, date: &str, status: SessionStatus, price: f64) -> NewTutoringSession {
        NewTutoringSession {
            student_id: student.into(),
            teacher_id: "t1".into(),
            subject_id: "math".into(),
            title: "Limits".into(),
            description: String::new(),
            scheduled_date: date.into(),
            start_time: "10:00".into(),
            end_time: "11:00".into(),
            duration_minutes: 60,
            status,
            location_type: LocationType::Virtual,
            location_details: String::new(),
            meeting_url: String::new(),
            price,
            payment_status: PaymentStatus::Pending,
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_request_round_trip_and_conditional_transition() {
        let (_dir, store) = store().await;
        let new = NewTutoringRequest {
            student_id: "s1".into(),
            teacher_id: "t1".into(),
            subject_id: "math".into(),
            preferred_date: "2026-03-10".into(),
            preferred_time: "14:00".into(),
            message: "derivatives".into(),
            urgency: Some(Urgency::High),
        };
        let inserted = store
            .insert_request(&new, Utc::now() + Duration::days(7))
            .await
            .unwrap();
        let loaded = store.get_request(&inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded, inserted);

        assert!(store
            .transition_request(&inserted.id, RequestStatus::Pending, RequestStatus::Accepted)
            .await
            .unwrap());
        assert!(!store
            .transition_request(&inserted.id, RequestStatus::Pending, RequestStatus::Accepted)
            .await
            .unwrap());
        assert!(store.get_request("nope").await.unwrap().is_none());
        assert!(store.pending_requests_for_teacher("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expire_overdue_uses_timestamp_order() {
        let (_dir, store) = store().await;
        let now = Utc::now();
        let new = NewTutoringRequest {
            student_id: "s1".into(),
            teacher_id: "t1".into(),
            subject_id: "math".into(),
            preferred_date: "2026-03-10".into(),
            preferred_time: "14:00".into(),
            ..NewTutoringRequest::default()
        };
        store.insert_request(&new, now - Duration::minutes(5)).await.unwrap();
        let keep = store.insert_request(&new, now + Duration::minutes(5)).await.unwrap();

        assert_eq!(store.expire_overdue(now).await.unwrap(), 1);
        let pending = store.pending_requests_for_teacher("t1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_session_filters_push_down() {
        let (_dir, store) = store().await;
        store.insert_session(&session("s1", "2026-02-28", SessionStatus::Completed, 10.0)).await.unwrap();
        store.insert_session(&session("s1", "2026-03-01", SessionStatus::Completed, 20.0)).await.unwrap();
        store.insert_session(&session("s2", "2026-03-31", SessionStatus::Completed, 30.0)).await.unwrap();
        store.insert_session(&session("s2", "2026-04-01", SessionStatus::Completed, 40.0)).await.unwrap();
        store.insert_session(&session("s1", "2026-03-15", SessionStatus::Confirmed, 50.0)).await.unwrap();

        let march = SessionFilter::for_teacher("t1")
            .with_statuses(&[SessionStatus::Completed])
            .scheduled_between(
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            );
        let rows = store.select_sessions(&march).await.unwrap();
        let prices: Vec<f64> = rows.iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![20.0, 30.0]);

        let active = SessionFilter::for_student("s1")
            .with_statuses(&[SessionStatus::Pending, SessionStatus::Confirmed]);
        assert_eq!(store.count_sessions(&active).await.unwrap(), 1);
        assert_eq!(
            store.count_sessions(&SessionFilter::for_student("s1")).await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_session_get_and_conditional_transition() {
        let (_dir, store) = store().await;
        let inserted = store
            .insert_session(&session("s1", "2026-03-02", SessionStatus::Pending, 15.0))
            .await
            .unwrap();
        let loaded = store.get_session(&inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Pending);
        assert_eq!(loaded.duration_minutes, 60);

        assert!(store
            .transition_session(&inserted.id, SessionStatus::Pending, SessionStatus::Confirmed)
            .await
            .unwrap());
        assert!(!store
            .transition_session(&inserted.id, SessionStatus::Pending, SessionStatus::Cancelled)
            .await
            .unwrap());
        let loaded = store.get_session(&inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Confirmed);
        assert!(store.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profiles_and_directory() {
        let (_dir, store) = store().await;
        store
            .upsert_subject(&Subject {
                id: "math".into(),
                name: "Mathematics".into(),
                code: "MAT101".into(),
                description: String::new(),
                department: "Sciences".into(),
                credits: 4,
            })
            .await
            .unwrap();
        let teacher = UserProfile {
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
        };
        store.insert_profile(&teacher).await.unwrap();
        store.link_teacher_subject("t1", "math").await.unwrap();
        store.link_teacher_subject("t1", "math").await.unwrap();
        let mut idle = teacher.clone();
        idle.id = "t2".into();
        idle.email = "leo@uni.edu".into();
        store.insert_profile(&idle).await.unwrap();

        assert_eq!(store.get_profile("t1").await.unwrap(), Some(teacher));
        let listed = store.available_teachers(Some("math")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].subject_ids, vec!["math".to_string()]);
        assert!(store.available_teachers(Some("art")).await.unwrap().is_empty());
        // t2 offers nothing yet, so it is not listed even without a filter.
        let everyone = store.available_teachers(None).await.unwrap();
        assert_eq!(everyone.len(), 1);
        assert_eq!(everyone[0].id, "t1");
        let t = store.get_teacher("t1").await.unwrap().unwrap();
        assert_eq!((t.rating, t.total_reviews), (4.5, 12));
        assert_eq!(store.subjects().await.unwrap()[0].code, "MAT101");
    }

    #[tokio::test]
    async fn test_settings_upsert_replaces() {
        let (_dir, store) = store().await;
        let mut settings = UserSettings::defaults_for("u1");
        store.upsert_settings(&settings).await.unwrap();
        settings.theme = "dark".into();
        settings.accessibility_settings.large_text = true;
        store.upsert_settings(&settings).await.unwrap();

        let loaded = store.get_settings("u1").await.unwrap().unwrap();
        assert_eq!(loaded.theme, "dark");
        assert!(loaded.accessibility_settings.large_text);
        assert!(loaded.updated_at.is_some());
    }
}
