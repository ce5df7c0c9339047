//! Session reads, direct bookings and status progression.
//!
//! Status moves are conditional updates from the status that was read, so two
//! parties moving the same session concurrently cannot both win.

use crate::domain::errors::require_field;
use crate::domain::{DomainError, SessionBooking, SessionStatus, TutoringSession};
use crate::ports::{SessionFilter, SessionStore};
use crate::shared::timeout::bounded;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    call_timeout: Duration,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionStore>, call_timeout: Duration) -> Self {
        Self {
            sessions,
            call_timeout,
        }
    }

    pub async fn for_student(&self, student_id: &str) -> Result<Vec<TutoringSession>, DomainError> {
        require_field("student_id", student_id)?;
        self.matching(SessionFilter::for_student(student_id)).await
    }

    pub async fn for_teacher(&self, teacher_id: &str) -> Result<Vec<TutoringSession>, DomainError> {
        require_field("teacher_id", teacher_id)?;
        self.matching(SessionFilter::for_teacher(teacher_id)).await
    }

    /// Book a session without a prior request. It starts `pending`.
    pub async fn book(&self, booking: SessionBooking) -> Result<TutoringSession, DomainError> {
        let row = booking.into_new_session()?;
        let session = bounded(
            self.call_timeout,
            "insert tutoring session",
            self.sessions.insert_session(&row),
        )
        .await?;
        info!(
            session_id = %session.id,
            student_id = %session.student_id,
            teacher_id = %session.teacher_id,
            "session booked"
        );
        Ok(session)
    }

    /// Move a session to `to`.
    ///
    /// Unknown ids are `NotFound`. A move the status order forbids, or one that
    /// loses to a concurrent move, is `Conflict`.
    pub async fn advance(
        &self,
        session_id: &str,
        to: SessionStatus,
    ) -> Result<TutoringSession, DomainError> {
        require_field("session_id", session_id)?;
        let current = self.load(session_id).await?;
        if !current.status.can_move_to(to) {
            return Err(DomainError::Conflict(format!(
                "session {} is {}, cannot move to {}",
                session_id, current.status, to
            )));
        }

        let moved = bounded(
            self.call_timeout,
            "transition tutoring session",
            self.sessions
                .transition_session(session_id, current.status, to),
        )
        .await?;
        if !moved {
            return Err(DomainError::Conflict(format!(
                "session {} changed while moving to {}",
                session_id, to
            )));
        }
        info!(session_id, from = %current.status, to = %to, "session status changed");
        self.load(session_id).await
    }

    async fn load(&self, session_id: &str) -> Result<TutoringSession, DomainError> {
        bounded(
            self.call_timeout,
            "get tutoring session",
            self.sessions.get_session(session_id),
        )
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("session {}", session_id)))
    }

    async fn matching(&self, filter: SessionFilter) -> Result<Vec<TutoringSession>, DomainError> {
        bounded(
            self.call_timeout,
            "select sessions",
            self.sessions.select_sessions(&filter),
        )
        .await
    }
}
