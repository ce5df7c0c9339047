//! Request lifecycle: submit -> pending -> {accepted, rejected, expired}.
//!
//! - Terminal states never change; every transition is a conditional update from `pending`
//! - Accepting inserts the session first, then claims the request; a lost claim or a
//!   failed claim cancels the new session so no confirmed session is left orphaned
//! - Notifications are best-effort: a failed insert is logged, never surfaced
//! - Each store call is bounded by the configured timeout

use crate::domain::errors::require_field;
use crate::domain::{
    DomainError, NewNotification, NewTutoringRequest, NotificationKind, RequestStatus,
    SessionDetails, SessionStatus, TutoringRequest, TutoringSession,
};
use crate::ports::{DirectoryPort, NotificationStore, RequestStore, SessionStore};
use crate::shared::timeout::bounded;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Coordinator. Holds no state of its own; all state lives behind the store ports.
pub struct RequestLifecycle {
    requests: Arc<dyn RequestStore>,
    sessions: Arc<dyn SessionStore>,
    notifications: Arc<dyn NotificationStore>,
    directory: Arc<dyn DirectoryPort>,
    request_ttl: chrono::Duration,
    call_timeout: Duration,
}

impl RequestLifecycle {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        sessions: Arc<dyn SessionStore>,
        notifications: Arc<dyn NotificationStore>,
        directory: Arc<dyn DirectoryPort>,
        request_ttl: chrono::Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            requests,
            sessions,
            notifications,
            directory,
            request_ttl,
            call_timeout,
        }
    }

    /// Create a pending request and tell the teacher about it.
    pub async fn submit(
        &self,
        request: NewTutoringRequest,
    ) -> Result<TutoringRequest, DomainError> {
        self.submit_at(request, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        request: NewTutoringRequest,
        now: DateTime<Utc>,
    ) -> Result<TutoringRequest, DomainError> {
        let request = request.validated()?;

        let expires_at = now + self.request_ttl;
        let created = bounded(
            self.call_timeout,
            "insert tutoring request",
            self.requests.insert_request(&request, expires_at),
        )
        .await?;

        info!(
            request_id = %created.id,
            student_id = %created.student_id,
            teacher_id = %created.teacher_id,
            urgency = %created.urgency,
            "tutoring request submitted"
        );

        let subject = self.subject_label(&created.subject_id).await;
        self.notify(NewNotification {
            user_id: created.teacher_id.clone(),
            title: "New tutoring request".to_string(),
            message: format!("You have a new tutoring request for {}", subject),
            kind: NotificationKind::TutoringRequest,
        })
        .await;

        Ok(created)
    }

    /// Accept a pending request: create the confirmed session, close the request, notify the student.
    pub async fn accept(
        &self,
        request_id: &str,
        details: SessionDetails,
    ) -> Result<TutoringSession, DomainError> {
        self.accept_at(request_id, details, Utc::now()).await
    }

    pub async fn accept_at(
        &self,
        request_id: &str,
        details: SessionDetails,
        now: DateTime<Utc>,
    ) -> Result<TutoringSession, DomainError> {
        require_field("request_id", request_id)?;
        let details = details.validated()?;

        let request = self.load_pending(request_id).await?;
        if request.is_overdue(now) {
            self.expire_one(&request).await;
            return Err(DomainError::Conflict(format!(
                "tutoring request {} expired at {}",
                request.id, request.expires_at
            )));
        }

        let session = bounded(
            self.call_timeout,
            "insert tutoring session",
            self.sessions
                .insert_session(&details.into_session_for(&request)),
        )
        .await?;

        let claimed = bounded(
            self.call_timeout,
            "accept tutoring request",
            self.requests.transition_request(
                &request.id,
                RequestStatus::Pending,
                RequestStatus::Accepted,
            ),
        )
        .await;

        match claimed {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    request_id = %request.id,
                    session_id = %session.id,
                    "request left pending before it could be accepted; cancelling session"
                );
                self.cancel_session(&session).await;
                return Err(DomainError::Conflict(format!(
                    "tutoring request {} is no longer pending",
                    request.id
                )));
            }
            Err(e) => {
                if !self.claim_landed(&request.id, &session, &e).await {
                    return Err(e);
                }
            }
        }

        self.notify(NewNotification {
            user_id: request.student_id.clone(),
            title: "Tutoring request accepted".to_string(),
            message: format!(
                "Your tutoring request has been accepted. Date: {}",
                session.scheduled_date
            ),
            kind: NotificationKind::TutoringAccepted,
        })
        .await;

        info!(
            request_id = %request.id,
            session_id = %session.id,
            scheduled_date = %session.scheduled_date,
            "tutoring request accepted"
        );

        Ok(session)
    }

    /// Reject a pending request. Rejecting anything not pending is a conflict and changes nothing.
    pub async fn reject(&self, request_id: &str) -> Result<TutoringRequest, DomainError> {
        require_field("request_id", request_id)?;
        let mut request = self.load_pending(request_id).await?;

        let changed = bounded(
            self.call_timeout,
            "reject tutoring request",
            self.requests.transition_request(
                &request.id,
                RequestStatus::Pending,
                RequestStatus::Rejected,
            ),
        )
        .await?;
        if !changed {
            return Err(DomainError::Conflict(format!(
                "tutoring request {} is no longer pending",
                request.id
            )));
        }
        request.status = RequestStatus::Rejected;

        self.notify(NewNotification {
            user_id: request.student_id.clone(),
            title: "Tutoring request declined".to_string(),
            message: format!(
                "Your tutoring request for {} was declined",
                request.preferred_date
            ),
            kind: NotificationKind::TutoringRejected,
        })
        .await;

        info!(request_id = %request.id, "tutoring request rejected");
        Ok(request)
    }

    /// Expire every pending request whose deadline has passed.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let n = bounded(
            self.call_timeout,
            "expire overdue requests",
            self.requests.expire_overdue(now),
        )
        .await?;
        if n > 0 {
            info!(count = n, "expired overdue tutoring requests");
        }
        Ok(n)
    }

    /// Pending requests for a teacher's inbox, newest first.
    pub async fn pending_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<TutoringRequest>, DomainError> {
        require_field("teacher_id", teacher_id)?;
        bounded(
            self.call_timeout,
            "list pending requests",
            self.requests.pending_requests_for_teacher(teacher_id),
        )
        .await
    }

    async fn load_pending(&self, request_id: &str) -> Result<TutoringRequest, DomainError> {
        let request = bounded(
            self.call_timeout,
            "get tutoring request",
            self.requests.get_request(request_id),
        )
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("tutoring request {}", request_id)))?;

        if request.status != RequestStatus::Pending {
            warn!(
                request_id = %request.id,
                status = %request.status,
                "transition refused: request is not pending"
            );
            return Err(DomainError::Conflict(format!(
                "tutoring request {} is already {}",
                request.id, request.status
            )));
        }
        Ok(request)
    }

    async fn expire_one(&self, request: &TutoringRequest) {
        let res = bounded(
            self.call_timeout,
            "expire tutoring request",
            self.requests.transition_request(
                &request.id,
                RequestStatus::Pending,
                RequestStatus::Expired,
            ),
        )
        .await;
        if let Err(e) = res {
            warn!(request_id = %request.id, error = %e, "failed to mark request expired");
        }
    }

    /// Decides what a failed claim means for `session`. The update may have
    /// committed before the error (a deadline hit after the write), so the
    /// request is read again. Returns true when the request ended up accepted
    /// and the session stands. The session is cancelled only when the request
    /// is known not to be accepted; an unreadable request leaves it alone.
    async fn claim_landed(
        &self,
        request_id: &str,
        session: &TutoringSession,
        cause: &DomainError,
    ) -> bool {
        let current = bounded(
            self.call_timeout,
            "re-read tutoring request",
            self.requests.get_request(request_id),
        )
        .await;
        match current {
            Ok(Some(r)) if r.status == RequestStatus::Accepted => {
                warn!(
                    request_id,
                    session_id = %session.id,
                    error = %cause,
                    "claim reported an error but the request is accepted; keeping session"
                );
                true
            }
            Ok(_) => {
                self.cancel_session(session).await;
                false
            }
            Err(e) => {
                error!(
                    request_id,
                    session_id = %session.id,
                    error = %e,
                    "request state unknown after failed claim; session left confirmed"
                );
                false
            }
        }
    }

    /// Compensation for a session whose request could not be claimed.
    async fn cancel_session(&self, session: &TutoringSession) {
        let res = bounded(
            self.call_timeout,
            "cancel tutoring session",
            self.sessions.transition_session(
                &session.id,
                SessionStatus::Confirmed,
                SessionStatus::Cancelled,
            ),
        )
        .await;
        match res {
            Ok(true) => info!(session_id = %session.id, "session cancelled"),
            Ok(false) => error!(session_id = %session.id, "session to cancel not found"),
            Err(e) => error!(
                session_id = %session.id,
                error = %e,
                "failed to cancel session; it stays confirmed without an accepted request"
            ),
        }
    }

    async fn subject_label(&self, subject_id: &str) -> String {
        match bounded(
            self.call_timeout,
            "get subject",
            self.directory.get_subject(subject_id),
        )
        .await
        {
            Ok(Some(subject)) => subject.name,
            Ok(None) => subject_id.to_string(),
            Err(e) => {
                warn!(subject_id, error = %e, "subject lookup failed");
                subject_id.to_string()
            }
        }
    }

    async fn notify(&self, notification: NewNotification) {
        let res = bounded(
            self.call_timeout,
            "insert notification",
            self.notifications.insert_notification(&notification),
        )
        .await;
        if let Err(e) = res {
            warn!(
                user_id = %notification.user_id,
                kind = notification.kind.as_str(),
                error = %e,
                "notification not delivered"
            );
        }
    }
}
