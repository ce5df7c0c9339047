//! JSON HTTP API over `TutoringApi`.
//!
//! # Endpoints
//!
//! - `POST /api/tutoring/request` - Submit a tutoring request
//! - `POST /api/tutoring/accept` - Accept a request and schedule the session
//! - `POST /api/tutoring/reject` - Decline a request
//! - `POST /api/tutoring/expire` - Expire overdue pending requests
//! - `GET /api/teachers/:id/requests` - Teacher inbox (pending, newest first)
//! - `GET /api/teachers/:id/sessions` / `GET /api/students/:id/sessions`
//! - `POST /api/sessions` - Book a session directly (starts `pending`)
//! - `POST /api/sessions/:id/status` - Move a session to its next status
//! - `GET /api/students/:id/stats` / `GET /api/teachers/:id/stats`
//! - `GET /api/users/:id/notifications` - Latest notifications
//! - `POST /api/notifications/:id/read` - Mark one read
//! - `GET /api/users/:id/profile` / `GET|PUT /api/users/:id/settings`
//! - `POST /api/auth/register` / `POST /api/auth/login`
//! - `POST /api/auth/logout` / `GET /api/auth/session` - `Authorization: Bearer <access_token>`
//! - `GET /api/subjects` / `GET /api/teachers?subject_id=`
//! - `POST /api/subjects` - Add or replace a subject
//! - `POST /api/teachers/:id/subjects` - Record that a teacher offers a subject
//! - `GET /api/health`
//!
//! Every error, including an unreadable JSON body, renders as `{"error": message}`.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::domain::{
    AuthSession, DomainError, NewTutoringRequest, Notification, RegisterData, SessionBooking,
    SessionDetails, SessionStatus, StudentStats, Subject, Teacher, TeacherStats, TutoringRequest,
    TutoringSession, UserProfile, UserSettings,
};
use crate::ports::TutoringApi;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Missing fields come through empty so the use case can name them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AcceptBody {
    pub request_id: String,
    pub session_details: SessionDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RejectBody {
    pub request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatusBody {
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OfferBody {
    pub subject_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeacherQuery {
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub expired: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn TutoringApi>,
}

// ============================================================================
// API Error Type
// ============================================================================

#[derive(Debug)]
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Auth(_) => StatusCode::UNAUTHORIZED,
            DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            warn!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// `Json<T>` whose rejections render through `ApiError` as a 400.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(DomainError::Validation(rejection.body_text()))),
        }
    }
}

/// Access token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError(DomainError::Auth("missing bearer token".to_string())))
}

// ============================================================================
// Router Setup
// ============================================================================

/// All routes under `/api`, with request tracing and permissive CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/tutoring/request", post(handle_submit))
        .route("/tutoring/accept", post(handle_accept))
        .route("/tutoring/reject", post(handle_reject))
        .route("/tutoring/expire", post(handle_expire))
        .route("/teachers", get(handle_teachers))
        .route("/teachers/:id/requests", get(handle_teacher_requests))
        .route("/teachers/:id/sessions", get(handle_teacher_sessions))
        .route("/teachers/:id/stats", get(handle_teacher_stats))
        .route("/teachers/:id/subjects", post(handle_offer_subject))
        .route("/sessions", post(handle_book_session))
        .route("/sessions/:id/status", post(handle_session_status))
        .route("/students/:id/sessions", get(handle_student_sessions))
        .route("/students/:id/stats", get(handle_student_stats))
        .route("/users/:id/notifications", get(handle_notifications))
        .route("/users/:id/profile", get(handle_profile))
        .route(
            "/users/:id/settings",
            get(handle_get_settings).put(handle_settings),
        )
        .route("/notifications/:id/read", post(handle_mark_read))
        .route("/subjects", get(handle_subjects).post(handle_add_subject))
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/auth/logout", post(handle_logout))
        .route("/auth/session", get(handle_session))
        .route("/health", get(handle_health));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

type Shared = State<Arc<AppState>>;

async fn handle_submit(
    State(state): Shared,
    ApiJson(body): ApiJson<NewTutoringRequest>,
) -> Result<(StatusCode, Json<TutoringRequest>), ApiError> {
    let created = state.api.submit_request(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn handle_accept(
    State(state): Shared,
    ApiJson(body): ApiJson<AcceptBody>,
) -> Result<Json<TutoringSession>, ApiError> {
    let session = state
        .api
        .accept_request(&body.request_id, body.session_details)
        .await?;
    Ok(Json(session))
}

async fn handle_reject(
    State(state): Shared,
    ApiJson(body): ApiJson<RejectBody>,
) -> Result<Json<TutoringRequest>, ApiError> {
    Ok(Json(state.api.reject_request(&body.request_id).await?))
}

async fn handle_expire(State(state): Shared) -> Result<Json<ExpireResponse>, ApiError> {
    let expired = state.api.expire_overdue_requests().await?;
    Ok(Json(ExpireResponse { expired }))
}

async fn handle_teacher_requests(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<TutoringRequest>>, ApiError> {
    Ok(Json(state.api.pending_requests(&id).await?))
}

async fn handle_teacher_sessions(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<TutoringSession>>, ApiError> {
    Ok(Json(state.api.teacher_sessions(&id).await?))
}

async fn handle_student_sessions(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<TutoringSession>>, ApiError> {
    Ok(Json(state.api.student_sessions(&id).await?))
}

async fn handle_book_session(
    State(state): Shared,
    ApiJson(body): ApiJson<SessionBooking>,
) -> Result<(StatusCode, Json<TutoringSession>), ApiError> {
    let session = state.api.book_session(body).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn handle_session_status(
    State(state): Shared,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SessionStatusBody>,
) -> Result<Json<TutoringSession>, ApiError> {
    Ok(Json(state.api.update_session_status(&id, body.status).await?))
}

async fn handle_student_stats(State(state): Shared, Path(id): Path<String>) -> Json<StudentStats> {
    Json(state.api.student_stats(&id).await)
}

async fn handle_teacher_stats(State(state): Shared, Path(id): Path<String>) -> Json<TeacherStats> {
    Json(state.api.teacher_stats(&id).await)
}

async fn handle_notifications(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.api.notifications(&id).await?))
}

async fn handle_mark_read(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.api.mark_notification_read(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_profile(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.api.profile(&id).await?))
}

async fn handle_get_settings(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.api.settings(&id).await?))
}

/// The path id wins over any `user_id` in the body.
async fn handle_settings(
    State(state): Shared,
    Path(id): Path<String>,
    ApiJson(mut body): ApiJson<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    body.user_id = id;
    Ok(Json(state.api.update_settings(body).await?))
}

async fn handle_subjects(State(state): Shared) -> Result<Json<Vec<Subject>>, ApiError> {
    Ok(Json(state.api.subjects().await?))
}

async fn handle_add_subject(
    State(state): Shared,
    ApiJson(body): ApiJson<Subject>,
) -> Result<(StatusCode, Json<Subject>), ApiError> {
    let subject = state.api.add_subject(body).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

async fn handle_teachers(
    State(state): Shared,
    Query(q): Query<TeacherQuery>,
) -> Result<Json<Vec<Teacher>>, ApiError> {
    Ok(Json(state.api.available_teachers(q.subject_id.as_deref()).await?))
}

async fn handle_offer_subject(
    State(state): Shared,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<OfferBody>,
) -> Result<Json<Teacher>, ApiError> {
    Ok(Json(state.api.offer_subject(&id, &body.subject_id).await?))
}

async fn handle_register(
    State(state): Shared,
    ApiJson(body): ApiJson<RegisterData>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let profile = state.api.register(body).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn handle_login(
    State(state): Shared,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<AuthSession>, ApiError> {
    Ok(Json(state.api.login(&body.email, &body.password).await?))
}

async fn handle_logout(State(state): Shared, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)?;
    state.api.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `null` when the token is unknown or expired.
async fn handle_session(
    State(state): Shared,
    headers: HeaderMap,
) -> Result<Json<Option<AuthSession>>, ApiError> {
    let token = bearer_token(&headers)?;
    Ok(Json(state.api.current_session(&token).await?))
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
