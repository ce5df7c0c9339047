//! GoTrue-compatible identity adapter (hosted auth REST API).
//!
//! Implements `IdentityPort` over `/auth/v1/signup`, `/auth/v1/token`, `/auth/v1/user`
//! and `/auth/v1/logout`. Holds no session state: every session call carries the
//! caller's access token. There is no token refresh.

use crate::domain::{AuthSession, AuthUser, DomainError};
use crate::ports::IdentityPort;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

pub struct GoTrueIdentity {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoTrueIdentity {
    /// # Arguments
    /// * `base_url` - Project URL, e.g. "https://xyz.supabase.co" (no trailing `/auth/v1`)
    /// * `api_key` - Public anon key, sent as the `apikey` header
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, DomainError> {
        let res = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Auth(format!("Request failed: {}", e)))?;
        let res = check_status(res).await?;
        res.json::<Value>()
            .await
            .map_err(|e| DomainError::Auth(format!("Invalid response body: {}", e)))
    }
}

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<RawUser> for AuthUser {
    fn from(u: RawUser) -> Self {
        AuthUser {
            id: u.id,
            email: u.email.unwrap_or_default(),
            user_metadata: u.user_metadata,
        }
    }
}

/// Sign-up answers with a bare user when email confirmation is on, or a full
/// session (with a nested `user`) when it is off.
fn parse_signup(body: Value) -> Result<AuthUser, DomainError> {
    let user = match body.get("user") {
        Some(u) if u.is_object() => u.clone(),
        _ => body,
    };
    serde_json::from_value::<RawUser>(user)
        .map(AuthUser::from)
        .map_err(|e| DomainError::Auth(format!("Unexpected sign-up response: {}", e)))
}

fn parse_session(body: Value, now: DateTime<Utc>) -> Result<AuthSession, DomainError> {
    let token: TokenResponse = serde_json::from_value(body)
        .map_err(|e| DomainError::Auth(format!("Unexpected token response: {}", e)))?;
    let expires_at = match (token.expires_at, token.expires_in) {
        (Some(ts), _) => DateTime::from_timestamp(ts, 0),
        (None, Some(secs)) => Some(now + Duration::seconds(secs)),
        (None, None) => None,
    };
    Ok(AuthSession {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        user: token.user.into(),
    })
}

/// `GET /user` returns only the user; the token is the caller's and its expiry is unknown.
fn session_for_token(access_token: &str, body: Value) -> Result<AuthSession, DomainError> {
    let user = serde_json::from_value::<RawUser>(body)
        .map_err(|e| DomainError::Auth(format!("Unexpected user response: {}", e)))?;
    Ok(AuthSession {
        access_token: access_token.to_string(),
        refresh_token: None,
        expires_at: None,
        user: user.into(),
    })
}

/// Non-2xx bodies carry `msg`, `error_description` or `message` depending on the endpoint.
async fn check_status(res: Response) -> Result<Response, DomainError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let text = res.text().await.unwrap_or_else(|_| "unknown".to_string());
    Err(DomainError::Auth(error_message(status.as_u16(), &text)))
}

fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["msg", "error_description", "message", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    format!(
        "Identity API error {}: {}",
        status,
        detail.unwrap_or_else(|| body.to_string())
    )
}

#[async_trait::async_trait]
impl IdentityPort for GoTrueIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<AuthUser, DomainError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": metadata,
        });
        let res = self.post_json(&self.endpoint("signup"), &body).await?;
        let user = parse_signup(res)?;
        info!(user_id = %user.id, "identity sign-up accepted");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        let url = self.endpoint("token?grant_type=password");
        let body = serde_json::json!({ "email": email, "password": password });
        let res = self.post_json(&url, &body).await?;
        let session = parse_session(res, Utc::now())?;
        debug!(user_id = %session.user.id, "identity session opened");
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), DomainError> {
        let res = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| DomainError::Auth(format!("Request failed: {}", e)))?;
        check_status(res).await?;
        debug!("identity session revoked");
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, DomainError> {
        let res = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| DomainError::Auth(format!("Request failed: {}", e)))?;
        if res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        let body = check_status(res)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| DomainError::Auth(format!("Invalid response body: {}", e)))?;
        Ok(Some(session_for_token(access_token, body)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_signup_accepts_bare_user_and_session_shapes() {
        let bare = json!({
            "id": "u-1",
            "email": "ana@example.com",
            "user_metadata": {"role": "student"}
        });
        let user = parse_signup(bare).unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.user_metadata["role"], "student");

        let wrapped = json!({
            "access_token": "tok",
            "user": {"id": "u-2", "email": "b@example.com"}
        });
        let user = parse_signup(wrapped).unwrap();
        assert_eq!(user.id, "u-2");
        assert_eq!(user.user_metadata, Value::Null);
    }

    #[test]
    fn test_parse_session_uses_expires_in_when_no_timestamp() {
        let now = Utc::now();
        let body = json!({
            "access_token": "tok",
            "refresh_token": "ref",
            "expires_in": 3600,
            "user": {"id": "u-1", "email": "a@b.c"}
        });
        let s = parse_session(body, now).unwrap();
        assert_eq!(s.access_token, "tok");
        assert_eq!(s.refresh_token.as_deref(), Some("ref"));
        assert_eq!(s.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_parse_session_rejects_missing_token() {
        let err = parse_session(json!({"user": {"id": "u"}}), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Auth(_)));
    }

    #[test]
    fn test_session_for_token_wraps_user() {
        let s = session_for_token("tok", json!({"id": "u-3", "email": "c@d.e"})).unwrap();
        assert_eq!(s.access_token, "tok");
        assert_eq!(s.user.id, "u-3");
        assert_eq!(s.expires_at, None);
        assert!(session_for_token("tok", json!({"email": "x"})).is_err());
    }

    #[test]
    fn test_error_message_prefers_api_detail() {
        let msg = error_message(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
        assert_eq!(msg, "Identity API error 400: Invalid login credentials");
        assert_eq!(error_message(502, "bad gateway"), "Identity API error 502: bad gateway");
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let id = GoTrueIdentity::new("https://auth.example.com/".into(), "anon".into());
        assert_eq!(id.endpoint("signup"), "https://auth.example.com/auth/v1/signup");
    }
}
