//! In-memory identity service for local runs and tests.
//!
//! Accounts and issued tokens live only as long as the process. Used when no
//! identity URL is configured. Like the hosted service, sessions are keyed by
//! access token, so concurrent users never see each other's session.

use crate::domain::{AuthSession, AuthUser, DomainError};
use crate::ports::IdentityPort;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Access tokens minted by the mock are valid for one hour, like the hosted default.
const SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug)]
struct Account {
    password: String,
    user: AuthUser,
}

#[derive(Debug, Default)]
pub struct MockIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    /// Issued sessions by access token.
    sessions: Mutex<HashMap<String, AuthSession>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdentityPort for MockIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<AuthUser, DomainError> {
        let key = email.trim().to_lowercase();
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&key) {
            return Err(DomainError::Auth("User already registered".to_string()));
        }
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: key.clone(),
            user_metadata: metadata,
        };
        accounts.insert(
            key,
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        info!(user_id = %user.id, "[MOCK] user signed up");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        let key = email.trim().to_lowercase();
        let user = {
            let accounts = self.accounts.lock().await;
            match accounts.get(&key) {
                Some(acc) if acc.password == password => acc.user.clone(),
                _ => return Err(DomainError::Auth("Invalid login credentials".to_string())),
            }
        };
        let session = AuthSession {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: Some(Utc::now() + Duration::seconds(SESSION_TTL_SECS)),
            user,
        };
        self.sessions
            .lock()
            .await
            .insert(session.access_token.clone(), session.clone());
        info!(user_id = %session.user.id, "[MOCK] user signed in");
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), DomainError> {
        if let Some(session) = self.sessions.lock().await.remove(access_token) {
            info!(user_id = %session.user.id, "[MOCK] user signed out");
        }
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, DomainError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get(access_token) {
            Some(s) if s.expires_at.is_some_and(|at| at <= now) => {
                sessions.remove(access_token);
                Ok(None)
            }
            found => Ok(found.cloned()),
        }
    }
}
