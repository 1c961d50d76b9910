//! Session handling for the Tigo API.
//!
//! The API issues an opaque token from `GET /users/login` (HTTP Basic
//! credentials) and expects it as a bearer token on every other request.
//! Tokens carry no expiry information, so they are kept until the API
//! rejects one with `401`, at which point [`TigoAuthenticator::refresh`]
//! logs in again.

use crate::config::{Credentials, TigoConfig};
use crate::error::{Result, TigoError};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use tokio::sync::{Mutex, RwLock};

const LOGIN_PATH: &str = "/users/login";
const LOGOUT_PATH: &str = "/users/logout";

/// An authenticated API session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    #[serde(default)]
    user_id: i64,
    auth: Option<String>,
}

/// Owns account credentials and the current session token.
///
/// Concurrent callers that need a token while none is held share a single
/// login request: the first caller performs it, the rest wait on the login
/// lock and then read the stored session.
///
/// # Examples
///
/// ```no_run
/// use tigo_core::auth::TigoAuthenticator;
/// use tigo_core::config::{Credentials, TigoConfig};
///
/// # async fn example() -> tigo_core::Result<()> {
/// let auth = TigoAuthenticator::new(
///     Credentials::new("owner@example.com", "secret"),
///     TigoConfig::default(),
///     reqwest::Client::new(),
/// );
/// let token = auth.token().await?;
/// println!("logged in as user {:?}", auth.user_id().await);
/// # let _ = token;
/// auth.logout().await?;
/// # Ok(())
/// # }
/// ```
pub struct TigoAuthenticator {
    client: Client,
    api_root: String,
    credentials: Option<Credentials>,
    session: RwLock<Option<Session>>,
    login_lock: Mutex<()>,
}

impl TigoAuthenticator {
    pub fn new(credentials: Credentials, config: TigoConfig, client: Client) -> Self {
        Self {
            client,
            api_root: config.api_root().to_string(),
            credentials: Some(credentials),
            session: RwLock::new(None),
            login_lock: Mutex::new(()),
        }
    }

    /// Adopts an existing token; no credentials are kept, so a rejected
    /// token cannot be renewed.
    pub fn with_token(
        token: impl Into<String>,
        user_id: i64,
        config: TigoConfig,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_root: config.api_root().to_string(),
            credentials: None,
            session: RwLock::new(Some(Session {
                token: token.into(),
                user_id,
                issued_at: Utc::now(),
            })),
            login_lock: Mutex::new(()),
        }
    }

    /// Replaces the current session with a previously issued token.
    pub async fn adopt_token(&self, token: impl Into<String>, user_id: i64) {
        *self.session.write().await = Some(Session {
            token: token.into(),
            user_id,
            issued_at: Utc::now(),
        });
    }

    /// Logs in and stores the new session, replacing any previous one.
    pub async fn login(&self) -> Result<Session> {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await
    }

    async fn login_locked(&self) -> Result<Session> {
        let credentials = self.credentials.as_ref().ok_or_else(|| TigoError::Auth {
            status: 401,
            message: "session token rejected and no credentials available to log in again"
                .into(),
        })?;

        let url = format!("{}{}", self.api_root, LOGIN_PATH);
        tracing::debug!("logging in as {}", credentials.username);

        let response = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| TigoError::http(LOGIN_PATH, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TigoError::http(LOGIN_PATH, e))?;

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(TigoError::api(LOGIN_PATH, status, body.trim()));
        }
        if !status.is_success() {
            return Err(TigoError::Auth {
                status: status.as_u16(),
                message: login_failure_message(&body),
            });
        }

        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| TigoError::decode(LOGIN_PATH, e))?;
        let token = parsed
            .user
            .auth
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TigoError::Auth {
                status: status.as_u16(),
                message: "login response did not contain an auth token".into(),
            })?;

        let session = Session {
            token,
            user_id: parsed.user.user_id,
            issued_at: Utc::now(),
        };
        *self.session.write().await = Some(session.clone());

        tracing::info!("logged in to Tigo API (user {})", session.user_id);
        Ok(session)
    }

    /// Returns the current token, logging in first when there is none.
    pub async fn token(&self) -> Result<String> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.token.clone());
        }

        let _guard = self.login_lock.lock().await;
        // Another caller may have logged in while we waited
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.token.clone());
        }
        Ok(self.login_locked().await?.token)
    }

    /// Replaces a token the API rejected.
    ///
    /// When another task already renewed the session since `rejected` was
    /// handed out, the newer token is returned without logging in again.
    pub async fn refresh(&self, rejected: &str) -> Result<String> {
        let _guard = self.login_lock.lock().await;
        if let Some(session) = self.session.read().await.as_ref()
            && session.token != rejected
        {
            return Ok(session.token.clone());
        }

        tracing::warn!("session token rejected, logging in again");
        *self.session.write().await = None;
        Ok(self.login_locked().await?.token)
    }

    /// Ends the session on the server and forgets the token.
    ///
    /// Logging out without a session is a no-op.
    pub async fn logout(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };

        let url = format!("{}{}", self.api_root, LOGOUT_PATH);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| TigoError::http(LOGOUT_PATH, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TigoError::api(LOGOUT_PATH, status, body));
        }

        tracing::info!("logged out of Tigo API");
        Ok(())
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<i64> {
        self.session.read().await.as_ref().map(|s| s.user_id)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }
}

/// Extracts a readable message from a failed login body.
fn login_failure_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "invalid username or password".to_string()
            } else {
                trimmed.to_string()
            }
        })
}
