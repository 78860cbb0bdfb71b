//! Hosted backend HTTP client
//!
//! Talks to the auth service (`/auth/v1`) and the row-store (`/rest/v1`)
//! of a Supabase project.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::AuthBackend;
use crate::auth::{AuthChangeEvent, AuthEvents, AuthSubscription, FileSessionStore, Session, User};
use crate::task::{NewTask, Task, TaskPatch, TaskRepository};
use crate::{Error, Result};

const TODOS_TABLE: &str = "todos";
/// Refresh this many seconds before the access token expires
const REFRESH_MARGIN_SECS: i64 = 60;
const REFRESH_RETRY: Duration = Duration::from_secs(10);

/// Configuration for the hosted backend
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,
    /// Public anon key
    pub anon_key: String,
    /// Where to persist the session between runs
    pub session_path: Option<PathBuf>,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            session_path: None,
        }
    }

    /// Persist the session at `path`
    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = Some(path.into());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull a human-readable message out of an error response body
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.msg.or(b.message).or(b.error_description).or(b.error))
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                body.to_string()
            }
        })
}

async fn auth_error(resp: Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Error::Auth {
        status: Some(status.as_u16()),
        message: error_message(status, &body),
    }
}

async fn api_error(resp: Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Error::Api {
        status: status.as_u16(),
        message: error_message(status, &body),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config(format!("Invalid header value: {}", e)))
}

/// Client for a Supabase project
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    session: RwLock<Option<Session>>,
    store: Option<FileSessionStore>,
    events: AuthEvents,
    session_changed: Arc<Notify>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl SupabaseClient {
    /// Create a new client. No request is made until the first operation.
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("backend URL is empty".into()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "backend URL must start with http:// or https://: {}",
                base_url
            )));
        }
        let anon_key = config.anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::Config("anon key is empty".into()));
        }
        // Fail early on keys that can never be sent
        header_value(&anon_key)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                anon_key,
                http: reqwest::Client::new(),
                session: RwLock::new(None),
                store: config.session_path.map(FileSessionStore::new),
                events: AuthEvents::new(),
                session_changed: Arc::new(Notify::new()),
                refresh_task: Mutex::new(None),
            }),
        })
    }

    /// Exchange the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session> {
        self.inner.refresh_session().await
    }

    /// Keep the access token fresh in the background until the client drops
    pub async fn start_auto_refresh(&self) {
        let mut task = self.inner.refresh_task.lock().await;
        if task.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(auto_refresh_loop(weak)));
        debug!("Auto refresh started");
    }

    /// Stop the background refresh, if running
    pub async fn stop_auto_refresh(&self) {
        if let Some(handle) = self.inner.refresh_task.lock().await.take() {
            handle.abort();
            debug!("Auto refresh stopped");
        }
    }
}

impl ClientInner {
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, query: &str) -> String {
        format!("{}/rest/v1/{}{}", self.base_url, TODOS_TABLE, query)
    }

    fn headers(&self, bearer: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);
        Ok(headers)
    }

    /// Headers authorized as the signed-in user, or anonymously
    async fn user_headers(&self) -> Result<HeaderMap> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());
        self.headers(token.as_deref().unwrap_or(&self.anon_key))
    }

    /// Session in memory, falling back to the persisted one
    async fn current_session(&self) -> Result<Option<Session>> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(Some(session));
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let restored = store.load().await?;
        if let Some(session) = &restored {
            debug!("Restored session for user {}", session.user.id);
            *self.session.write().await = Some(session.clone());
            self.session_changed.notify_one();
        }
        Ok(restored)
    }

    async fn set_session(&self, session: Session, event: AuthChangeEvent) {
        *self.session.write().await = Some(session.clone());
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session).await {
                warn!("Failed to persist session: {}", e);
            }
        }
        self.events.emit(event, Some(session));
        self.session_changed.notify_one();
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
        if let Some(store) = &self.store {
            if let Err(e) = store.clear().await {
                warn!("Failed to remove persisted session: {}", e);
            }
        }
        self.events.emit(AuthChangeEvent::SignedOut, None);
        self.session_changed.notify_one();
    }

    async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .current_session()
            .await?
            .map(|s| s.refresh_token)
            .ok_or(Error::NotAuthenticated)?;

        let resp = self
            .http
            .post(self.auth_url("token?grant_type=refresh_token"))
            .headers(self.headers(&self.anon_key)?)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = auth_error(resp).await;
            if matches!(err.status(), Some(400) | Some(401)) {
                warn!("Refresh token rejected, signing out: {}", err);
                self.clear_session().await;
            }
            return Err(err);
        }

        let session = resp.json::<Session>().await?.normalized(Utc::now());
        self.set_session(session.clone(), AuthChangeEvent::TokenRefreshed)
            .await;
        Ok(session)
    }

    /// Seconds to wait before the next refresh, `None` without a session
    async fn refresh_delay(&self) -> Option<u64> {
        self.session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.seconds_until_expiry(Utc::now()))
            .map(|secs| (secs - REFRESH_MARGIN_SECS).max(0) as u64)
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(handle) = self.refresh_task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn auto_refresh_loop(weak: Weak<ClientInner>) {
    loop {
        let Some(inner) = weak.upgrade() else { break };
        let delay = inner.refresh_delay().await;
        let changed = Arc::clone(&inner.session_changed);
        drop(inner);

        match delay {
            Some(secs) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                    _ = changed.notified() => continue,
                }
            }
            None => {
                changed.notified().await;
                continue;
            }
        }

        let Some(inner) = weak.upgrade() else { break };
        match inner.refresh_session().await {
            Ok(session) => debug!("Access token refreshed for user {}", session.user.id),
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                drop(inner);
                tokio::time::sleep(REFRESH_RETRY).await;
            }
        }
    }
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>> {
        match self.inner.current_session().await? {
            Some(session) if session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) => {
                debug!("Stored session is expiring, refreshing");
                self.inner.refresh_session().await.map(Some)
            }
            other => Ok(other),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let inner = &self.inner;
        let resp = inner
            .http
            .post(inner.auth_url("token?grant_type=password"))
            .headers(inner.headers(&inner.anon_key)?)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }

        let session = resp.json::<Session>().await?.normalized(Utc::now());
        info!("Signed in user {}", session.user.id);
        inner
            .set_session(session.clone(), AuthChangeEvent::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let inner = &self.inner;
        let resp = inner
            .http
            .post(inner.auth_url("signup"))
            .headers(inner.headers(&inner.anon_key)?)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }

        // With email confirmation on, only the user object comes back
        let body: serde_json::Value = resp.json().await?;
        if body.get("access_token").is_none() {
            debug!("Sign-up pending email confirmation");
            return Ok(None);
        }

        let session = serde_json::from_value::<Session>(body)?.normalized(Utc::now());
        info!("Signed up and signed in user {}", session.user.id);
        inner
            .set_session(session.clone(), AuthChangeEvent::SignedIn)
            .await;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<()> {
        let inner = &self.inner;
        let token = inner
            .current_session()
            .await?
            .map(|s| s.access_token);

        if let Some(token) = token {
            let resp = inner
                .http
                .post(inner.auth_url("logout"))
                .headers(inner.headers(&token)?)
                .send()
                .await?;

            // An already-invalid session is as good as signed out
            let status = resp.status();
            if !status.is_success()
                && !matches!(
                    status,
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
                )
            {
                return Err(auth_error(resp).await);
            }
        }

        info!("Signed out");
        inner.clear_session().await;
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        let inner = &self.inner;
        let resp = inner
            .http
            .post(inner.auth_url("recover"))
            .headers(inner.headers(&inner.anon_key)?)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }
        Ok(())
    }

    async fn get_user(&self) -> Result<Option<User>> {
        let inner = &self.inner;
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let resp = inner
            .http
            .get(inner.auth_url("user"))
            .headers(inner.headers(&session.access_token)?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(auth_error(resp).await);
        }
        Ok(Some(resp.json::<User>().await?))
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.inner.events.subscribe()
    }
}

#[async_trait]
impl TaskRepository for SupabaseClient {
    async fn list_for_owner(&self, user_id: &str) -> Result<Vec<Task>> {
        let inner = &self.inner;
        let resp = inner
            .http
            .get(inner.rest_url(&format!(
                "?select=*&user_id=eq.{}&order=created_at.desc",
                urlencoding::encode(user_id)
            )))
            .headers(inner.user_headers().await?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json::<Vec<Task>>().await?)
    }

    async fn insert(&self, task: NewTask) -> Result<Task> {
        let inner = &self.inner;
        let resp = inner
            .http
            .post(inner.rest_url(""))
            .headers(inner.user_headers().await?)
            .header("Prefer", "return=representation")
            .json(&[task])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(resp).await);
        }
        resp.json::<Vec<Task>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api {
                status: status.as_u16(),
                message: "insert returned no rows".into(),
            })
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("update has no fields".into()));
        }
        let inner = &self.inner;
        let resp = inner
            .http
            .patch(inner.rest_url(&format!("?id=eq.{}", urlencoding::encode(id))))
            .headers(inner.user_headers().await?)
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let inner = &self.inner;
        let resp = inner
            .http
            .delete(inner.rest_url(&format!("?id=eq.{}", urlencoding::encode(id))))
            .headers(inner.user_headers().await?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_fields() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(
            error_message(status, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(
            error_message(status, r#"{"code":422,"msg":"User already registered"}"#),
            "User already registered"
        );
        assert_eq!(
            error_message(status, r#"{"message":"permission denied for table todos"}"#),
            "permission denied for table todos"
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
    }

    #[test]
    fn test_new_validates_config() {
        assert!(matches!(
            SupabaseClient::new(SupabaseConfig::new("", "key")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SupabaseClient::new(SupabaseConfig::new("example.com", "key")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SupabaseClient::new(SupabaseConfig::new("https://example.com", " ")),
            Err(Error::Config(_))
        ));
        assert!(SupabaseClient::new(SupabaseConfig::new("https://example.com/", "key")).is_ok());
    }

    #[test]
    fn test_urls() {
        let client = SupabaseClient::new(SupabaseConfig::new("https://example.com/", "key")).unwrap();
        assert_eq!(
            client.inner.auth_url("token?grant_type=password"),
            "https://example.com/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            client.inner.rest_url("?id=eq.1"),
            "https://example.com/rest/v1/todos?id=eq.1"
        );
    }

    #[tokio::test]
    async fn test_anonymous_headers_use_anon_key() {
        let client = SupabaseClient::new(SupabaseConfig::new("https://example.com", "anon")).unwrap();
        let headers = client.inner.user_headers().await.unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "anon");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer anon");
    }

    #[tokio::test]
    async fn test_get_session_without_store_is_none() {
        let client = SupabaseClient::new(SupabaseConfig::new("https://example.com", "anon")).unwrap();
        assert!(client.get_session().await.unwrap().is_none());
        assert!(client.get_user().await.unwrap().is_none());
    }
}
