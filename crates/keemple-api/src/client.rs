// Keemple cloud HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, `resultCode` envelope
// unwrapping, session ownership, and the retry / re-authentication
// policy. Endpoint groups (login, devices) are implemented as inherent
// methods in separate files to keep this module focused on mechanics.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use reqwest::cookie::{CookieStore, Jar};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{Credentials, Session};
use crate::error::Error;
use crate::models::{Envelope, RESULT_SESSION_EXPIRED};
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Production endpoint of the Keemple web console API.
pub const DEFAULT_BASE_URL: &str = "https://webconsole.keemple.com/iremote";

/// `platform` parameter identifying third-party API clients.
pub const DEFAULT_PLATFORM: &str = "8";

/// Session lifetime assumed when the login response carries none.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 60;

/// Async client for the Keemple cloud API.
///
/// Owns the account [`Credentials`] and the current [`Session`]. Every
/// endpoint method obtains a valid session first, logging in on demand.
/// The session lives behind an async mutex so that concurrent callers
/// share a single in-flight login instead of racing each other.
pub struct KeempleClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    session: Mutex<Option<Session>>,
    session_ttl: ChronoDuration,
    retry: RetryPolicy,
    /// Cookie jar reference for cookie-only sessions.
    cookie_jar: Option<Arc<Jar>>,
}

impl KeempleClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// A cookie jar is added automatically if the config has none, since
    /// the login endpoint sets the session cookie.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            credentials,
            session: Mutex::new(None),
            session_ttl: ChronoDuration::seconds(DEFAULT_SESSION_TTL_SECS),
            retry: config.retry,
            cookie_jar,
        })
    }

    /// Wrap a pre-built `reqwest::Client`.
    ///
    /// Sessions then depend on the response `token` field, since no cookie
    /// jar is visible to this client.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            credentials,
            session: Mutex::new(None),
            session_ttl: ChronoDuration::seconds(DEFAULT_SESSION_TTL_SECS),
            retry: RetryPolicy::default(),
            cookie_jar: None,
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the fallback session lifetime.
    pub fn with_session_ttl(mut self, ttl: ChronoDuration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn session_ttl(&self) -> ChronoDuration {
        self.session_ttl
    }

    /// Session cookie header for the API host, if the jar holds one.
    pub(crate) fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let cookies = jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    /// Join an endpoint path onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    // ── Session management ───────────────────────────────────────────

    /// Return a valid session, logging in if there is none or it expired.
    ///
    /// Holding the session lock across the login makes refresh
    /// single-flight: concurrent callers block on the lock and then see
    /// the fresh session.
    pub async fn session(&self) -> Result<Session, Error> {
        let mut guard = self.session.lock().await;
        if let Some(ref session) = *guard {
            if !session.is_expired() {
                return Ok(session.clone());
            }
            debug!("session expired, refreshing");
        }
        let fresh = self.login().await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    /// Force a new login, replacing any existing session.
    pub async fn authenticate(&self) -> Result<Session, Error> {
        let mut guard = self.session.lock().await;
        let fresh = self.login().await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    /// The current session without triggering a login.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Re-authenticate after the server rejected `rejected_token`.
    ///
    /// If another caller already replaced the session in the meantime,
    /// that session is reused rather than logging in a second time.
    async fn refresh_after_rejection(&self, rejected_token: &str) -> Result<Session, Error> {
        let mut guard = self.session.lock().await;
        if let Some(ref current) = *guard {
            if current.token() != rejected_token && !current.is_expired() {
                debug!("session already refreshed by another caller");
                return Ok(current.clone());
            }
        }
        *guard = None;
        let fresh = self.login().await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the stored session and return it, if any.
    pub(crate) async fn take_session(&self) -> Option<Session> {
        self.session.lock().await.take()
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// POST an authenticated request and decode the envelope.
    ///
    /// Transient failures are retried per the [`RetryPolicy`]. A rejected
    /// session triggers exactly one re-authentication and one more try.
    pub(crate) async fn post_authenticated<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let session = self.session().await?;
        match self.post_with_retry(path, params, Some(session.token())).await {
            Err(e) if e.is_auth_expired() => {
                warn!(path, "session rejected by server, re-authenticating");
                let fresh = self.refresh_after_rejection(session.token()).await?;
                self.post_with_retry(path, params, Some(fresh.token())).await
            }
            other => other,
        }
    }

    /// POST with query parameters, retrying transient failures.
    pub(crate) async fn post_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        let this = self;
        self.retry
            .run(path, move || {
                let url = url.clone();
                async move { this.post_once(url, params, token).await }
            })
            .await
    }

    async fn post_once<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, Error> {
        debug!("POST {}", url.path());

        let mut builder = self.http.post(url).query(params);
        if let Some(token) = token {
            builder = builder.query(&[("token", token)]);
        }
        let resp = builder.send().await.map_err(Error::Transport)?;

        parse_response(resp).await
    }
}

/// Decode an HTTP response carrying the `{resultCode, resultMessage}`
/// envelope.
pub(crate) async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    let envelope: Envelope = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })?;

    if envelope.result_code == Some(RESULT_SESSION_EXPIRED) {
        return Err(Error::SessionExpired);
    }

    if !envelope.is_ok() {
        return Err(Error::Api {
            code: envelope.result_code.unwrap_or_default(),
            message: envelope
                .result_message
                .unwrap_or_else(|| "no result message".into()),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}

/// Ensure the base URL ends with `/` so relative endpoint paths join
/// beneath it instead of replacing its last segment.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base_url("https://webconsole.keemple.com/iremote").unwrap();
        assert_eq!(url.as_str(), "https://webconsole.keemple.com/iremote/");
        let joined = url.join("phoneuser/login").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://webconsole.keemple.com/iremote/phoneuser/login"
        );
    }

    #[test]
    fn base_url_root() {
        let url = normalize_base_url("http://127.0.0.1:8080").unwrap();
        assert_eq!(url.join("device/operate").unwrap().path(), "/device/operate");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(preview(&long).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}
